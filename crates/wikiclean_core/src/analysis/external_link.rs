use serde::Serialize;

use super::span::{Masks, PageElement, Span};
use crate::site::EXTERNAL_PROTOCOLS;

const BARE_PROTOCOLS: &[&str] = &["http://", "https://", "ftp://"];
const URL_TERMINATORS: &[u8] = b"[]<>\"{}|";
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\''];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    pub span: Span,
    pub url: String,
    /// Everything between the URL and the closing `]`, separator included.
    pub text_raw: Option<String>,
    pub text: Option<String>,
    pub bracketed: bool,
}

impl PageElement for ExternalLink {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        if !self.bracketed {
            return self.url.clone();
        }
        let mut output = String::with_capacity(self.span.len());
        output.push('[');
        output.push_str(&self.url);
        if let Some(text) = &self.text_raw {
            output.push_str(text);
        }
        output.push(']');
        output
    }
}

pub(crate) fn extract_external_links(text: &str, masks: &Masks) -> Vec<ExternalLink> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        if let Some(region) = masks.region_at(cursor) {
            cursor = region.end;
            continue;
        }
        let single_bracket = bytes[cursor] == b'['
            && bytes.get(cursor + 1) != Some(&b'[')
            && (cursor == 0 || bytes[cursor - 1] != b'[');
        if single_bracket && let Some(link) = parse_bracketed(text, cursor) {
            cursor = link.span.end;
            out.push(link);
            continue;
        }
        if let Some(link) = parse_bare(text, cursor) {
            cursor = link.span.end;
            out.push(link);
            continue;
        }
        cursor += 1;
    }

    out
}

fn protocol_at(bytes: &[u8], offset: usize, protocols: &[&'static str]) -> Option<&'static str> {
    protocols.iter().copied().find(|protocol| {
        bytes
            .get(offset..offset + protocol.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(protocol.as_bytes()))
    })
}

fn parse_bracketed(text: &str, begin: usize) -> Option<ExternalLink> {
    let bytes = text.as_bytes();
    let url_begin = begin + 1;
    let protocol = protocol_at(bytes, url_begin, EXTERNAL_PROTOCOLS)?;

    let mut index = url_begin;
    while index < bytes.len() && !bytes[index].is_ascii_whitespace() && bytes[index] != b']' {
        if bytes[index] == b'[' {
            return None;
        }
        index += 1;
    }
    let url_end = index;
    if url_end - url_begin <= protocol.len() {
        return None;
    }

    while index < bytes.len() && bytes[index] != b']' {
        if bytes[index] == b'\n' {
            return None;
        }
        index += 1;
    }
    if index >= bytes.len() {
        return None;
    }

    let text_raw = (index > url_end).then(|| &text[url_end..index]);
    Some(ExternalLink {
        span: Span::new(begin, index + 1),
        url: text[url_begin..url_end].to_string(),
        text_raw: text_raw.map(str::to_string),
        text: text_raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        bracketed: true,
    })
}

fn parse_bare(text: &str, begin: usize) -> Option<ExternalLink> {
    let bytes = text.as_bytes();
    let protocol = protocol_at(bytes, begin, BARE_PROTOCOLS)?;
    if begin > 0 && (bytes[begin - 1].is_ascii_alphanumeric() || bytes[begin - 1] == b'/') {
        return None;
    }

    let mut index = begin + protocol.len();
    while index < bytes.len()
        && !bytes[index].is_ascii_whitespace()
        && !URL_TERMINATORS.contains(&bytes[index])
    {
        index += 1;
    }
    let mut url = &text[begin..index];
    loop {
        let trimmed = url.trim_end_matches(TRAILING_PUNCTUATION);
        let unbalanced = trimmed.matches(')').count() > trimmed.matches('(').count();
        let trimmed = if trimmed.ends_with(')') && unbalanced {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        if trimmed.len() == url.len() {
            break;
        }
        url = trimmed;
    }
    if url.len() <= protocol.len() {
        return None;
    }

    Some(ExternalLink {
        span: Span::new(begin, begin + url.len()),
        url: url.to_string(),
        text_raw: None,
        text: None,
        bracketed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::extract_external_links;
    use crate::analysis::span::{Masks, PageElement};

    #[test]
    fn extracts_bracketed_and_bare_links() {
        let text = "See [https://example.org/a Example site] or http://example.com/b. [[Foo]]";
        let links = extract_external_links(text, &Masks::default());
        assert_eq!(links.len(), 2);
        assert!(links[0].bracketed);
        assert_eq!(links[0].url, "https://example.org/a");
        assert_eq!(links[0].text.as_deref(), Some("Example site"));
        assert!(!links[1].bracketed);
        assert_eq!(links[1].url, "http://example.com/b");
        for link in &links {
            assert_eq!(link.to_wikitext(), link.span.slice(text));
        }
    }

    #[test]
    fn bracket_without_close_on_line_falls_back_to_bare_url() {
        let text = "[http://example.org\n]";
        let links = extract_external_links(text, &Masks::default());
        assert_eq!(links.len(), 1);
        assert!(!links[0].bracketed);
    }

    #[test]
    fn ignores_non_protocols() {
        assert!(extract_external_links("[citation needed] xhttp://a.b", &Masks::default()).is_empty());
    }

    #[test]
    fn keeps_balanced_parenthesis() {
        let text = "(see http://en.wikipedia.org/wiki/A_(b))";
        let links = extract_external_links(text, &Masks::default());
        assert_eq!(links[0].url, "http://en.wikipedia.org/wiki/A_(b)");
    }
}
