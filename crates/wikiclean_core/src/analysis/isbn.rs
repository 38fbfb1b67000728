use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::external_link::ExternalLink;
use super::span::{Masks, PageElement, Span};
use super::template::Template;

static ISBN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(isbn|issn)(?:-?1[03])?([ \t\x{a0}:\-]*)([0-9][0-9Xx\- ]*[0-9Xx])")
        .expect("ISBN pattern is valid")
});

const ISBN_PARAMETERS: &[&str] = &["isbn", "isbn10", "isbn13"];
const ISSN_PARAMETERS: &[&str] = &["issn", "eissn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsbnKind {
    Isbn,
    Issn,
}

impl IsbnKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Isbn => "ISBN",
            Self::Issn => "ISSN",
        }
    }
}

/// An ISBN or ISSN, either in running text (`ISBN 978-...`) or as the value
/// of an `isbn`/`issn` template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsbnToken {
    pub span: Span,
    pub kind: IsbnKind,
    /// Keyword and separators as written; empty for template parameters.
    pub prefix_raw: String,
    pub number_raw: String,
    pub is_template_parameter: bool,
}

impl IsbnToken {
    /// Digits of the number, `X` upper-cased.
    pub fn digits(&self) -> String {
        self.number_raw
            .chars()
            .filter(|ch| ch.is_ascii_digit() || *ch == 'X' || *ch == 'x')
            .map(|ch| ch.to_ascii_uppercase())
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        let digits = self.digits();
        let length_ok = match self.kind {
            IsbnKind::Isbn => digits.len() == 10 || digits.len() == 13,
            IsbnKind::Issn => digits.len() == 8,
        };
        let x_position_ok = match digits.find('X') {
            None => true,
            Some(position) => position + 1 == digits.len() && digits.len() != 13,
        };
        length_ok && x_position_ok
    }

    pub fn is_correct(&self) -> bool {
        if self.is_template_parameter {
            return self
                .number_raw
                .chars()
                .all(|ch| ch.is_ascii_digit() || matches!(ch, 'X' | 'x' | '-' | ' '));
        }
        self.prefix_raw == format!("{} ", self.kind.keyword())
    }

    /// Suggested replacements for the whole token, paired with whether
    /// they can be applied without review.
    pub fn corrections(&self) -> Vec<(String, bool)> {
        if self.is_correct() {
            return Vec::new();
        }
        if self.is_template_parameter {
            let stripped: String = self
                .number_raw
                .trim_start_matches(|ch: char| !ch.is_ascii_digit())
                .to_string();
            return vec![(stripped, false)];
        }
        vec![(
            format!("{} {}", self.kind.keyword(), self.number_raw.trim()),
            self.is_valid(),
        )]
    }
}

impl PageElement for IsbnToken {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        format!("{}{}", self.prefix_raw, self.number_raw)
    }
}

pub(crate) fn extract_isbns(
    text: &str,
    masks: &Masks,
    templates: &[Template],
    external_links: &[ExternalLink],
) -> Vec<IsbnToken> {
    let mut out = template_tokens(text, templates);

    for captures in ISBN_RE.captures_iter(text) {
        let (Some(whole), Some(keyword), Some(number)) =
            (captures.get(0), captures.get(1), captures.get(3))
        else {
            continue;
        };
        let kind = if keyword.as_str().eq_ignore_ascii_case("issn") {
            IsbnKind::Issn
        } else {
            IsbnKind::Isbn
        };
        let number_raw = truncate_number(number.as_str(), kind);
        let span = Span::new(whole.start(), number.start() + number_raw.len());

        let skipped = masks.is_masked(span.begin)
            || out
                .iter()
                .any(|token| token.is_template_parameter && token.span.overlaps(&span))
            || external_links.iter().any(|link| link.span.overlaps(&span));
        if skipped {
            continue;
        }
        out.push(IsbnToken {
            span,
            kind,
            prefix_raw: text[whole.start()..number.start()].to_string(),
            number_raw: number_raw.to_string(),
            is_template_parameter: false,
        });
    }

    out.sort_by_key(|token| token.span);
    out
}

fn template_tokens(text: &str, templates: &[Template]) -> Vec<IsbnToken> {
    let mut out = Vec::new();
    for template in templates {
        for parameter in &template.parameters {
            let name = parameter.name.to_ascii_lowercase();
            let kind = if ISBN_PARAMETERS.contains(&name.as_str()) {
                IsbnKind::Isbn
            } else if ISSN_PARAMETERS.contains(&name.as_str()) {
                IsbnKind::Issn
            } else {
                continue;
            };
            if parameter.value.is_empty() {
                continue;
            }
            let leading = parameter.value_raw.len() - parameter.value_raw.trim_start().len();
            let begin = parameter.value_offset + leading;
            let span = Span::new(begin, begin + parameter.value.len());
            out.push(IsbnToken {
                span,
                kind,
                prefix_raw: String::new(),
                number_raw: span.slice(text).to_string(),
                is_template_parameter: true,
            });
        }
    }
    out
}

/// Cut a number that swallowed following text (`0-12-345678-9 1999`) back to
/// a valid length at a space boundary.
fn truncate_number(number: &str, kind: IsbnKind) -> &str {
    let valid_len = |candidate: &str| {
        let count = candidate
            .chars()
            .filter(|ch| ch.is_ascii_digit() || *ch == 'X' || *ch == 'x')
            .count();
        match kind {
            IsbnKind::Isbn => count == 10 || count == 13,
            IsbnKind::Issn => count == 8,
        }
    };
    if valid_len(number) || !number.contains(' ') {
        return number;
    }
    let mut fallback: Option<&str> = None;
    for (position, _) in number.match_indices(' ') {
        let candidate = number[..position].trim_end_matches(['-', ' ']);
        if candidate.is_empty() {
            continue;
        }
        if valid_len(candidate) {
            return candidate;
        }
        fallback.get_or_insert(candidate);
    }
    fallback.unwrap_or(number)
}

#[cfg(test)]
mod tests {
    use super::{IsbnKind, extract_isbns};
    use crate::analysis::comment::extract_comments;
    use crate::analysis::external_link::extract_external_links;
    use crate::analysis::span::{Masks, PageElement};
    use crate::analysis::template::extract_templates;

    fn isbns(text: &str) -> Vec<super::IsbnToken> {
        let comments = extract_comments(text);
        let masks = Masks::from_regions(comments.iter().map(|c| c.span).collect());
        let templates = extract_templates(text, &masks);
        let external = extract_external_links(text, &masks);
        extract_isbns(text, &masks, &templates, &external)
    }

    #[test]
    fn text_tokens_with_correct_and_wrong_syntax() {
        let text = "ISBN 978-0-12-345678-9 and isbn: 0-12-345678-X.";
        let tokens = isbns(text);
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_correct());
        assert!(tokens[0].is_valid());
        assert!(!tokens[1].is_correct());
        assert_eq!(tokens[1].digits(), "012345678X");
        assert_eq!(
            tokens[1].corrections(),
            vec![("ISBN 0-12-345678-X".to_string(), true)]
        );
        for token in &tokens {
            assert_eq!(token.to_wikitext(), token.span.slice(text));
        }
    }

    #[test]
    fn template_parameters_are_tokens() {
        let text = "{{cite book|ISBN= 0-12-345678-9 |issn=1234-5678}}";
        let tokens = isbns(text);
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|token| token.is_template_parameter));
        assert_eq!(tokens[0].number_raw, "0-12-345678-9");
        assert_eq!(tokens[1].kind, IsbnKind::Issn);
        assert!(tokens[1].is_valid());
    }

    #[test]
    fn skips_urls_comments_and_word_fragments() {
        assert!(isbns("[http://x.org/?ISBN 0123456789 x]").is_empty());
        assert!(isbns("<!-- ISBN 0123456789 -->").is_empty());
        assert!(isbns("XISBN 0123456789").is_empty());
    }

    #[test]
    fn truncates_trailing_numbers() {
        let tokens = isbns("ISBN 0-12-345678-9 1999 edition");
        assert_eq!(tokens[0].number_raw, "0-12-345678-9");
    }
}
