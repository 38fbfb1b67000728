use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::comment::Comment;
use super::span::{Masks, PageElement, Span};

pub const TAG_NOWIKI: &str = "nowiki";
pub const TAG_PRE: &str = "pre";
pub const TAG_REF: &str = "ref";

/// Tags whose content is not parsed as wikitext.
pub const NON_WIKITEXT_TAGS: &[&str] = &[
    "chem",
    "ce",
    "hiero",
    "math",
    TAG_NOWIKI,
    TAG_PRE,
    "score",
    "source",
    "syntaxhighlight",
    "templatedata",
    "timeline",
];

/// Tag pairs whose content is skipped by the link, template, title and
/// ISBN scanners.
pub const MASKED_TAGS: &[&str] = &[
    "chem",
    "ce",
    "code",
    "hiero",
    "math",
    TAG_NOWIKI,
    TAG_PRE,
    "score",
    "source",
    "syntaxhighlight",
    "templatedata",
    "timeline",
];

const KNOWN_TAGS: &[&str] = &[
    "abbr", "b", "bdi", "bdo", "big", "blockquote", "br", "caption", "categorytree", "ce",
    "center", "charinsert", "chem", "cite", "code", "data", "dd", "del", "div", "dl", "dt", "em",
    "font", "gallery", "graph", "h1", "h2", "h3", "h4", "h5", "h6", "hiero", "hr", "i",
    "imagemap", "includeonly", "indicator", "ins", "kbd", "li", "mapframe", "mark", "math",
    "noinclude", "nowiki", "ol", "onlyinclude", "p", "poem", "pre", "q", "ref", "references",
    "rp", "rt", "ruby", "s", "samp", "score", "section", "small", "source", "span", "strike",
    "strong", "sub", "sup", "syntaxhighlight", "table", "td", "templatedata", "th", "time",
    "timeline", "tr", "tt", "u", "ul", "var", "wbr",
];

static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s=/"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Opening,
    Closing,
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAttribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub span: Span,
    /// Lower-case tag name.
    pub name: String,
    pub name_raw: String,
    pub kind: TagKind,
    pub attributes_raw: String,
    pub attributes: Vec<TagAttribute>,
    /// Index, in the tag list of the same analysis, of the paired tag.
    pub matching: Option<usize>,
    /// Span of the whole `<x>...</x>` pair, or of the tag alone if unpaired.
    pub complete: Span,
}

impl Tag {
    pub fn attribute(&self, name: &str) -> Option<&TagAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    pub fn is_complete(&self) -> bool {
        self.kind == TagKind::SelfClosing || self.matching.is_some()
    }
}

impl PageElement for Tag {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        let mut output = String::with_capacity(self.span.len());
        output.push('<');
        if self.kind == TagKind::Closing {
            output.push('/');
        }
        output.push_str(&self.name_raw);
        output.push_str(&self.attributes_raw);
        if self.kind == TagKind::SelfClosing {
            output.push('/');
        }
        output.push('>');
        output
    }
}

pub(crate) fn extract_tags(text: &str, comments: &[Comment]) -> Vec<Tag> {
    let comment_masks = Masks::from_regions(comments.iter().map(|comment| comment.span).collect());
    let bytes = text.as_bytes();
    let mut out: Vec<Tag> = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        if let Some(region) = comment_masks.region_at(cursor) {
            cursor = region.end;
            continue;
        }
        if bytes[cursor] != b'<' {
            cursor += 1;
            continue;
        }
        let Some(tag) = parse_tag(text, cursor) else {
            cursor += 1;
            continue;
        };
        cursor = tag.span.end;
        let raw_content =
            tag.kind == TagKind::Opening && NON_WIKITEXT_TAGS.contains(&tag.name.as_str());
        if raw_content && let Some(closing) = find_closing_tag(text, cursor, &tag.name) {
            cursor = closing;
        }
        out.push(tag);
    }

    pair_tags(&mut out);
    out
}

fn parse_tag(text: &str, begin: usize) -> Option<Tag> {
    let bytes = text.as_bytes();
    let mut index = begin + 1;
    let closing = bytes.get(index) == Some(&b'/');
    if closing {
        index += 1;
    }

    let name_begin = index;
    if !bytes.get(index)?.is_ascii_alphabetic() {
        return None;
    }
    while index < bytes.len() && bytes[index].is_ascii_alphanumeric() {
        index += 1;
    }
    let name_raw = &text[name_begin..index];
    let name = name_raw.to_ascii_lowercase();
    if !KNOWN_TAGS.contains(&name.as_str()) {
        return None;
    }
    match bytes.get(index) {
        Some(b'>' | b'/') => {}
        Some(byte) if byte.is_ascii_whitespace() => {}
        _ => return None,
    }

    let attributes_begin = index;
    while index < bytes.len() {
        match bytes[index] {
            b'<' => return None,
            b'>' => break,
            _ => index += 1,
        }
    }
    if index >= bytes.len() {
        return None;
    }
    let inner = &text[attributes_begin..index];
    let (kind, attributes_raw) = if closing {
        (TagKind::Closing, inner)
    } else if let Some(stripped) = inner.strip_suffix('/') {
        (TagKind::SelfClosing, stripped)
    } else {
        (TagKind::Opening, inner)
    };

    let span = Span::new(begin, index + 1);
    Some(Tag {
        span,
        name,
        name_raw: name_raw.to_string(),
        kind,
        attributes_raw: attributes_raw.to_string(),
        attributes: parse_attributes(attributes_raw),
        matching: None,
        complete: span,
    })
}

fn parse_attributes(raw: &str) -> Vec<TagAttribute> {
    ATTRIBUTE_RE
        .captures_iter(raw)
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str().to_string();
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map(|value| value.as_str().to_string());
            Some(TagAttribute { name, value })
        })
        .collect()
}

/// Offset of the `</name` closing tag at or after `from`, if any.
fn find_closing_tag(text: &str, from: usize, name: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(relative) = text[cursor..].find("</") {
        let candidate = cursor + relative;
        let name_begin = candidate + 2;
        let matches_name = text
            .get(name_begin..name_begin + name.len())
            .is_some_and(|value| value.eq_ignore_ascii_case(name));
        let boundary = text
            .as_bytes()
            .get(name_begin + name.len())
            .is_some_and(|byte| *byte == b'>' || byte.is_ascii_whitespace());
        if matches_name && boundary {
            return Some(candidate);
        }
        cursor = name_begin;
    }
    None
}

fn pair_tags(tags: &mut [Tag]) {
    let mut open: Vec<usize> = Vec::new();
    for index in 0..tags.len() {
        match tags[index].kind {
            TagKind::Opening => open.push(index),
            TagKind::Closing => {
                let position = open
                    .iter()
                    .rposition(|candidate| tags[*candidate].name == tags[index].name);
                if let Some(position) = position {
                    let opening = open.remove(position);
                    let complete = Span::new(tags[opening].span.begin, tags[index].span.end);
                    tags[opening].matching = Some(index);
                    tags[opening].complete = complete;
                    tags[index].matching = Some(opening);
                    tags[index].complete = complete;
                }
            }
            TagKind::SelfClosing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TagKind, extract_tags};
    use crate::analysis::comment::extract_comments;
    use crate::analysis::span::PageElement;

    fn tags(text: &str) -> Vec<super::Tag> {
        extract_tags(text, &extract_comments(text))
    }

    #[test]
    fn pairs_opening_and_closing_tags() {
        let text = r#"a<ref name="x">b</ref>c<br />"#;
        let found = tags(text);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].kind, TagKind::Opening);
        assert_eq!(found[0].matching, Some(1));
        assert_eq!(found[0].complete.slice(text), r#"<ref name="x">b</ref>"#);
        assert_eq!(
            found[0].attribute("name").and_then(|a| a.value.as_deref()),
            Some("x")
        );
        assert_eq!(found[2].kind, TagKind::SelfClosing);
        for tag in &found {
            assert_eq!(tag.to_wikitext(), tag.span.slice(text));
        }
    }

    #[test]
    fn nowiki_content_is_opaque() {
        let text = "<nowiki><ref>x</ref></nowiki><ref/>";
        let found = tags(text);
        let names: Vec<_> = found.iter().map(|t| (t.name.as_str(), t.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("nowiki", TagKind::Opening),
                ("nowiki", TagKind::Closing),
                ("ref", TagKind::SelfClosing)
            ]
        );
    }

    #[test]
    fn ignores_comparisons_and_commented_tags() {
        assert!(tags("a < b and c > d").is_empty());
        assert!(tags("x<y and z>w").is_empty());
        assert!(tags("<!-- <ref> -->").is_empty());
    }

    #[test]
    fn unclosed_pre_stays_unmatched() {
        let found = tags("<pre>code\nmore");
        assert_eq!(found.len(), 1);
        assert!(!found[0].is_complete());
    }
}
