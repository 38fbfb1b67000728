use serde::Serialize;

use super::span::{Masks, PageElement, Span};
use crate::site::{EXTERNAL_PROTOCOLS, NS_CATEGORY, NS_FILE, SiteConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    Category,
    File,
    Interwiki { language: bool },
}

/// Any `[[...]]` construct: internal, category, file, interwiki or language
/// link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiLink {
    pub span: Span,
    pub kind: LinkKind,
    pub leading_colon: bool,
    /// Target as written, leading colon and whitespace included.
    pub target_raw: String,
    /// Normalized target. Namespace prefixes are canonical; interwiki
    /// targets are only trimmed.
    pub target: String,
    pub anchor_raw: Option<String>,
    pub anchor: Option<String>,
    pub text_raw: Option<String>,
    pub text: Option<String>,
    pub text_offset: Option<usize>,
}

impl WikiLink {
    /// Text shown to readers: the display text, or the target as written.
    pub fn display_text(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let target = self.target_raw.trim().trim_start_matches(':').trim();
        match &self.anchor_raw {
            Some(anchor) => format!("{target}#{anchor}"),
            None => target.to_string(),
        }
    }

    /// Sort key of a category link.
    pub fn sort_key(&self) -> Option<&str> {
        match self.kind {
            LinkKind::Category => self.text.as_deref().filter(|key| !key.is_empty()),
            _ => None,
        }
    }

    /// Whether the display text names the same page as the target.
    pub fn text_matches_target(&self) -> bool {
        match &self.text_raw {
            Some(text) => self.anchor_raw.is_none() && text == self.target_raw.trim(),
            None => false,
        }
    }
}

impl PageElement for WikiLink {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        let mut output = String::with_capacity(self.span.len());
        output.push_str("[[");
        output.push_str(&self.target_raw);
        if let Some(anchor) = &self.anchor_raw {
            output.push('#');
            output.push_str(anchor);
        }
        if let Some(text) = &self.text_raw {
            output.push('|');
            output.push_str(text);
        }
        output.push_str("]]");
        output
    }
}

/// `[[target#anchor|text]]`, omitting empty parts.
pub fn create_internal_link(target: &str, anchor: Option<&str>, text: Option<&str>) -> String {
    let mut output = String::from("[[");
    output.push_str(target);
    if let Some(anchor) = anchor.filter(|anchor| !anchor.is_empty()) {
        output.push('#');
        output.push_str(anchor);
    }
    if let Some(text) = text.filter(|text| !text.is_empty() && *text != target) {
        output.push('|');
        output.push_str(text);
    }
    output.push_str("]]");
    output
}

/// One scan of the page split by link category.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkSet {
    pub internal: Vec<WikiLink>,
    pub category: Vec<WikiLink>,
    pub file: Vec<WikiLink>,
    pub interwiki: Vec<WikiLink>,
}

pub(crate) fn extract_links(text: &str, masks: &Masks, site: &SiteConfig) -> LinkSet {
    let mut set = LinkSet::default();
    let mut cursor = 0usize;

    while let Some(relative) = text[cursor..].find("[[") {
        let begin = cursor + relative;
        if let Some(region) = masks.region_at(begin) {
            cursor = region.end;
            continue;
        }
        match scan_link(text, begin, site) {
            Some(link) => {
                cursor = begin + 2;
                match link.kind {
                    LinkKind::Internal => set.internal.push(link),
                    LinkKind::Category => set.category.push(link),
                    LinkKind::File => set.file.push(link),
                    LinkKind::Interwiki { .. } => set.interwiki.push(link),
                }
            }
            None => cursor = begin + 1,
        }
    }

    set
}

fn scan_link(text: &str, begin: usize, site: &SiteConfig) -> Option<WikiLink> {
    let bytes = text.as_bytes();
    let target_begin = begin + 2;
    let mut index = target_begin;
    let mut anchor_at: Option<usize> = None;
    let mut brace_depth = 0usize;

    // Target segment, up to `|` or `]]`.
    let target_end = loop {
        let byte = *bytes.get(index)?;
        match byte {
            b'[' | b'\n' => return None,
            b']' => {
                if bytes.get(index + 1) == Some(&b']') {
                    break index;
                }
                return None;
            }
            b'{' => {
                if !text[index..].starts_with("{{{") {
                    return None;
                }
                brace_depth += 1;
                index += 3;
                continue;
            }
            b'}' => {
                if !text[index..].starts_with("}}}") || brace_depth == 0 {
                    return None;
                }
                brace_depth -= 1;
                index += 3;
                continue;
            }
            b'#' if brace_depth == 0 && anchor_at.is_none() => anchor_at = Some(index),
            b'|' if brace_depth == 0 => break index,
            _ => {}
        }
        index += 1;
    };

    let target_raw = &text[target_begin..anchor_at.unwrap_or(target_end)];
    let anchor_raw = anchor_at.map(|anchor| &text[anchor + 1..target_end]);
    let (kind, leading_colon, target) = classify(target_raw, site)?;
    if target.is_empty() && anchor_raw.is_none() {
        return None;
    }

    let (text_raw, text_offset, end) = if bytes[target_end] == b'|' {
        let text_begin = target_end + 1;
        let text_end = scan_text(text, text_begin, kind == LinkKind::File)?;
        (Some(&text[text_begin..text_end]), Some(text_begin), text_end + 2)
    } else {
        (None, None, target_end + 2)
    };

    Some(WikiLink {
        span: Span::new(begin, end),
        kind,
        leading_colon,
        target_raw: target_raw.to_string(),
        target,
        anchor_raw: anchor_raw.map(str::to_string),
        anchor: anchor_raw.map(|anchor| anchor.trim().to_string()),
        text_raw: text_raw.map(str::to_string),
        text: text_raw.map(|value| value.trim().to_string()),
        text_offset,
    })
}

/// Offset of the `]]` closing the text segment starting at `from`.
fn scan_text(text: &str, from: usize, allow_nested_links: bool) -> Option<usize> {
    let mut index = from;
    let mut link_depth = 0usize;
    let mut two_brace_depth = 0usize;
    let mut three_brace_depth = 0usize;

    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with("\n\n") {
            return None;
        }
        if rest.starts_with("[[") {
            if !allow_nested_links {
                return None;
            }
            link_depth += 1;
            index += 2;
        } else if rest.starts_with("]]") {
            if link_depth > 0 {
                link_depth -= 1;
                index += 2;
            } else if two_brace_depth == 0 && three_brace_depth == 0 {
                return Some(index);
            } else {
                index += 2;
            }
        } else if rest.starts_with("{{{") {
            three_brace_depth += 1;
            index += 3;
        } else if rest.starts_with("}}}") && three_brace_depth > 0 {
            three_brace_depth -= 1;
            index += 3;
        } else if rest.starts_with("{{") {
            two_brace_depth += 1;
            index += 2;
        } else if rest.starts_with("}}") && two_brace_depth > 0 {
            two_brace_depth -= 1;
            index += 2;
        } else {
            index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    None
}

fn classify(target_raw: &str, site: &SiteConfig) -> Option<(LinkKind, bool, String)> {
    let trimmed = target_raw.trim();
    let leading_colon = trimmed.starts_with(':');
    let name = trimmed.trim_start_matches(':').trim();

    let lower = name.to_ascii_lowercase();
    if EXTERNAL_PROTOCOLS
        .iter()
        .any(|protocol| lower.starts_with(protocol))
    {
        return None;
    }

    if let Some((prefix, _)) = name.split_once(':') {
        if site.is_namespace(NS_CATEGORY, prefix) {
            let kind = if leading_colon {
                LinkKind::Internal
            } else {
                LinkKind::Category
            };
            return Some((kind, leading_colon, site.canonical_title(name)));
        }
        if site.is_namespace(NS_FILE, prefix) {
            let kind = if leading_colon {
                LinkKind::Internal
            } else {
                LinkKind::File
            };
            return Some((kind, leading_colon, site.canonical_title(name)));
        }
        if site.is_interwiki(prefix) {
            return Some((
                LinkKind::Interwiki { language: false },
                leading_colon,
                name.to_string(),
            ));
        }
        if site.is_language(prefix) {
            return Some((
                LinkKind::Interwiki {
                    language: !leading_colon,
                },
                leading_colon,
                name.to_string(),
            ));
        }
    }

    Some((LinkKind::Internal, leading_colon, site.canonical_title(name)))
}
