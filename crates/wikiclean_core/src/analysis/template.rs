use serde::Serialize;

use super::span::{Masks, PageElement, Span};
use crate::site::normalize_title;

const SUBST_PREFIXES: &[&str] = &["subst:", "safesubst:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParameter {
    /// From the `|` (excluded) to the next `|` or `}}`.
    pub span: Span,
    /// Name as written, `None` for positional parameters.
    pub name_raw: Option<String>,
    pub value_raw: String,
    /// Trimmed name, or the implicit position (`"1"`, `"2"`, ...).
    pub name: String,
    pub value: String,
    pub value_offset: usize,
}

impl TemplateParameter {
    pub fn is_positional(&self) -> bool {
        self.name_raw.is_none()
    }

    fn push_wikitext(&self, output: &mut String) {
        output.push('|');
        if let Some(name) = &self.name_raw {
            output.push_str(name);
            output.push('=');
        }
        output.push_str(&self.value_raw);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub span: Span,
    pub name_raw: String,
    /// Trimmed, `subst:` dropped, first letter upper-cased.
    pub name: String,
    pub parameters: Vec<TemplateParameter>,
}

impl Template {
    pub fn parameter(&self, name: &str) -> Option<&TemplateParameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
    }

    pub fn parameter_at(&self, offset: usize) -> Option<&TemplateParameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.span.contains(offset))
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name == normalize_template_name(name)
    }

    /// Wikitext of this template with `parameters` in place of its own.
    pub fn to_wikitext_with(&self, parameters: &[TemplateParameter]) -> String {
        let mut output = String::with_capacity(self.span.len());
        output.push_str("{{");
        output.push_str(&self.name_raw);
        for parameter in parameters {
            parameter.push_wikitext(&mut output);
        }
        output.push_str("}}");
        output
    }
}

impl PageElement for Template {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        self.to_wikitext_with(&self.parameters)
    }
}

pub fn normalize_template_name(name: &str) -> String {
    let mut trimmed = name.trim();
    for prefix in SUBST_PREFIXES {
        if trimmed.len() >= prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            trimmed = trimmed[prefix.len()..].trim_start();
            break;
        }
    }
    normalize_title(trimmed)
}

pub(crate) fn extract_templates(text: &str, masks: &Masks) -> Vec<Template> {
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while let Some(relative) = text[cursor..].find("{{") {
        let begin = cursor + relative;
        cursor = begin + 1;
        if let Some(region) = masks.region_at(begin) {
            cursor = region.end;
            continue;
        }
        let after_brace = text[begin..].starts_with("{{{");
        let before_brace = begin > 0 && text.as_bytes()[begin - 1] == b'{';
        if after_brace || before_brace {
            continue;
        }
        if let Some(template) = parse_template(text, begin, masks) {
            cursor = begin + 2;
            out.push(template);
        }
    }

    out
}

fn parse_template(text: &str, begin: usize, masks: &Masks) -> Option<Template> {
    let bytes = text.as_bytes();
    let mut index = begin + 2;
    let mut two_brace_depth = 0usize;
    let mut three_brace_depth = 0usize;
    let mut link_depth = 0usize;
    // (separator offset, first `=` of the piece after it)
    let mut separators: Vec<(usize, Option<usize>)> = Vec::new();

    let end = loop {
        if index >= text.len() {
            return None;
        }
        if let Some(region) = masks.region_at(index) {
            index = region.end;
            continue;
        }
        let rest = &text[index..];
        let top_level = two_brace_depth == 0 && three_brace_depth == 0 && link_depth == 0;
        if rest.starts_with("{{{") {
            three_brace_depth += 1;
            index += 3;
        } else if rest.starts_with("}}}") && three_brace_depth > 0 {
            three_brace_depth -= 1;
            index += 3;
        } else if rest.starts_with("{{") {
            two_brace_depth += 1;
            index += 2;
        } else if rest.starts_with("}}") {
            if two_brace_depth == 0 {
                break index;
            }
            two_brace_depth -= 1;
            index += 2;
        } else if rest.starts_with("[[") {
            link_depth += 1;
            index += 2;
        } else if rest.starts_with("]]") && link_depth > 0 {
            link_depth -= 1;
            index += 2;
        } else {
            match bytes[index] {
                b'|' if top_level => separators.push((index, None)),
                b'=' if top_level => {
                    if let Some(last) = separators.last_mut()
                        && last.1.is_none()
                    {
                        last.1 = Some(index);
                    }
                }
                _ => {}
            }
            index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
    };

    let name_end = separators.first().map(|(offset, _)| *offset).unwrap_or(end);
    let name_raw = &text[begin + 2..name_end];
    let name = normalize_template_name(name_raw);
    if name.is_empty() || name.starts_with('#') {
        return None;
    }

    let mut parameters = Vec::with_capacity(separators.len());
    let mut position = 0usize;
    for (slot, (separator, equals)) in separators.iter().enumerate() {
        let piece_begin = separator + 1;
        let piece_end = separators
            .get(slot + 1)
            .map(|(offset, _)| *offset)
            .unwrap_or(end);
        let parameter = match equals {
            Some(equals) => {
                let name_raw = &text[piece_begin..*equals];
                let value_raw = &text[equals + 1..piece_end];
                TemplateParameter {
                    span: Span::new(piece_begin, piece_end),
                    name_raw: Some(name_raw.to_string()),
                    value_raw: value_raw.to_string(),
                    name: name_raw.trim().to_string(),
                    value: value_raw.trim().to_string(),
                    value_offset: equals + 1,
                }
            }
            None => {
                position += 1;
                let value_raw = &text[piece_begin..piece_end];
                TemplateParameter {
                    span: Span::new(piece_begin, piece_end),
                    name_raw: None,
                    value_raw: value_raw.to_string(),
                    name: position.to_string(),
                    value: value_raw.trim().to_string(),
                    value_offset: piece_begin,
                }
            }
        };
        parameters.push(parameter);
    }

    Some(Template {
        span: Span::new(begin, end + 2),
        name_raw: name_raw.to_string(),
        name,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::{extract_templates, normalize_template_name};
    use crate::analysis::comment::extract_comments;
    use crate::analysis::span::{Masks, PageElement};

    fn templates(text: &str) -> Vec<super::Template> {
        let comments = extract_comments(text);
        extract_templates(
            text,
            &Masks::from_regions(comments.iter().map(|c| c.span).collect()),
        )
    }

    #[test]
    fn splits_named_and_positional_parameters() {
        let text = "{{Cite book | title = A=B | x | author=[[Foo|Bar]] | y}}";
        let found = templates(text);
        assert_eq!(found.len(), 1);
        let template = &found[0];
        assert_eq!(template.name, "Cite book");
        let names: Vec<_> = template.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "1", "author", "2"]);
        assert_eq!(template.parameter("title").map(|p| p.value.as_str()), Some("A=B"));
        assert_eq!(
            template.parameter("author").map(|p| p.value.as_str()),
            Some("[[Foo|Bar]]")
        );
        assert_eq!(template.to_wikitext(), text);
    }

    #[test]
    fn nested_templates_are_extracted_too() {
        let text = "{{outer|a={{inner|{{{1|}}}}}|b}}";
        let found = templates(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Outer");
        assert_eq!(found[0].parameters.len(), 2);
        assert_eq!(found[1].name, "Inner");
        assert!(found[0].span.contains_span(&found[1].span));
        for template in &found {
            assert_eq!(template.to_wikitext(), template.span.slice(text));
        }
    }

    #[test]
    fn rejects_parser_functions_parameters_and_unclosed() {
        assert!(templates("{{#if:x|y}}").is_empty());
        assert!(templates("{{{1}}}").is_empty());
        assert!(templates("{{ | x}}").is_empty());
        assert!(templates("{{foo|bar").is_empty());
    }

    #[test]
    fn pipes_in_comments_do_not_split() {
        let found = templates("{{a|b<!-- | -->c}}");
        assert_eq!(found[0].parameters.len(), 1);
        assert_eq!(found[0].parameters[0].value, "b<!-- | -->c");
    }

    #[test]
    fn subst_is_dropped_from_normalized_name() {
        assert_eq!(normalize_template_name(" subst:cite_web "), "Cite web");
        assert_eq!(normalize_template_name("SafeSubst: foo"), "Foo");
    }
}
