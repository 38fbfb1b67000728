pub mod algorithms;
mod registry;

use serde::Serialize;

use crate::analysis::{PageAnalysis, Span};

pub use registry::{AlgorithmFailure, CheckRegistry, CheckRun, FixOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub text: String,
    /// Safe to apply without review.
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFinding {
    pub algorithm_id: u32,
    pub span: Span,
    pub reason: String,
    pub replacements: Vec<Replacement>,
}

impl CheckFinding {
    pub fn new(algorithm_id: u32, span: Span, reason: impl Into<String>) -> Self {
        Self {
            algorithm_id,
            span,
            reason: reason.into(),
            replacements: Vec::new(),
        }
    }

    pub fn with_replacement(mut self, text: impl Into<String>, automatic: bool) -> Self {
        self.replacements.push(Replacement {
            text: text.into(),
            automatic,
        });
        self
    }

    pub fn is_automatic(&self) -> bool {
        self.replacements.iter().any(|replacement| replacement.automatic)
    }
}

/// One check rule. `detect` never mutates; `fix` returns the whole new text
/// and must be idempotent.
pub trait CheckAlgorithm: Send + Sync {
    fn id(&self) -> u32;

    fn short_description(&self) -> &str;

    /// Whether the wiki publishes a worklist of pages for this rule.
    fn has_special_list(&self) -> bool {
        false
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>>;

    fn can_fix(&self) -> bool {
        false
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        Ok(analysis.text().to_string())
    }
}

/// Apply `(span, replacement)` edits to `text`. Edits overlapping an earlier
/// one are dropped.
pub(crate) fn apply_edits(text: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| *span);
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for (span, replacement) in edits {
        if span.begin < cursor {
            continue;
        }
        output.push_str(&text[cursor..span.begin]);
        output.push_str(&replacement);
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Span of `span` widened to its whole line, newline included, when nothing
/// else is on that line.
pub(crate) fn whole_line_span(text: &str, span: Span) -> Span {
    let line_begin = text[..span.begin].rfind('\n').map(|at| at + 1).unwrap_or(0);
    let line_end = text[span.end..]
        .find('\n')
        .map(|at| span.end + at)
        .unwrap_or(text.len());
    let alone = text[line_begin..span.begin].trim().is_empty()
        && text[span.end..line_end].trim().is_empty();
    if !alone {
        return span;
    }
    if line_end < text.len() {
        Span::new(line_begin, line_end + 1)
    } else if line_begin > 0 {
        Span::new(line_begin - 1, line_end)
    } else {
        Span::new(line_begin, line_end)
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_edits, whole_line_span};
    use crate::analysis::Span;

    #[test]
    fn edits_apply_in_order_and_skip_overlaps() {
        let text = "abcdef";
        let edits = vec![
            (Span::new(4, 5), "E".to_string()),
            (Span::new(0, 2), "X".to_string()),
            (Span::new(1, 3), "never".to_string()),
        ];
        assert_eq!(apply_edits(text, edits), "XcdEf");
    }

    #[test]
    fn whole_line_only_when_alone() {
        let text = "a\n[[Category:X]]\nb";
        assert_eq!(whole_line_span(text, Span::new(2, 16)), Span::new(2, 17));
        let text = "a [[Category:X]]\nb";
        assert_eq!(whole_line_span(text, Span::new(2, 16)), Span::new(2, 16));
        let text = "a\n[[Category:X]]";
        assert_eq!(whole_line_span(text, Span::new(2, 16)), Span::new(1, 16));
    }
}
