use std::sync::Arc;

use crate::analysis::{PageAnalysis, Span, Template, TemplateParameter};
use crate::check::{CheckAlgorithm, CheckFinding, apply_edits};

/// Nested templates can hide duplicates until the outer one is cleaned.
const MAX_FIX_PASSES: usize = 8;

/// 524: the same template parameter given twice with the same value.
pub struct DuplicateTemplateParameter;

impl DuplicateTemplateParameter {
    /// Occurrences to drop: the earlier one of each identical pair, except
    /// when it is positional and other positional parameters follow it.
    /// Removing it would renumber them, so the later named copy goes instead.
    fn redundant(template: &Template) -> Vec<&TemplateParameter> {
        let parameters = &template.parameters;
        let mut out = Vec::new();
        for (index, parameter) in parameters.iter().enumerate() {
            let repeated_later = parameters[index + 1..]
                .iter()
                .any(|later| Self::same(later, parameter));
            if repeated_later && !Self::holds_position(parameters, index) {
                out.push(parameter);
                continue;
            }
            let copies_pinned = parameters[..index]
                .iter()
                .enumerate()
                .any(|(earlier, other)| {
                    Self::same(other, parameter) && Self::holds_position(parameters, earlier)
                });
            if copies_pinned {
                out.push(parameter);
            }
        }
        out
    }

    fn same(left: &TemplateParameter, right: &TemplateParameter) -> bool {
        left.name == right.name && left.value == right.value
    }

    /// Positional parameter followed by another positional one.
    fn holds_position(parameters: &[TemplateParameter], index: usize) -> bool {
        parameters[index].is_positional()
            && parameters[index + 1..]
                .iter()
                .any(TemplateParameter::is_positional)
    }

    /// The parameter with its leading `|`.
    fn removal_span(parameter: &TemplateParameter) -> Span {
        Span::new(parameter.span.begin - 1, parameter.span.end)
    }

    fn removals(analysis: &PageAnalysis) -> Vec<(Span, String)> {
        analysis
            .templates()
            .iter()
            .flat_map(Self::redundant)
            .map(|parameter| (Self::removal_span(parameter), String::new()))
            .collect()
    }
}

impl CheckAlgorithm for DuplicateTemplateParameter {
    fn id(&self) -> u32 {
        524
    }

    fn short_description(&self) -> &str {
        "Duplicate template parameter with identical value"
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        _only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        let mut findings = Vec::new();
        for template in analysis.templates() {
            for parameter in Self::redundant(template) {
                findings.push(
                    CheckFinding::new(
                        self.id(),
                        Self::removal_span(parameter),
                        format!(
                            "parameter {} of {} is repeated with the same value",
                            parameter.name, template.name
                        ),
                    )
                    .with_replacement("", true),
                );
            }
        }
        Ok(findings)
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        let mut text = analysis.text().to_string();
        let mut edits = Self::removals(analysis);
        for _ in 0..MAX_FIX_PASSES {
            if edits.is_empty() {
                break;
            }
            text = apply_edits(&text, edits);
            let next = PageAnalysis::new(text.as_str(), Arc::clone(analysis.site()));
            edits = Self::removals(&next);
        }
        Ok(text)
    }
}
