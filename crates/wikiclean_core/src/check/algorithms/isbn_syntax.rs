use crate::analysis::{IsbnKind, IsbnToken, PageAnalysis, PageElement};
use crate::check::{CheckAlgorithm, CheckFinding, apply_edits};

/// 69: ISBN written with a wrong syntax (`ISBN: ...`, `isbn ...`,
/// `ISBN-13 ...`, or a keyword inside an `isbn` template parameter).
pub struct IsbnSyntax;

impl IsbnSyntax {
    fn offending(analysis: &PageAnalysis) -> impl Iterator<Item = &IsbnToken> {
        analysis
            .isbns()
            .iter()
            .filter(|token| token.kind == IsbnKind::Isbn && !token.is_correct())
    }

    /// The single correction that can be applied without review.
    fn automatic_correction(token: &IsbnToken) -> Option<String> {
        if token.is_template_parameter {
            return None;
        }
        match token.corrections().as_slice() {
            [(text, true)] => Some(text.clone()),
            _ => None,
        }
    }
}

impl CheckAlgorithm for IsbnSyntax {
    fn id(&self) -> u32 {
        69
    }

    fn short_description(&self) -> &str {
        "ISBN wrong syntax"
    }

    fn has_special_list(&self) -> bool {
        true
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        let mut findings = Vec::new();
        for token in Self::offending(analysis) {
            let mut finding = CheckFinding::new(
                self.id(),
                token.span,
                format!("wrong ISBN syntax: {}", token.to_wikitext()),
            );
            for (text, automatic) in token.corrections() {
                finding = finding.with_replacement(text, automatic && !token.is_template_parameter);
            }
            if only_automatic && !finding.is_automatic() {
                continue;
            }
            findings.push(finding);
        }
        Ok(findings)
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        let edits = Self::offending(analysis)
            .filter_map(|token| Self::automatic_correction(token).map(|text| (token.span, text)))
            .collect();
        Ok(apply_edits(analysis.text(), edits))
    }
}
