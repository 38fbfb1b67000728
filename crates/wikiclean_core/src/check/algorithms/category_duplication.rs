use std::collections::BTreeMap;

use crate::analysis::{PageAnalysis, Span, WikiLink};
use crate::check::{CheckAlgorithm, CheckFinding, apply_edits, whole_line_span};

/// 17: the same category given more than once.
pub struct CategoryDuplication;

impl CategoryDuplication {
    /// Later duplicates, each with whether removing it loses nothing (no sort
    /// key, or the same sort key as the first occurrence).
    fn duplicates(analysis: &PageAnalysis) -> Vec<(&WikiLink, bool)> {
        let mut first_by_target: BTreeMap<&str, &WikiLink> = BTreeMap::new();
        let mut out = Vec::new();
        for link in analysis.category_links() {
            match first_by_target.get(link.target.as_str()) {
                Some(first) => {
                    let safe = link.sort_key().is_none_or(|key| first.sort_key() == Some(key));
                    out.push((link, safe));
                }
                None => {
                    first_by_target.insert(link.target.as_str(), link);
                }
            }
        }
        out
    }
}

impl CheckAlgorithm for CategoryDuplication {
    fn id(&self) -> u32 {
        17
    }

    fn short_description(&self) -> &str {
        "Category duplication"
    }

    fn has_special_list(&self) -> bool {
        true
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        Ok(Self::duplicates(analysis)
            .into_iter()
            .filter(|(_, safe)| *safe || !only_automatic)
            .map(|(link, safe)| {
                CheckFinding::new(
                    self.id(),
                    link.span,
                    format!("category {} is already present", link.target),
                )
                .with_replacement("", safe)
            })
            .collect())
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        let text = analysis.text();
        let mut removals: Vec<Span> = Self::duplicates(analysis)
            .into_iter()
            .filter(|(_, safe)| *safe)
            .map(|(link, _)| whole_line_span(text, link.span))
            .collect();
        if removals.is_empty() {
            return Ok(text.to_string());
        }
        removals.sort();
        // Adjacent removed lines may share a newline.
        let mut merged: Vec<Span> = Vec::with_capacity(removals.len());
        for span in removals {
            if let Some(last) = merged.last_mut()
                && span.begin < last.end
            {
                last.end = last.end.max(span.end);
                continue;
            }
            merged.push(span);
        }
        let edits = merged.into_iter().map(|span| (span, String::new())).collect();
        Ok(apply_edits(text, edits))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::CategoryDuplication;
    use crate::analysis::PageAnalysis;
    use crate::check::CheckAlgorithm;
    use crate::site::SiteConfig;

    fn analysis(text: &str) -> PageAnalysis {
        PageAnalysis::new(text, Arc::new(SiteConfig::default()))
    }

    #[test]
    fn detects_later_duplicates_by_normalized_target() {
        let page = analysis("[[Category:Cities]]\n[[category:cities]]\n[[Category:Towns]]");
        let findings = CategoryDuplication.detect(&page, false).expect("detect");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].span.begin, 20);
        assert!(findings[0].is_automatic());
    }

    #[test]
    fn different_sort_key_is_reported_but_kept() {
        let text = "[[Category:A|x]] [[Category:A|y]]";
        let page = analysis(text);
        let findings = CategoryDuplication.detect(&page, false).expect("detect");
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].is_automatic());
        assert!(CategoryDuplication.detect(&page, true).expect("detect").is_empty());
        assert_eq!(CategoryDuplication.fix(&page).expect("fix"), text);
    }

    #[test]
    fn fix_removes_duplicate_lines() {
        let page = analysis("Text\n[[Category:A]]\n[[Category:B]]\n[[Category:A]]\n[[Category:A|]]");
        let fixed = CategoryDuplication.fix(&page).expect("fix");
        assert_eq!(fixed, "Text\n[[Category:A]]\n[[Category:B]]");
        let again = CategoryDuplication.fix(&analysis(&fixed)).expect("fix");
        assert_eq!(again, fixed);
    }
}
