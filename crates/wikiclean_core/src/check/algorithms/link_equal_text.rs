use crate::analysis::{PageAnalysis, WikiLink, create_internal_link};
use crate::check::{CheckAlgorithm, CheckFinding, apply_edits};

/// 64: `[[Foo|Foo]]`, display text identical to the target.
pub struct LinkEqualText;

impl LinkEqualText {
    fn offending(analysis: &PageAnalysis) -> impl Iterator<Item = &WikiLink> {
        analysis
            .internal_links()
            .iter()
            .filter(|link| !link.leading_colon && link.text_matches_target())
    }

    fn replacement(link: &WikiLink) -> String {
        create_internal_link(link.target_raw.trim(), None, None)
    }
}

impl CheckAlgorithm for LinkEqualText {
    fn id(&self) -> u32 {
        64
    }

    fn short_description(&self) -> &str {
        "Link equal to linktext"
    }

    fn has_special_list(&self) -> bool {
        true
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        _only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        Ok(Self::offending(analysis)
            .map(|link| {
                CheckFinding::new(self.id(), link.span, "link text repeats the target")
                    .with_replacement(Self::replacement(link), true)
            })
            .collect())
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        let edits = Self::offending(analysis)
            .map(|link| (link.span, Self::replacement(link)))
            .collect();
        Ok(apply_edits(analysis.text(), edits))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::LinkEqualText;
    use crate::analysis::PageAnalysis;
    use crate::check::CheckAlgorithm;
    use crate::site::SiteConfig;

    fn analysis(text: &str) -> PageAnalysis {
        PageAnalysis::new(text, Arc::new(SiteConfig::default()))
    }

    #[test]
    fn detects_only_identical_text() {
        let page = analysis("[[Foo|Foo]] [[Foo|foo]] [[Foo#A|Foo]] [[Foo]]");
        let findings = LinkEqualText.detect(&page, false).expect("detect");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].replacements[0].text, "[[Foo]]");
    }

    #[test]
    fn fix_is_idempotent() {
        let page = analysis("A [[ Foo |Foo]] and [[Bar|Bar]].");
        let fixed = LinkEqualText.fix(&page).expect("fix");
        assert_eq!(fixed, "A [[Foo]] and [[Bar]].");
        assert_eq!(LinkEqualText.fix(&analysis(&fixed)).expect("fix"), fixed);
    }
}
