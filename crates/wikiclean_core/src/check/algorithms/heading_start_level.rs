use crate::analysis::{PageAnalysis, Title};
use crate::check::{CheckAlgorithm, CheckFinding, apply_edits};

const EXPECTED_LEVEL: usize = 3;

/// 7: headings must start at level 3.
///
/// A page is flagged when it has headings and none of them is at level 3 or
/// less. The fix moves every heading up by the same amount so that the
/// shallowest becomes level 3.
pub struct HeadingStartLevel;

impl HeadingStartLevel {
    fn shift(titles: &[Title]) -> Option<usize> {
        let min_level = titles.iter().map(|title| title.level).min()?;
        (min_level > EXPECTED_LEVEL).then(|| min_level - EXPECTED_LEVEL)
    }
}

impl CheckAlgorithm for HeadingStartLevel {
    fn id(&self) -> u32 {
        7
    }

    fn short_description(&self) -> &str {
        "Headlines start with three \"=\""
    }

    fn has_special_list(&self) -> bool {
        true
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        _only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        let titles = analysis.titles();
        let (Some(shift), Some(first)) = (Self::shift(titles), titles.first()) else {
            return Ok(Vec::new());
        };
        let finding = CheckFinding::new(
            self.id(),
            first.span,
            format!("headings start at level {}", shift + EXPECTED_LEVEL),
        )
        .with_replacement(first.to_wikitext_with_level(first.level - shift), true);
        Ok(vec![finding])
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, analysis: &PageAnalysis) -> anyhow::Result<String> {
        let titles = analysis.titles();
        let Some(shift) = Self::shift(titles) else {
            return Ok(analysis.text().to_string());
        };
        let edits = titles
            .iter()
            .map(|title| (title.span, title.to_wikitext_with_level(title.level - shift)))
            .collect();
        Ok(apply_edits(analysis.text(), edits))
    }
}
