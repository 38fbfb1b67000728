use crate::analysis::{PageAnalysis, TagKind, tag::TAG_PRE};
use crate::check::{CheckAlgorithm, CheckFinding};

/// 24: `<pre>` without a matching `</pre>`.
pub struct PreNotClosed;

impl CheckAlgorithm for PreNotClosed {
    fn id(&self) -> u32 {
        24
    }

    fn short_description(&self) -> &str {
        "Pre not correctly closed"
    }

    fn has_special_list(&self) -> bool {
        true
    }

    fn detect(
        &self,
        analysis: &PageAnalysis,
        only_automatic: bool,
    ) -> anyhow::Result<Vec<CheckFinding>> {
        if only_automatic {
            return Ok(Vec::new());
        }
        Ok(analysis
            .tags()
            .iter()
            .filter(|tag| tag.name == TAG_PRE && tag.kind == TagKind::Opening)
            .filter(|tag| tag.matching.is_none())
            .map(|tag| CheckFinding::new(self.id(), tag.span, "<pre> is never closed"))
            .collect())
    }
}
