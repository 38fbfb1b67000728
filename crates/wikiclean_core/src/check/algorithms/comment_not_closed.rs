use crate::analysis::PageAnalysis;
use crate::check::{CheckAlgorithm, CheckFinding};

/// 5: `<!--` without a matching `-->`.
pub struct CommentNotClosed;

impl CheckAlgorithm for CommentNotClosed {
    fn id(&self) -> u32 {
        5
    }

    fn short_description(&self) -> &str {
        "Comment not closed"
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
            .comments()
            .iter()
            .filter(|comment| !comment.closed)
            .map(|comment| {
                CheckFinding::new(self.id(), comment.span, "comment is never closed")
                    .with_replacement(format!("<!--{}-->", comment.content.trim_end()), false)
            })
            .collect())
    }
}
