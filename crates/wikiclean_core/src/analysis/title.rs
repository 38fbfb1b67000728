use serde::Serialize;

use super::comment::Comment;
use super::span::{Masks, PageElement, Span};

/// A section heading such as `== History ==`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Title {
    pub span: Span,
    pub first_level: usize,
    pub second_level: usize,
    /// `min(first_level, second_level)`, 1-based.
    pub level: usize,
    /// Text between the two `=` runs, untrimmed.
    pub title_raw: String,
    /// Displayed title: surplus `=` on either side included, trimmed.
    pub title: String,
    /// Whitespace and comments after the closing run, up to the end of line.
    pub after_title: String,
}

impl Title {
    /// Wikitext of this heading moved to `level`, keeping any asymmetry
    /// between the two `=` runs.
    pub fn to_wikitext_with_level(&self, level: usize) -> String {
        let level = level.max(1);
        let first = self.first_level + level - self.level;
        let second = self.second_level + level - self.level;
        let mut output = String::new();
        output.push_str(&"=".repeat(first));
        output.push_str(&self.title_raw);
        output.push_str(&"=".repeat(second));
        output.push_str(&self.after_title);
        output
    }
}

impl PageElement for Title {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        self.to_wikitext_with_level(self.level)
    }
}

/// `=== text ===` for `level` 3.
pub fn create_title(level: usize, text: &str) -> String {
    let marker = "=".repeat(level.max(1));
    format!("{marker} {} {marker}", text.trim())
}

pub(crate) fn extract_titles(text: &str, comments: &[Comment], masks: &Masks) -> Vec<Title> {
    let mut out = Vec::new();
    let mut line_begin = 0usize;

    while line_begin < text.len() {
        let line_end = text[line_begin..]
            .find('\n')
            .map(|relative| line_begin + relative)
            .unwrap_or(text.len());
        if text.as_bytes()[line_begin] == b'='
            && !masks.is_masked(line_begin)
            && let Some(title) = parse_title_line(text, line_begin, line_end, comments)
        {
            out.push(title);
        }
        line_begin = line_end + 1;
    }

    out
}

fn parse_title_line(
    text: &str,
    line_begin: usize,
    line_end: usize,
    comments: &[Comment],
) -> Option<Title> {
    let line = &text[line_begin..line_end];
    let first_level = line.bytes().take_while(|byte| *byte == b'=').count();

    let mut content_end = line.len();
    loop {
        let trimmed = line[..content_end].trim_end().len();
        let comment = comments.iter().find(|comment| {
            comment.closed
                && comment.span.end == line_begin + trimmed
                && comment.span.begin >= line_begin + first_level
        });
        match comment {
            Some(comment) => content_end = comment.span.begin - line_begin,
            None => {
                content_end = trimmed;
                break;
            }
        }
    }
    if content_end <= first_level {
        return None;
    }

    let content = &line[first_level..content_end];
    let second_level = content.bytes().rev().take_while(|byte| *byte == b'=').count();
    if second_level == 0 || second_level >= content.len() {
        return None;
    }

    let title_raw = &content[..content.len() - second_level];
    if title_raw.trim().is_empty() {
        return None;
    }
    let level = first_level.min(second_level);
    let mut displayed = "=".repeat(first_level - level);
    displayed.push_str(title_raw);
    displayed.push_str(&"=".repeat(second_level - level));

    Some(Title {
        span: Span::new(line_begin, line_end),
        first_level,
        second_level,
        level,
        title_raw: title_raw.to_string(),
        title: displayed.trim().to_string(),
        after_title: line[content_end..].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{create_title, extract_titles};
    use crate::analysis::comment::extract_comments;
    use crate::analysis::span::{Masks, PageElement};

    fn titles(text: &str) -> Vec<super::Title> {
        let comments = extract_comments(text);
        let masks = Masks::from_regions(comments.iter().map(|c| c.span).collect());
        extract_titles(text, &comments, &masks)
    }

    #[test]
    fn extracts_levels_and_text() {
        let text = "intro\n== History ==\nbody\n=== Early years===  \n";
        let found = titles(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].level, 2);
        assert_eq!(found[0].title, "History");
        assert_eq!(found[1].level, 3);
        assert_eq!(found[1].title, "Early years");
        assert_eq!(found[1].after_title, "  ");
        for title in &found {
            assert_eq!(title.to_wikitext(), title.span.slice(text));
        }
    }

    #[test]
    fn asymmetric_runs_use_the_shorter_one() {
        let found = titles("=== A ==");
        assert_eq!(found[0].level, 2);
        assert_eq!(found[0].title, "= A");
        assert_eq!(found[0].to_wikitext_with_level(3), "==== A ===");
    }

    #[test]
    fn trailing_comment_is_kept_after_title() {
        let text = "== A == <!-- note -->";
        let found = titles(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].after_title, " <!-- note -->");
        assert_eq!(found[0].to_wikitext(), text);
    }

    #[test]
    fn rejects_lines_without_closing_run_or_text() {
        assert!(titles("== A").is_empty());
        assert!(titles("==").is_empty());
        assert!(titles("<!--\n== A ==\n-->").is_empty());
    }

    #[test]
    fn rejects_blank_title_text() {
        assert!(titles("== ==").is_empty());
        assert!(titles("===\t===\n").is_empty());
        assert_eq!(titles("== ==\n== B ==")[0].title, "B");
    }

    #[test]
    fn create_title_formats_heading() {
        assert_eq!(create_title(3, " Title "), "=== Title ===");
    }
}
