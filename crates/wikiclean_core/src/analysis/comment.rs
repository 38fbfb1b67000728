use serde::Serialize;

use super::span::{PageElement, Span};

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// `<!-- ... -->`. An unterminated comment runs to the end of the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub span: Span,
    pub content: String,
    pub closed: bool,
}

impl PageElement for Comment {
    fn span(&self) -> Span {
        self.span
    }

    fn to_wikitext(&self) -> String {
        let mut output = String::with_capacity(self.content.len() + 7);
        output.push_str(COMMENT_OPEN);
        output.push_str(&self.content);
        if self.closed {
            output.push_str(COMMENT_CLOSE);
        }
        output
    }
}

pub(crate) fn extract_comments(text: &str) -> Vec<Comment> {
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while let Some(relative) = text[cursor..].find(COMMENT_OPEN) {
        let begin = cursor + relative;
        let content_begin = begin + COMMENT_OPEN.len();
        match text[content_begin..].find(COMMENT_CLOSE) {
            Some(close) => {
                let content_end = content_begin + close;
                let end = content_end + COMMENT_CLOSE.len();
                out.push(Comment {
                    span: Span::new(begin, end),
                    content: text[content_begin..content_end].to_string(),
                    closed: true,
                });
                cursor = end;
            }
            None => {
                out.push(Comment {
                    span: Span::new(begin, text.len()),
                    content: text[content_begin..].to_string(),
                    closed: false,
                });
                break;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::extract_comments;
    use crate::analysis::span::PageElement;

    #[test]
    fn extracts_closed_and_unclosed_comments() {
        let text = "a <!-- one --> b <!-- two";
        let comments = extract_comments(text);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, " one ");
        assert!(comments[0].closed);
        assert!(!comments[1].closed);
        assert_eq!(comments[1].span.end, text.len());
        for comment in &comments {
            assert_eq!(comment.to_wikitext(), comment.span.slice(text));
        }
    }

    #[test]
    fn comment_markers_do_not_nest() {
        let comments = extract_comments("<!-- a <!-- b --> c -->");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, " a <!-- b ");
    }
}
