mod category_duplication;
mod comment_not_closed;
mod duplicate_template_parameter;
mod heading_start_level;
mod isbn_syntax;
mod link_equal_text;
mod pre_not_closed;

pub use category_duplication::CategoryDuplication;
pub use comment_not_closed::CommentNotClosed;
pub use duplicate_template_parameter::DuplicateTemplateParameter;
pub use heading_start_level::HeadingStartLevel;
pub use isbn_syntax::IsbnSyntax;
pub use link_equal_text::LinkEqualText;
pub use pre_not_closed::PreNotClosed;

use super::CheckAlgorithm;

pub fn default_algorithms() -> Vec<Box<dyn CheckAlgorithm>> {
    vec![
        Box::new(CommentNotClosed),
        Box::new(HeadingStartLevel),
        Box::new(CategoryDuplication),
        Box::new(PreNotClosed),
        Box::new(LinkEqualText),
        Box::new(IsbnSyntax),
        Box::new(DuplicateTemplateParameter),
    ]
}
