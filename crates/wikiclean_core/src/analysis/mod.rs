//! Lazy wikitext analysis.
//!
//! A [`PageAnalysis`] owns one page text and builds each element category on
//! first access. Built categories are cached for the lifetime of the
//! analysis and never rebuilt.

pub mod comment;
pub mod external_link;
pub mod isbn;
pub mod link;
pub mod span;
pub mod tag;
pub mod template;
pub mod title;

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::site::SiteConfig;

pub use comment::Comment;
pub use external_link::ExternalLink;
pub use isbn::{IsbnKind, IsbnToken};
pub use link::{LinkKind, WikiLink, create_internal_link};
pub use span::{Masks, PageElement, Span};
pub use tag::{Tag, TagAttribute, TagKind};
pub use template::{Template, TemplateParameter};
pub use title::{Title, create_title};

use link::LinkSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Comment,
    Tag,
    Title,
    InternalLink,
    CategoryLink,
    FileLink,
    InterwikiLink,
    ExternalLink,
    Template,
    Isbn,
}

impl ElementCategory {
    pub const ALL: [ElementCategory; 10] = [
        Self::Comment,
        Self::Tag,
        Self::Title,
        Self::InternalLink,
        Self::CategoryLink,
        Self::FileLink,
        Self::InterwikiLink,
        Self::ExternalLink,
        Self::Template,
        Self::Isbn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Tag => "tag",
            Self::Title => "title",
            Self::InternalLink => "internal_link",
            Self::CategoryLink => "category_link",
            Self::FileLink => "file_link",
            Self::InterwikiLink => "interwiki_link",
            Self::ExternalLink => "external_link",
            Self::Template => "template",
            Self::Isbn => "isbn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
    }
}

/// Borrowed element of any category.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum ElementRef<'a> {
    Comment(&'a Comment),
    Tag(&'a Tag),
    Title(&'a Title),
    Link(&'a WikiLink),
    ExternalLink(&'a ExternalLink),
    Template(&'a Template),
    Isbn(&'a IsbnToken),
}

impl PageElement for ElementRef<'_> {
    fn span(&self) -> Span {
        match self {
            Self::Comment(element) => element.span(),
            Self::Tag(element) => element.span(),
            Self::Title(element) => element.span(),
            Self::Link(element) => element.span(),
            Self::ExternalLink(element) => element.span(),
            Self::Template(element) => element.span(),
            Self::Isbn(element) => element.span(),
        }
    }

    fn to_wikitext(&self) -> String {
        match self {
            Self::Comment(element) => element.to_wikitext(),
            Self::Tag(element) => element.to_wikitext(),
            Self::Title(element) => element.to_wikitext(),
            Self::Link(element) => element.to_wikitext(),
            Self::ExternalLink(element) => element.to_wikitext(),
            Self::Template(element) => element.to_wikitext(),
            Self::Isbn(element) => element.to_wikitext(),
        }
    }
}

pub struct PageAnalysis {
    text: String,
    site: Arc<SiteConfig>,
    comments: OnceLock<Vec<Comment>>,
    tags: OnceLock<Vec<Tag>>,
    masks: OnceLock<Masks>,
    titles: OnceLock<Vec<Title>>,
    links: OnceLock<LinkSet>,
    external_links: OnceLock<Vec<ExternalLink>>,
    templates: OnceLock<Vec<Template>>,
    isbns: OnceLock<Vec<IsbnToken>>,
}

impl PageAnalysis {
    pub fn new(text: impl Into<String>, site: Arc<SiteConfig>) -> Self {
        Self {
            text: text.into(),
            site,
            comments: OnceLock::new(),
            tags: OnceLock::new(),
            masks: OnceLock::new(),
            titles: OnceLock::new(),
            links: OnceLock::new(),
            external_links: OnceLock::new(),
            templates: OnceLock::new(),
            isbns: OnceLock::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn site(&self) -> &Arc<SiteConfig> {
        &self.site
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments
            .get_or_init(|| comment::extract_comments(&self.text))
    }

    pub fn tags(&self) -> &[Tag] {
        self.tags
            .get_or_init(|| tag::extract_tags(&self.text, self.comments()))
    }

    /// Comments plus the content of paired non-wikitext tags.
    pub fn masks(&self) -> &Masks {
        self.masks.get_or_init(|| {
            let mut regions: Vec<Span> = self.comments().iter().map(|c| c.span).collect();
            regions.extend(
                self.tags()
                    .iter()
                    .filter(|tag| {
                        tag.kind == TagKind::Opening
                            && tag.matching.is_some()
                            && tag::MASKED_TAGS.contains(&tag.name.as_str())
                    })
                    .map(|tag| tag.complete),
            );
            Masks::from_regions(regions)
        })
    }

    pub fn is_masked(&self, offset: usize) -> bool {
        self.masks().is_masked(offset)
    }

    pub fn titles(&self) -> &[Title] {
        self.titles
            .get_or_init(|| title::extract_titles(&self.text, self.comments(), self.masks()))
    }

    fn links(&self) -> &LinkSet {
        self.links
            .get_or_init(|| link::extract_links(&self.text, self.masks(), &self.site))
    }

    pub fn internal_links(&self) -> &[WikiLink] {
        &self.links().internal
    }

    pub fn category_links(&self) -> &[WikiLink] {
        &self.links().category
    }

    pub fn file_links(&self) -> &[WikiLink] {
        &self.links().file
    }

    pub fn interwiki_links(&self) -> &[WikiLink] {
        &self.links().interwiki
    }

    pub fn external_links(&self) -> &[ExternalLink] {
        self.external_links
            .get_or_init(|| external_link::extract_external_links(&self.text, self.masks()))
    }

    pub fn templates(&self) -> &[Template] {
        self.templates
            .get_or_init(|| template::extract_templates(&self.text, self.masks()))
    }

    pub fn isbns(&self) -> &[IsbnToken] {
        self.isbns.get_or_init(|| {
            isbn::extract_isbns(
                &self.text,
                self.masks(),
                self.templates(),
                self.external_links(),
            )
        })
    }

    /// Categories built so far.
    pub fn computed_categories(&self) -> Vec<ElementCategory> {
        let link_ready = self.links.get().is_some();
        ElementCategory::ALL
            .into_iter()
            .filter(|category| match category {
                ElementCategory::Comment => self.comments.get().is_some(),
                ElementCategory::Tag => self.tags.get().is_some(),
                ElementCategory::Title => self.titles.get().is_some(),
                ElementCategory::InternalLink
                | ElementCategory::CategoryLink
                | ElementCategory::FileLink
                | ElementCategory::InterwikiLink => link_ready,
                ElementCategory::ExternalLink => self.external_links.get().is_some(),
                ElementCategory::Template => self.templates.get().is_some(),
                ElementCategory::Isbn => self.isbns.get().is_some(),
            })
            .collect()
    }

    /// Every element of `category`, sorted by begin offset.
    pub fn elements(&self, category: ElementCategory) -> Vec<ElementRef<'_>> {
        match category {
            ElementCategory::Comment => self.comments().iter().map(ElementRef::Comment).collect(),
            ElementCategory::Tag => self.tags().iter().map(ElementRef::Tag).collect(),
            ElementCategory::Title => self.titles().iter().map(ElementRef::Title).collect(),
            ElementCategory::InternalLink => {
                self.internal_links().iter().map(ElementRef::Link).collect()
            }
            ElementCategory::CategoryLink => {
                self.category_links().iter().map(ElementRef::Link).collect()
            }
            ElementCategory::FileLink => self.file_links().iter().map(ElementRef::Link).collect(),
            ElementCategory::InterwikiLink => {
                self.interwiki_links().iter().map(ElementRef::Link).collect()
            }
            ElementCategory::ExternalLink => self
                .external_links()
                .iter()
                .map(ElementRef::ExternalLink)
                .collect(),
            ElementCategory::Template => {
                self.templates().iter().map(ElementRef::Template).collect()
            }
            ElementCategory::Isbn => self.isbns().iter().map(ElementRef::Isbn).collect(),
        }
    }

    /// Innermost element of `category` containing `offset`.
    pub fn element_at(&self, offset: usize, category: ElementCategory) -> Option<ElementRef<'_>> {
        match category {
            ElementCategory::Comment => innermost(self.comments(), offset).map(ElementRef::Comment),
            ElementCategory::Tag => innermost(self.tags(), offset).map(ElementRef::Tag),
            ElementCategory::Title => innermost(self.titles(), offset).map(ElementRef::Title),
            ElementCategory::InternalLink => {
                innermost(self.internal_links(), offset).map(ElementRef::Link)
            }
            ElementCategory::CategoryLink => {
                innermost(self.category_links(), offset).map(ElementRef::Link)
            }
            ElementCategory::FileLink => innermost(self.file_links(), offset).map(ElementRef::Link),
            ElementCategory::InterwikiLink => {
                innermost(self.interwiki_links(), offset).map(ElementRef::Link)
            }
            ElementCategory::ExternalLink => {
                innermost(self.external_links(), offset).map(ElementRef::ExternalLink)
            }
            ElementCategory::Template => {
                innermost(self.templates(), offset).map(ElementRef::Template)
            }
            ElementCategory::Isbn => innermost(self.isbns(), offset).map(ElementRef::Isbn),
        }
    }

    pub fn comment_at(&self, offset: usize) -> Option<&Comment> {
        innermost(self.comments(), offset)
    }

    pub fn tag_at(&self, offset: usize) -> Option<&Tag> {
        innermost(self.tags(), offset)
    }

    pub fn title_at(&self, offset: usize) -> Option<&Title> {
        innermost(self.titles(), offset)
    }

    pub fn internal_link_at(&self, offset: usize) -> Option<&WikiLink> {
        innermost(self.internal_links(), offset)
    }

    pub fn template_at(&self, offset: usize) -> Option<&Template> {
        innermost(self.templates(), offset)
    }

    pub fn isbn_at(&self, offset: usize) -> Option<&IsbnToken> {
        innermost(self.isbns(), offset)
    }
}

/// Elements are sorted by begin and never cross, so the last element
/// starting at or before `offset` that contains it is the innermost one.
fn innermost<T: PageElement>(elements: &[T], offset: usize) -> Option<&T> {
    let upper = elements.partition_point(|element| element.begin() <= offset);
    elements[..upper]
        .iter()
        .rev()
        .find(|element| element.span().contains(offset))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ElementCategory, PageAnalysis, PageElement};
    use crate::site::SiteConfig;

    fn analyze(text: &str) -> PageAnalysis {
        PageAnalysis::new(text, Arc::new(SiteConfig::default()))
    }

    #[test]
    fn categories_are_built_lazily() {
        let analysis = analyze("== A ==\n[[B]]");
        assert!(analysis.computed_categories().is_empty());
        assert_eq!(analysis.internal_links().len(), 1);
        let computed = analysis.computed_categories();
        assert!(computed.contains(&ElementCategory::Comment));
        assert!(computed.contains(&ElementCategory::InternalLink));
        assert!(!computed.contains(&ElementCategory::Title));
    }

    #[test]
    fn memoized_slices_are_stable() {
        let analysis = analyze("{{a}} {{b}}");
        let first = analysis.templates().as_ptr();
        let second = analysis.templates().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn element_at_returns_innermost() {
        let text = "{{outer|{{inner}}}}";
        let analysis = analyze(text);
        let inner = analysis.template_at(10).map(|template| template.name.clone());
        assert_eq!(inner.as_deref(), Some("Inner"));
        let outer = analysis.template_at(3).map(|template| template.name.clone());
        assert_eq!(outer.as_deref(), Some("Outer"));
        assert!(analysis.element_at(text.len(), ElementCategory::Template).is_none());
    }

    #[test]
    fn masked_regions_hide_wikitext() {
        let analysis = analyze("<nowiki>[[A]] {{b}}</nowiki> <code>[[C]]</code> [[D]]");
        let targets: Vec<_> = analysis
            .internal_links()
            .iter()
            .map(|link| link.target.as_str())
            .collect();
        assert_eq!(targets, vec!["D"]);
        assert!(analysis.templates().is_empty());
    }

    #[test]
    fn element_refs_round_trip() {
        let text = "<!-- c -->\n== T ==\n[[A|b]] {{x|y=z}} ISBN 0123456789 [http://e.org e]";
        let analysis = analyze(text);
        for category in ElementCategory::ALL {
            for element in analysis.elements(category) {
                assert_eq!(element.to_wikitext(), element.span().slice(text));
            }
        }
    }
}
