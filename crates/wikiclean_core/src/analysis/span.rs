use serde::Serialize;

/// Half-open byte range `[begin, end)` over a page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end, "span begin {begin} after end {end}");
        Self { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.begin <= offset && offset < self.end
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// True when the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// True when the ranges overlap without one containing the other.
    pub fn crosses(&self, other: &Span) -> bool {
        self.overlaps(other) && !self.contains_span(other) && !other.contains_span(self)
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.begin..self.end]
    }
}

/// Common surface of every element extracted from wikitext.
pub trait PageElement {
    fn span(&self) -> Span;

    /// Literal wikitext of the element. For an unmodified element this is
    /// exactly the slice of the page text covered by [`PageElement::span`].
    fn to_wikitext(&self) -> String;

    fn begin(&self) -> usize {
        self.span().begin
    }

    fn end(&self) -> usize {
        self.span().end
    }
}

/// Sorted, non-overlapping regions whose content is not wikitext
/// (comments, `<nowiki>`, `<pre>`, ...).
#[derive(Debug, Clone, Default)]
pub struct Masks {
    regions: Vec<Span>,
}

impl Masks {
    pub(crate) fn from_regions(mut regions: Vec<Span>) -> Self {
        regions.sort();
        let mut merged: Vec<Span> = Vec::with_capacity(regions.len());
        for region in regions {
            if let Some(last) = merged.last_mut()
                && region.begin <= last.end
            {
                last.end = last.end.max(region.end);
                continue;
            }
            merged.push(region);
        }
        Self { regions: merged }
    }

    pub fn region_at(&self, offset: usize) -> Option<Span> {
        let index = self.regions.partition_point(|region| region.begin <= offset);
        if index == 0 {
            return None;
        }
        let candidate = self.regions[index - 1];
        candidate.contains(offset).then_some(candidate)
    }

    pub fn is_masked(&self, offset: usize) -> bool {
        self.region_at(offset).is_some()
    }

    pub fn regions(&self) -> &[Span] {
        &self.regions
    }
}
