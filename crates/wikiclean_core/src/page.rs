use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::site::SiteConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageId(usize);

impl PageId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationStatus {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Facts gathered about one title during a session.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub namespace: i32,
    pub exists: Option<bool>,
    pub revision_id: Option<u64>,
    pub contents: Option<String>,
    /// Outgoing redirect chain, first hop first.
    pub redirects: Vec<PageId>,
    pub disambiguation: DisambiguationStatus,
    pub links: Vec<PageId>,
    pub backlinks: Vec<PageId>,
    pub embedded_in: Vec<PageId>,
    pub templates: Vec<PageId>,
}

impl Page {
    pub fn is_redirect(&self) -> bool {
        !self.redirects.is_empty()
    }
}

/// Arena of pages keyed by canonical title. Relations between pages are ids
/// into the same store. Pages are never removed.
#[derive(Debug, Clone)]
pub struct PageStore {
    site: Arc<SiteConfig>,
    pages: Vec<Page>,
    by_title: HashMap<String, PageId>,
}

impl PageStore {
    pub fn new(site: Arc<SiteConfig>) -> Self {
        Self {
            site,
            pages: Vec::new(),
            by_title: HashMap::new(),
        }
    }

    pub fn site(&self) -> &Arc<SiteConfig> {
        &self.site
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get_or_create(&mut self, title: &str) -> PageId {
        let canonical = self.site.canonical_title(title);
        if let Some(id) = self.by_title.get(&canonical) {
            return *id;
        }
        let id = PageId(self.pages.len());
        self.pages.push(Page {
            id,
            namespace: self.site.namespace_of(&canonical),
            title: canonical.clone(),
            exists: None,
            revision_id: None,
            contents: None,
            redirects: Vec::new(),
            disambiguation: DisambiguationStatus::Unknown,
            links: Vec::new(),
            backlinks: Vec::new(),
            embedded_in: Vec::new(),
            templates: Vec::new(),
        });
        self.by_title.insert(canonical, id);
        id
    }

    pub fn find(&self, title: &str) -> Option<PageId> {
        self.by_title.get(&self.site.canonical_title(title)).copied()
    }

    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.0]
    }

    pub fn page_mut(&mut self, id: PageId) -> &mut Page {
        &mut self.pages[id.0]
    }

    pub fn title(&self, id: PageId) -> &str {
        &self.pages[id.0].title
    }

    pub fn titles(&self, ids: &[PageId]) -> Vec<String> {
        ids.iter().map(|id| self.title(*id).to_string()).collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn add_link(&mut self, from: PageId, to: PageId) {
        add_unique(&mut self.page_mut(from).links, to);
    }

    pub fn add_backlink(&mut self, to: PageId, from: PageId) {
        add_unique(&mut self.page_mut(to).backlinks, from);
    }

    pub fn add_embedded_in(&mut self, template: PageId, page: PageId) {
        add_unique(&mut self.page_mut(template).embedded_in, page);
    }

    pub fn add_template(&mut self, page: PageId, template: PageId) {
        add_unique(&mut self.page_mut(page).templates, template);
    }

    /// Replace the redirect chain of `page`. An empty chain marks it as not
    /// being a redirect.
    pub fn set_redirects(&mut self, page: PageId, chain: Vec<PageId>) {
        let mut unique = Vec::with_capacity(chain.len());
        for id in chain {
            if id != page {
                add_unique(&mut unique, id);
            }
        }
        self.page_mut(page).redirects = unique;
    }

    /// `page` followed by its redirect chain.
    pub fn redirect_chain_with_page(&self, page: PageId) -> Vec<PageId> {
        let mut chain = vec![page];
        chain.extend(self.page(page).redirects.iter().copied());
        chain
    }

    /// Last page of the redirect chain, or `page` itself.
    pub fn redirect_destination(&self, page: PageId) -> PageId {
        self.page(page).redirects.last().copied().unwrap_or(page)
    }

    pub fn redirects_to(&self, page: PageId, target: PageId) -> bool {
        self.page(page).redirects.contains(&target)
    }

    /// Direct backlinks of `page`, followed by the backlinks of every
    /// redirect leading to it (transitively), without duplicates.
    pub fn backlinks_with_redirects(&self, page: PageId) -> Vec<PageId> {
        let mut out: Vec<PageId> = Vec::new();
        let mut visited: BTreeSet<PageId> = BTreeSet::from([page]);
        let mut queue: VecDeque<PageId> = VecDeque::from([page]);

        while let Some(current) = queue.pop_front() {
            for backlink in &self.page(current).backlinks {
                if *backlink != page {
                    add_unique(&mut out, *backlink);
                }
                if self.redirects_to(*backlink, page) && visited.insert(*backlink) {
                    queue.push_back(*backlink);
                }
            }
        }

        out
    }
}

fn add_unique(list: &mut Vec<PageId>, id: PageId) {
    if !list.contains(&id) {
        list.push(id);
    }
}
