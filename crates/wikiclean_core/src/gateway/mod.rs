//! Remote wiki access.
//!
//! Every orchestrated job body calls one [`Gateway`] method from a worker
//! thread, so implementations are shared (`&self`) and must be `Sync`.

pub mod mediawiki;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::GatewayError;

pub use mediawiki::{GatewayConfig, MediaWikiGateway};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageContent {
    pub title: String,
    pub namespace: i32,
    pub revision_id: Option<u64>,
    pub timestamp: Option<String>,
    pub text: String,
}

/// A page returned by a link, backlink or embedded-in query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedPage {
    pub title: String,
    pub namespace: i32,
    pub exists: Option<bool>,
    /// Redirect chain starting from this page, first hop first. Empty when
    /// the page is not a redirect or the chain is unknown.
    pub redirect_targets: Vec<String>,
}

impl LinkedPage {
    pub fn new(title: impl Into<String>, namespace: i32) -> Self {
        Self {
            title: title.into(),
            namespace,
            exists: None,
            redirect_targets: Vec::new(),
        }
    }

    pub fn redirecting_to(mut self, chain: Vec<String>) -> Self {
        self.redirect_targets = chain;
        self
    }
}

/// Result of one disambiguation status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisambiguationReport {
    /// Status of every title the wiki reported on, redirect targets included.
    pub statuses: BTreeMap<String, bool>,
    /// `from -> to` redirect resolutions met during the query.
    pub redirects: BTreeMap<String, String>,
}

impl DisambiguationReport {
    pub fn merge(&mut self, other: DisambiguationReport) {
        self.statuses.extend(other.statuses);
        self.redirects.extend(other.redirects);
    }

    /// Redirect chain of `title` as resolved by this report.
    pub fn redirect_chain(&self, title: &str) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = title;
        while let Some(next) = self.redirects.get(current) {
            if next == title || chain.iter().any(|seen| seen == next) {
                break;
            }
            chain.push(next.clone());
            current = next;
        }
        chain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub title: String,
    pub new_revision_id: Option<u64>,
    /// False when the wiki reported the edit as a no-op.
    pub changed: bool,
}

pub trait Gateway: Send + Sync {
    /// Most titles accepted by one multi-page query.
    fn max_pages_per_query(&self) -> usize;

    fn fetch_content(&self, title: &str) -> GatewayResult<Option<PageContent>>;

    fn fetch_links(&self, title: &str, namespace: Option<i32>) -> GatewayResult<Vec<LinkedPage>>;

    fn fetch_backlinks(&self, title: &str, include_redirects: bool)
    -> GatewayResult<Vec<LinkedPage>>;

    fn fetch_templates(&self, title: &str) -> GatewayResult<Vec<String>>;

    fn fetch_embedded_in(&self, title: &str, namespaces: &[i32]) -> GatewayResult<Vec<String>>;

    fn fetch_disambiguation_status(&self, titles: &[String])
    -> GatewayResult<DisambiguationReport>;

    fn write_page(
        &self,
        title: &str,
        text: &str,
        comment: &str,
        watch: bool,
    ) -> GatewayResult<WriteResult>;

    fn expand_templates(&self, title: &str, text: &str) -> GatewayResult<String>;

    fn parse_to_html(&self, title: &str, text: &str) -> GatewayResult<String>;

    fn request_count(&self) -> usize {
        0
    }
}
