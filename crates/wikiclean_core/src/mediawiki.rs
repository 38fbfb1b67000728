//! Bulk wiki operations built on the [`Orchestrator`].
//!
//! Each operation enqueues its jobs and drains them before returning, so the
//! [`PageStore`] holds every merged fact when the call comes back.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use crate::error::OrchestratorError;
use crate::gateway::{Gateway, WriteResult};
use crate::orchestrator::{DrainStatus, Job, JobId, JobOutput, Orchestrator, StopHandle, Task};
use crate::page::{DisambiguationStatus, PageId, PageStore};
use crate::site::NS_MAIN;

pub type OperationResult<T> = Result<T, OrchestratorError>;

/// Literal replacement used by [`MediaWiki::replace_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextReplacement {
    pub from: String,
    pub to: String,
}

impl TextReplacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceReport {
    /// Pages whose contents changed and were written.
    pub count: usize,
    /// `Page X:` followed by ` - from => to` lines for every change.
    pub description: String,
}

pub struct MediaWiki {
    orchestrator: Orchestrator,
}

impl MediaWiki {
    pub fn new(gateway: Arc<dyn Gateway>, store: PageStore, workers: usize) -> Self {
        Self {
            orchestrator: Orchestrator::new(gateway, store, workers),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn store(&self) -> &PageStore {
        self.orchestrator.store()
    }

    pub fn store_mut(&mut self) -> &mut PageStore {
        self.orchestrator.store_mut()
    }

    pub fn page(&mut self, title: &str) -> PageId {
        self.store_mut().get_or_create(title)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.orchestrator.stop_handle()
    }

    pub fn retrieve_contents(&mut self, pages: &[PageId]) -> OperationResult<DrainStatus> {
        for page in pages {
            let title = self.store().title(*page).to_string();
            self.orchestrator.submit(Task::new(Job::Contents {
                page: *page,
                title,
            }));
        }
        self.orchestrator.drain(true)
    }

    /// Links of each page. Redirecting links carry their chain.
    pub fn retrieve_links(
        &mut self,
        pages: &[PageId],
        namespace: Option<i32>,
    ) -> OperationResult<DrainStatus> {
        for page in pages {
            let title = self.store().title(*page).to_string();
            self.orchestrator.submit(Task::new(Job::Links {
                page: *page,
                title,
                namespace,
            }));
        }
        self.orchestrator.drain(true)
    }

    pub fn retrieve_backlinks(
        &mut self,
        pages: &[PageId],
        include_redirects: bool,
    ) -> OperationResult<DrainStatus> {
        for page in pages {
            let title = self.store().title(*page).to_string();
            self.orchestrator.submit(Task::new(Job::Backlinks {
                page: *page,
                title,
                include_redirects,
            }));
        }
        self.orchestrator.drain(true)
    }

    /// Backlinks of each page and, transitively, of every redirect leading to
    /// it. Each title is queried at most once.
    pub fn retrieve_all_backlinks(&mut self, pages: &[PageId]) -> OperationResult<DrainStatus> {
        let visited: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(BTreeSet::new()));
        for page in pages {
            let title = self.store().title(*page).to_string();
            let first_visit = lock(&visited).insert(title.clone());
            if first_visit {
                let task = backlink_closure_task(*page, title, Arc::clone(&visited));
                self.orchestrator.submit(task);
            }
        }
        let status = self.orchestrator.drain(true)?;
        info!("backlink closure visited {} titles", lock(&visited).len());
        Ok(status)
    }

    pub fn retrieve_templates(&mut self, page: PageId) -> OperationResult<DrainStatus> {
        let title = self.store().title(page).to_string();
        self.orchestrator
            .submit(Task::new(Job::Templates { page, title }));
        self.orchestrator.drain(true)
    }

    pub fn retrieve_all_embedded_in(
        &mut self,
        pages: &[PageId],
        namespaces: &[i32],
    ) -> OperationResult<DrainStatus> {
        for page in pages {
            let title = self.store().title(*page).to_string();
            self.orchestrator.submit(Task::new(Job::EmbeddedIn {
                page: *page,
                title,
                namespaces: namespaces.to_vec(),
            }));
        }
        self.orchestrator.drain(true)
    }

    /// Disambiguation status of `pages`, queried in chunks of at most
    /// `max_pages_per_query` titles. With `fetch_links`, the links of every
    /// disambiguation page met (redirect targets included) are retrieved
    /// afterwards.
    pub fn retrieve_disambiguation_information(
        &mut self,
        pages: &[PageId],
        fetch_links: bool,
    ) -> OperationResult<DrainStatus> {
        let mut remote: Vec<PageId> = Vec::new();
        for page in pages {
            let entry = self.store_mut().page_mut(*page);
            if entry.namespace != NS_MAIN {
                entry.disambiguation = DisambiguationStatus::No;
            } else if !remote.contains(page) {
                remote.push(*page);
            }
        }

        let chunk_size = self.orchestrator.gateway().max_pages_per_query().max(1);
        for chunk in remote.chunks(chunk_size) {
            let titles = self.store().titles(chunk);
            self.orchestrator.submit(Task::new(Job::DisambiguationStatus {
                pages: chunk.to_vec(),
                titles,
            }));
        }
        let status = self.orchestrator.drain(true)?;
        if status != DrainStatus::Drained || !fetch_links {
            return Ok(status);
        }

        let mut disambiguations: Vec<PageId> = Vec::new();
        for page in pages {
            for id in self.store().redirect_chain_with_page(*page) {
                if self.store().page(id).disambiguation == DisambiguationStatus::Yes
                    && !disambiguations.contains(&id)
                {
                    disambiguations.push(id);
                }
            }
        }
        self.retrieve_links(&disambiguations, None)
    }

    /// Apply literal replacements, grouped by label, to every page and write
    /// the pages that changed. The edit comment lists the labels used.
    pub fn replace_text(
        &mut self,
        pages: &[PageId],
        replacements: &BTreeMap<String, Vec<TextReplacement>>,
        comment: &str,
    ) -> OperationResult<ReplaceReport> {
        let mut report = ReplaceReport::default();
        if pages.is_empty() || replacements.is_empty() {
            return Ok(report);
        }
        if self.retrieve_contents(pages)? == DrainStatus::Stopped {
            return Ok(report);
        }

        for page in pages {
            let Some(old_contents) = self.store().page(*page).contents.clone() else {
                continue;
            };
            let title = self.store().title(*page).to_string();
            let mut new_contents = old_contents.clone();
            let mut labels: Vec<&str> = Vec::new();
            let mut page_described = false;

            for (label, values) in replacements {
                for replacement in values {
                    if replacement.from.is_empty() || !new_contents.contains(&replacement.from) {
                        continue;
                    }
                    new_contents = new_contents.replace(&replacement.from, &replacement.to);
                    if !page_described {
                        report.description.push_str(&format!("Page {title}:\n"));
                        page_described = true;
                    }
                    report
                        .description
                        .push_str(&format!(" - {} => {}\n", replacement.from, replacement.to));
                    if !labels.contains(&label.as_str()) {
                        labels.push(label);
                    }
                }
            }

            if new_contents != old_contents {
                report.count += 1;
                let comment = create_update_page_comment(comment, &labels.join(", "));
                self.orchestrator.submit(Task::new(Job::Write {
                    page: *page,
                    title,
                    text: new_contents,
                    comment,
                    watch: false,
                }));
            }
        }
        self.orchestrator.drain(true)?;
        info!("replace_text modified {} of {} pages", report.count, pages.len());
        Ok(report)
    }

    /// Expanded wikitext, or `None` when the operation was stopped.
    pub fn expand_templates(&mut self, title: &str, text: &str) -> OperationResult<Option<String>> {
        let id = self.orchestrator.submit(
            Task::new(Job::ExpandTemplates {
                title: title.to_string(),
                text: text.to_string(),
            })
            .retaining_output(),
        );
        self.single_text_output(id)
    }

    /// Rendered HTML, or `None` when the operation was stopped.
    pub fn parse_text(&mut self, title: &str, text: &str) -> OperationResult<Option<String>> {
        let id = self.orchestrator.submit(
            Task::new(Job::ParseText {
                title: title.to_string(),
                text: text.to_string(),
            })
            .retaining_output(),
        );
        self.single_text_output(id)
    }

    pub fn update_page(
        &mut self,
        page: PageId,
        text: &str,
        comment: &str,
        watch: bool,
    ) -> OperationResult<Option<WriteResult>> {
        let title = self.store().title(page).to_string();
        let id = self.orchestrator.submit(
            Task::new(Job::Write {
                page,
                title,
                text: text.to_string(),
                comment: comment.to_string(),
                watch,
            })
            .retaining_output(),
        );
        self.orchestrator.drain(true)?;
        Ok(match self.orchestrator.take_output(id) {
            Some(JobOutput::Written(result)) => Some(result),
            _ => None,
        })
    }

    fn single_text_output(&mut self, id: JobId) -> OperationResult<Option<String>> {
        self.orchestrator.drain(true)?;
        Ok(match self.orchestrator.take_output(id) {
            Some(JobOutput::Text(text)) => Some(text),
            _ => None,
        })
    }
}

/// `"<text> - <details>"`, dropping whichever part is empty.
pub fn create_update_page_comment(text: &str, details: &str) -> String {
    match (text.is_empty(), details.is_empty()) {
        (false, false) => format!("{text} - {details}"),
        (false, true) => text.to_string(),
        (true, _) => details.to_string(),
    }
}

fn backlink_closure_task(page: PageId, title: String, visited: Arc<Mutex<BTreeSet<String>>>) -> Task {
    Task::new(Job::Backlinks {
        page,
        title,
        include_redirects: true,
    })
    .then(move |store, output| {
        let JobOutput::Backlinks(backlinks) = output else {
            return Vec::new();
        };
        let mut follow_ups = Vec::new();
        for linked in backlinks {
            let Some(alias) = store.find(&linked.title) else {
                continue;
            };
            if alias == page || !store.redirects_to(alias, page) {
                continue;
            }
            let alias_title = store.title(alias).to_string();
            if lock(&visited).insert(alias_title.clone()) {
                follow_ups.push(backlink_closure_task(
                    alias,
                    alias_title,
                    Arc::clone(&visited),
                ));
            }
        }
        follow_ups
    })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
