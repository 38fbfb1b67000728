//! Fixed worker pool running gateway jobs.
//!
//! Job bodies execute on worker threads. Everything else (the job table,
//! continuations, [`PageStore`] updates) happens on the thread calling
//! [`Orchestrator::drain`], in completion order.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GatewayError, OrchestratorError};
use crate::gateway::{
    DisambiguationReport, Gateway, GatewayResult, LinkedPage, PageContent, WriteResult,
};
use crate::page::{DisambiguationStatus, PageId, PageStore};

/// Finished jobs whose final state stays queryable through
/// [`Orchestrator::job_state`]. Older entries are forgotten.
const FINISHED_STATE_HISTORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One remote call. `page` fields name the store entry the result is merged
/// into.
#[derive(Debug, Clone)]
pub enum Job {
    Contents {
        page: PageId,
        title: String,
    },
    Links {
        page: PageId,
        title: String,
        namespace: Option<i32>,
    },
    Backlinks {
        page: PageId,
        title: String,
        include_redirects: bool,
    },
    Templates {
        page: PageId,
        title: String,
    },
    EmbeddedIn {
        page: PageId,
        title: String,
        namespaces: Vec<i32>,
    },
    DisambiguationStatus {
        pages: Vec<PageId>,
        titles: Vec<String>,
    },
    Write {
        page: PageId,
        title: String,
        text: String,
        comment: String,
        watch: bool,
    },
    ExpandTemplates {
        title: String,
        text: String,
    },
    ParseText {
        title: String,
        text: String,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Contents { .. } => "contents",
            Self::Links { .. } => "links",
            Self::Backlinks { .. } => "backlinks",
            Self::Templates { .. } => "templates",
            Self::EmbeddedIn { .. } => "embedded_in",
            Self::DisambiguationStatus { .. } => "disambiguation_status",
            Self::Write { .. } => "write",
            Self::ExpandTemplates { .. } => "expand_templates",
            Self::ParseText { .. } => "parse_text",
        }
    }

    fn run(&self, gateway: &dyn Gateway) -> GatewayResult<JobOutput> {
        Ok(match self {
            Self::Contents { title, .. } => JobOutput::Contents(gateway.fetch_content(title)?),
            Self::Links {
                title, namespace, ..
            } => JobOutput::Links(gateway.fetch_links(title, *namespace)?),
            Self::Backlinks {
                title,
                include_redirects,
                ..
            } => JobOutput::Backlinks(gateway.fetch_backlinks(title, *include_redirects)?),
            Self::Templates { title, .. } => JobOutput::Templates(gateway.fetch_templates(title)?),
            Self::EmbeddedIn {
                title, namespaces, ..
            } => JobOutput::EmbeddedIn(gateway.fetch_embedded_in(title, namespaces)?),
            Self::DisambiguationStatus { titles, .. } => {
                JobOutput::Disambiguation(gateway.fetch_disambiguation_status(titles)?)
            }
            Self::Write {
                title,
                text,
                comment,
                watch,
                ..
            } => JobOutput::Written(gateway.write_page(title, text, comment, *watch)?),
            Self::ExpandTemplates { title, text } => {
                JobOutput::Text(gateway.expand_templates(title, text)?)
            }
            Self::ParseText { title, text } => JobOutput::Text(gateway.parse_to_html(title, text)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobOutput {
    Contents(Option<PageContent>),
    Links(Vec<LinkedPage>),
    Backlinks(Vec<LinkedPage>),
    Templates(Vec<String>),
    EmbeddedIn(Vec<String>),
    Disambiguation(DisambiguationReport),
    Written(WriteResult),
    Text(String),
}

pub type Continuation = Box<dyn FnOnce(&mut PageStore, &JobOutput) -> Vec<Task> + Send>;

/// A job plus what to do once its result has been merged.
pub struct Task {
    pub job: Job,
    continuation: Option<Continuation>,
    retain_output: bool,
}

impl Task {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            continuation: None,
            retain_output: false,
        }
    }

    /// Run `continuation` after the result is merged; the returned tasks are
    /// enqueued before this job counts as finished.
    pub fn then(
        mut self,
        continuation: impl FnOnce(&mut PageStore, &JobOutput) -> Vec<Task> + Send + 'static,
    ) -> Self {
        self.continuation = Some(Box::new(continuation));
        self
    }

    /// Keep the output for [`Orchestrator::take_output`].
    pub fn retaining_output(mut self) -> Self {
        self.retain_output = true;
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("job", &self.job)
            .field("continuation", &self.continuation.is_some())
            .field("retain_output", &self.retain_output)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    Drained,
    Pending,
    Stopped,
}

/// Cooperative cancellation usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear_stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct WorkItem {
    id: JobId,
    generation: u64,
    job: Job,
}

enum Event {
    Started(JobId),
    Cancelled(JobId),
    Finished {
        id: JobId,
        job: Job,
        result: GatewayResult<JobOutput>,
    },
}

pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    store: PageStore,
    work_tx: Option<Sender<WorkItem>>,
    events_rx: Receiver<Event>,
    workers: Vec<JoinHandle<()>>,
    stop: StopHandle,
    generation: Arc<AtomicU64>,
    next_id: u64,
    states: BTreeMap<JobId, JobState>,
    finished: VecDeque<JobId>,
    continuations: HashMap<JobId, Continuation>,
    retained: HashSet<JobId>,
    outputs: HashMap<JobId, JobOutput>,
    outstanding: usize,
    failure: Option<OrchestratorError>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, store: PageStore, workers: usize) -> Self {
        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (events_tx, events_rx) = unbounded::<Event>();
        let stop = StopHandle::default();
        let generation = Arc::new(AtomicU64::new(0));

        let handles = (0..workers.max(1))
            .map(|index| {
                let work_rx = work_rx.clone();
                let events_tx = events_tx.clone();
                let gateway = Arc::clone(&gateway);
                let stop = stop.clone();
                let generation = Arc::clone(&generation);
                thread::Builder::new()
                    .name(format!("wikiclean-worker-{index}"))
                    .spawn(move || worker_loop(work_rx, events_tx, gateway, stop, generation))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(error) => {
                    warn!("failed to spawn worker thread: {error}");
                    None
                }
            })
            .collect();

        Self {
            gateway,
            store,
            work_tx: Some(work_tx),
            events_rx,
            workers: handles,
            stop,
            generation,
            next_id: 0,
            states: BTreeMap::new(),
            finished: VecDeque::new(),
            continuations: HashMap::new(),
            retained: HashSet::new(),
            outputs: HashMap::new(),
            outstanding: 0,
            failure: None,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PageStore {
        &mut self.store
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn clear_stop(&self) {
        self.stop.clear_stop();
    }

    /// State of a job. `None` for unknown ids and for jobs that finished
    /// long enough ago to have left the state history.
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        self.states.get(&id).copied()
    }

    /// Jobs neither finished nor cancelled.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn take_output(&mut self, id: JobId) -> Option<JobOutput> {
        self.outputs.remove(&id)
    }

    pub fn submit(&mut self, task: Task) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;

        if self.stop.is_stop_requested() {
            debug!("job {id} ({}) cancelled before queueing", task.job.kind());
            self.states.insert(id, JobState::Cancelled);
            self.remember_finished(id);
            return id;
        }

        let Task {
            job,
            continuation,
            retain_output,
        } = task;
        let kind = job.kind();
        let item = WorkItem {
            id,
            generation: self.generation.load(Ordering::SeqCst),
            job,
        };
        let sent = self
            .work_tx
            .as_ref()
            .is_some_and(|sender| sender.send(item).is_ok());
        if !sent {
            warn!("job {id} ({kind}) dropped: worker pool is shut down");
            self.states.insert(id, JobState::Cancelled);
            self.remember_finished(id);
            return id;
        }

        debug!("job {id} ({kind}) queued");
        self.states.insert(id, JobState::Queued);
        if let Some(continuation) = continuation {
            self.continuations.insert(id, continuation);
        }
        if retain_output {
            self.retained.insert(id);
        }
        self.outstanding += 1;
        id
    }

    pub fn drain(&mut self, blocking: bool) -> Result<DrainStatus, OrchestratorError> {
        while self.outstanding > 0 {
            let event = if blocking {
                self.events_rx
                    .recv()
                    .map_err(|_| OrchestratorError::PoolClosed)?
            } else {
                match self.events_rx.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => return Ok(DrainStatus::Pending),
                    Err(TryRecvError::Disconnected) => return Err(OrchestratorError::PoolClosed),
                }
            };
            self.handle(event);
        }

        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        if self.stop.is_stop_requested() {
            return Ok(DrainStatus::Stopped);
        }
        Ok(DrainStatus::Drained)
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Started(id) => {
                self.states.insert(id, JobState::Running);
            }
            Event::Cancelled(id) => {
                debug!("job {id} cancelled");
                self.finish(id, JobState::Cancelled);
            }
            Event::Finished {
                id,
                job,
                result: Ok(output),
            } => {
                debug!("job {id} ({}) completed", job.kind());
                apply_output(&mut self.store, &job, &output);
                let continuation = self.continuations.remove(&id);
                if let Some(continuation) = continuation
                    && !self.stop.is_stop_requested()
                    && self.failure.is_none()
                {
                    for follow_up in continuation(&mut self.store, &output) {
                        self.submit(follow_up);
                    }
                }
                if self.retained.remove(&id) {
                    self.outputs.insert(id, output);
                }
                self.finish(id, JobState::Completed);
            }
            Event::Finished {
                id,
                job,
                result: Err(source),
            } => {
                warn!("job {id} ({}) failed: {source}", job.kind());
                if self.failure.is_none() {
                    // Bump the generation so queued items are cancelled by the workers.
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    self.failure = Some(OrchestratorError::Gateway {
                        job: id,
                        kind: job.kind(),
                        source,
                    });
                }
                self.finish(id, JobState::Failed);
            }
        }
    }

    fn finish(&mut self, id: JobId, state: JobState) {
        self.states.insert(id, state);
        self.remember_finished(id);
        self.continuations.remove(&id);
        self.retained.remove(&id);
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    fn remember_finished(&mut self, id: JobId) {
        self.finished.push_back(id);
        while self.finished.len() > FINISHED_STATE_HISTORY {
            if let Some(oldest) = self.finished.pop_front() {
                self.states.remove(&oldest);
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop.request_stop();
        self.work_tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    work_rx: Receiver<WorkItem>,
    events_tx: Sender<Event>,
    gateway: Arc<dyn Gateway>,
    stop: StopHandle,
    generation: Arc<AtomicU64>,
) {
    for item in work_rx {
        let event = if stop.is_stop_requested()
            || item.generation != generation.load(Ordering::SeqCst)
        {
            Event::Cancelled(item.id)
        } else {
            if events_tx.send(Event::Started(item.id)).is_err() {
                break;
            }
            let result = catch_unwind(AssertUnwindSafe(|| item.job.run(gateway.as_ref())))
                .unwrap_or_else(|payload| Err(GatewayError::Panicked(panic_message(payload))));
            Event::Finished {
                id: item.id,
                job: item.job,
                result,
            }
        };
        if events_tx.send(event).is_err() {
            break;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Merge one job result into the store. Merges only add facts, so the order
/// results arrive in does not matter.
fn apply_output(store: &mut PageStore, job: &Job, output: &JobOutput) {
    match (job, output) {
        (Job::Contents { page, .. }, JobOutput::Contents(content)) => {
            let entry = store.page_mut(*page);
            match content {
                Some(content) => {
                    entry.exists = Some(true);
                    entry.revision_id = content.revision_id;
                    entry.contents = Some(content.text.clone());
                }
                None => {
                    entry.exists = Some(false);
                    entry.contents = None;
                }
            }
        }
        (Job::Links { page, .. }, JobOutput::Links(links)) => {
            for linked in links {
                let id = merge_linked_page(store, linked);
                store.add_link(*page, id);
            }
        }
        (Job::Backlinks { page, .. }, JobOutput::Backlinks(backlinks)) => {
            for linked in backlinks {
                let id = merge_linked_page(store, linked);
                store.add_backlink(*page, id);
            }
        }
        (Job::Templates { page, .. }, JobOutput::Templates(templates)) => {
            for title in templates {
                let id = store.get_or_create(title);
                store.add_template(*page, id);
            }
        }
        (Job::EmbeddedIn { page, .. }, JobOutput::EmbeddedIn(titles)) => {
            for title in titles {
                let id = store.get_or_create(title);
                store.add_embedded_in(*page, id);
            }
        }
        (Job::DisambiguationStatus { pages, .. }, JobOutput::Disambiguation(report)) => {
            merge_disambiguation(store, pages, report);
        }
        (Job::Write { page, text, .. }, JobOutput::Written(result)) => {
            let entry = store.page_mut(*page);
            entry.exists = Some(true);
            if result.changed {
                entry.contents = Some(text.clone());
                if result.new_revision_id.is_some() {
                    entry.revision_id = result.new_revision_id;
                }
            }
        }
        _ => {}
    }
}

fn merge_linked_page(store: &mut PageStore, linked: &LinkedPage) -> PageId {
    let id = store.get_or_create(&linked.title);
    if let Some(exists) = linked.exists {
        store.page_mut(id).exists = Some(exists);
    }
    if !linked.redirect_targets.is_empty() {
        let chain: Vec<PageId> = linked
            .redirect_targets
            .iter()
            .map(|title| store.get_or_create(title))
            .collect();
        store.set_redirects(id, chain);
    }
    id
}

fn merge_disambiguation(store: &mut PageStore, pages: &[PageId], report: &DisambiguationReport) {
    let statuses: HashMap<String, bool> = report
        .statuses
        .iter()
        .map(|(title, status)| (store.site().canonical_title(title), *status))
        .collect();

    for page in pages {
        let title = store.title(*page).to_string();
        let chain: Vec<PageId> = report
            .redirect_chain(&title)
            .iter()
            .map(|target| store.get_or_create(target))
            .collect();
        if !chain.is_empty() {
            store.set_redirects(*page, chain);
        }
        for id in store.redirect_chain_with_page(*page) {
            let known = statuses.get(store.title(id)).copied().unwrap_or(false);
            store.page_mut(id).disambiguation = if known {
                DisambiguationStatus::Yes
            } else {
                DisambiguationStatus::No
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::{
        DrainStatus, FINISHED_STATE_HISTORY, Job, JobOutput, JobState, Orchestrator, Task,
    };
    use crate::error::GatewayError;
    use crate::gateway::{
        DisambiguationReport, Gateway, GatewayResult, LinkedPage, PageContent, WriteResult,
    };
    use crate::page::PageStore;
    use crate::site::SiteConfig;

    #[derive(Default)]
    struct MockApi {
        request_count: AtomicUsize,
    }

    impl Gateway for MockApi {
        fn max_pages_per_query(&self) -> usize {
            50
        }

        fn fetch_content(&self, title: &str) -> GatewayResult<Option<PageContent>> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            if title == "Broken" {
                return Err(GatewayError::Network("connection reset".to_string()));
            }
            if title == "Panic" {
                panic!("gateway bug");
            }
            Ok(Some(PageContent {
                title: title.to_string(),
                namespace: 0,
                revision_id: Some(7),
                timestamp: None,
                text: format!("text of {title}"),
            }))
        }

        fn fetch_links(&self, _: &str, _: Option<i32>) -> GatewayResult<Vec<LinkedPage>> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![LinkedPage::new("Target", 0)])
        }

        fn fetch_backlinks(&self, _: &str, _: bool) -> GatewayResult<Vec<LinkedPage>> {
            Ok(Vec::new())
        }

        fn fetch_templates(&self, _: &str) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_embedded_in(&self, _: &str, _: &[i32]) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_disambiguation_status(&self, _: &[String]) -> GatewayResult<DisambiguationReport> {
            Ok(DisambiguationReport::default())
        }

        fn write_page(&self, title: &str, _: &str, _: &str, _: bool) -> GatewayResult<WriteResult> {
            Ok(WriteResult {
                title: title.to_string(),
                new_revision_id: Some(8),
                changed: true,
            })
        }

        fn expand_templates(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(text.to_uppercase())
        }

        fn parse_to_html(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(format!("<p>{text}</p>"))
        }

        fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }
    }

    fn orchestrator(workers: usize) -> Orchestrator {
        Orchestrator::new(
            Arc::new(MockApi::default()),
            PageStore::new(Arc::new(SiteConfig::default())),
            workers,
        )
    }

    fn contents_job(orchestrator: &mut Orchestrator, title: &str) -> Job {
        let page = orchestrator.store_mut().get_or_create(title);
        Job::Contents {
            page,
            title: title.to_string(),
        }
    }

    #[test]
    fn drains_results_into_the_store() {
        let mut orchestrator = orchestrator(2);
        let job = contents_job(&mut orchestrator, "A");
        let id = orchestrator.submit(Task::new(job));
        assert_eq!(orchestrator.drain(true).expect("drain"), DrainStatus::Drained);
        assert_eq!(orchestrator.job_state(id), Some(JobState::Completed));
        let page = orchestrator.store().find("A").expect("page");
        assert_eq!(
            orchestrator.store().page(page).contents.as_deref(),
            Some("text of A")
        );
    }

    #[test]
    fn continuations_enqueue_follow_up_jobs() {
        let mut orchestrator = orchestrator(2);
        let job = contents_job(&mut orchestrator, "A");
        orchestrator.submit(Task::new(job).then(|store, _| {
            let page = store.get_or_create("A");
            vec![Task::new(Job::Links {
                page,
                title: "A".to_string(),
                namespace: None,
            })]
        }));
        assert_eq!(orchestrator.drain(true).expect("drain"), DrainStatus::Drained);
        let store = orchestrator.store();
        let a = store.find("A").expect("A");
        let target = store.find("Target").expect("Target");
        assert_eq!(store.page(a).links, vec![target]);
    }

    #[test]
    fn retained_outputs_can_be_taken_once() {
        let mut orchestrator = orchestrator(1);
        let id = orchestrator.submit(
            Task::new(Job::ExpandTemplates {
                title: "A".to_string(),
                text: "abc".to_string(),
            })
            .retaining_output(),
        );
        orchestrator.drain(true).expect("drain");
        assert_eq!(
            orchestrator.take_output(id),
            Some(JobOutput::Text("ABC".to_string()))
        );
        assert_eq!(orchestrator.take_output(id), None);
    }

    #[test]
    fn gateway_failure_is_reported_and_completed_results_persist() {
        let mut orchestrator = orchestrator(1);
        let ok = contents_job(&mut orchestrator, "A");
        let broken = contents_job(&mut orchestrator, "Broken");
        orchestrator.submit(Task::new(ok));
        let failing = orchestrator.submit(Task::new(broken));
        let error = orchestrator.drain(true).expect_err("must fail");
        assert_eq!(
            error.gateway_error(),
            Some(&GatewayError::Network("connection reset".to_string()))
        );
        assert_eq!(orchestrator.job_state(failing), Some(JobState::Failed));
        let a = orchestrator.store().find("A").expect("A");
        assert!(orchestrator.store().page(a).contents.is_some());
        assert_eq!(orchestrator.outstanding(), 0);
    }

    #[test]
    fn stop_cancels_queued_jobs_until_cleared() {
        let mut orchestrator = orchestrator(1);
        orchestrator.request_stop();
        let job = contents_job(&mut orchestrator, "A");
        let id = orchestrator.submit(Task::new(job.clone()));
        assert_eq!(orchestrator.job_state(id), Some(JobState::Cancelled));
        assert_eq!(orchestrator.drain(true).expect("drain"), DrainStatus::Stopped);
        assert_eq!(orchestrator.gateway().request_count(), 0);

        orchestrator.stop_handle().clear_stop();
        orchestrator.submit(Task::new(job));
        assert_eq!(orchestrator.drain(true).expect("drain"), DrainStatus::Drained);
        assert_eq!(orchestrator.gateway().request_count(), 1);
    }

    #[test]
    fn non_blocking_drain_reports_pending_work() {
        let mut orchestrator = orchestrator(1);
        assert_eq!(orchestrator.drain(false).expect("drain"), DrainStatus::Drained);
        let job = contents_job(&mut orchestrator, "A");
        orchestrator.submit(Task::new(job));
        let mut status = orchestrator.drain(false).expect("drain");
        while status == DrainStatus::Pending {
            std::thread::yield_now();
            status = orchestrator.drain(false).expect("drain");
        }
        assert_eq!(status, DrainStatus::Drained);
    }

    #[test]
    fn panicking_gateway_fails_the_job_instead_of_hanging() {
        let mut orchestrator = orchestrator(2);
        let ok = contents_job(&mut orchestrator, "A");
        let panicking = contents_job(&mut orchestrator, "Panic");
        orchestrator.submit(Task::new(ok));
        let id = orchestrator.submit(Task::new(panicking));
        let error = orchestrator.drain(true).expect_err("must fail");
        assert_eq!(
            error.gateway_error(),
            Some(&GatewayError::Panicked("gateway bug".to_string()))
        );
        assert_eq!(orchestrator.job_state(id), Some(JobState::Failed));
        assert_eq!(orchestrator.outstanding(), 0);
    }

    #[test]
    fn finished_states_are_forgotten_past_the_history_limit() {
        let mut orchestrator = orchestrator(2);
        let ids: Vec<_> = (0..FINISHED_STATE_HISTORY + 10)
            .map(|index| {
                orchestrator.submit(Task::new(Job::ExpandTemplates {
                    title: format!("P{index}"),
                    text: "x".to_string(),
                }))
            })
            .collect();
        assert_eq!(orchestrator.drain(true).expect("drain"), DrainStatus::Drained);
        assert!(orchestrator.states.len() <= FINISHED_STATE_HISTORY);
        assert_eq!(orchestrator.job_state(ids[0]), None);
        assert_eq!(
            orchestrator.job_state(ids[ids.len() - 1]),
            Some(JobState::Completed)
        );
    }

    /// Holds every content fetch until released, tracking how many run at
    /// once.
    #[derive(Default)]
    struct GatedApi {
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
        released: AtomicBool,
    }

    impl Gateway for GatedApi {
        fn max_pages_per_query(&self) -> usize {
            50
        }

        fn fetch_content(&self, title: &str) -> GatewayResult<Option<PageContent>> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(PageContent {
                title: title.to_string(),
                namespace: 0,
                revision_id: None,
                timestamp: None,
                text: String::new(),
            }))
        }

        fn fetch_links(&self, _: &str, _: Option<i32>) -> GatewayResult<Vec<LinkedPage>> {
            Ok(Vec::new())
        }

        fn fetch_backlinks(&self, _: &str, _: bool) -> GatewayResult<Vec<LinkedPage>> {
            Ok(Vec::new())
        }

        fn fetch_templates(&self, _: &str) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_embedded_in(&self, _: &str, _: &[i32]) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_disambiguation_status(&self, _: &[String]) -> GatewayResult<DisambiguationReport> {
            Ok(DisambiguationReport::default())
        }

        fn write_page(&self, title: &str, _: &str, _: &str, _: bool) -> GatewayResult<WriteResult> {
            Ok(WriteResult {
                title: title.to_string(),
                new_revision_id: None,
                changed: false,
            })
        }

        fn expand_templates(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(text.to_string())
        }

        fn parse_to_html(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(text.to_string())
        }
    }

    #[test]
    fn stop_during_work_finishes_in_flight_jobs_and_cancels_the_rest() {
        let api = Arc::new(GatedApi::default());
        let gateway: Arc<dyn Gateway> = api.clone();
        let mut orchestrator = Orchestrator::new(
            gateway,
            PageStore::new(Arc::new(SiteConfig::default())),
            2,
        );
        let continuations_run = Arc::new(AtomicUsize::new(0));
        let ids: Vec<_> = (0..10)
            .map(|index| {
                let job = contents_job(&mut orchestrator, &format!("P{index}"));
                let counter = Arc::clone(&continuations_run);
                orchestrator.submit(Task::new(job).then(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Vec::new()
                }))
            })
            .collect();

        let stop = orchestrator.stop_handle();
        let stopper_api = Arc::clone(&api);
        let stopper = thread::spawn(move || {
            while stopper_api.calls.load(Ordering::SeqCst) < 2 {
                thread::sleep(Duration::from_millis(1));
            }
            stop.request_stop();
            stopper_api.released.store(true, Ordering::SeqCst);
        });

        let status = orchestrator.drain(true).expect("drain");
        stopper.join().expect("stopper thread");

        assert_eq!(status, DrainStatus::Stopped);
        assert_eq!(api.max_running.load(Ordering::SeqCst), 2);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert_eq!(continuations_run.load(Ordering::SeqCst), 0);
        let count = |state: JobState| {
            ids.iter()
                .filter(|id| orchestrator.job_state(**id) == Some(state))
                .count()
        };
        assert_eq!(count(JobState::Completed), 2);
        assert_eq!(count(JobState::Cancelled), 8);
        assert_eq!(orchestrator.outstanding(), 0);
    }
}
