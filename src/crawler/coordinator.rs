//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that wires the frontier, the fetch
//! executor, the politeness governor and the extractor/sink collaborators:
//! - Seeding the frontier
//! - Running a pool of fetch workers over the shared frontier
//! - Streaming terminal outcomes to the sink in completion order
//! - Tracking the run phase and statistics
//! - Handling cancellation without losing finished results

use crate::config::{resolve_host_scope, validate, Config};
use crate::crawler::extractor::{DiscoveredLink, ExtractError, Extractor, HtmlLinkExtractor};
use crate::crawler::fetcher::{
    FetchExecutor, FetchOutcome, FetchedPage, HttpTransport, Transport,
};
use crate::crawler::politeness::{PolitenessGovernor, ProcessMemorySampler, ResourceSampler};
use crate::crawler::priority::PriorityPolicy;
use crate::frontier::{Frontier, Rejection, UrlEntry, MAX_PRIORITY};
use crate::output::{
    CrawlRecord, CrawlStatistics, FinalOutcome, LogSink, RejectionCounts, Sink, SqliteSink,
};
use crate::url::UrlKey;
use crate::CrawlError;
use chrono::Utc;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Records buffered between the workers and the sink task
const RECORD_BUFFER: usize = 256;

/// Lifecycle of a crawl run
///
/// `Idle → Running → {Draining | Exhausted} → Done`. `Draining` means the
/// frontier hit its cap: queued work still finishes but nothing new gets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Running,
    Draining,
    Exhausted,
    Done,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Exhausted => "exhausted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Exhausted,
    Cancelled,
}

/// What a worker found when it looked at the frontier
enum FrontierState {
    Ready,
    Wait,
    Exhausted,
}

/// State shared by every worker of one run
struct CrawlContext {
    frontier: Mutex<Frontier>,
    executor: FetchExecutor,
    governor: PolitenessGovernor,
    extractor: Arc<dyn Extractor>,
    priority: PriorityPolicy,
    phase: Mutex<CrawlPhase>,
    stats: Mutex<CrawlStatistics>,
    /// Signalled whenever a worker finishes an item
    work_available: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CrawlContext {
    fn phase(&self) -> CrawlPhase {
        *lock(&self.phase)
    }

    fn set_phase(&self, next: CrawlPhase) {
        let mut phase = lock(&self.phase);
        let current = *phase;
        if current != next {
            tracing::info!(from = %current, to = %next, "Crawl phase changed");
            *phase = next;
        }
    }

    /// Idle → Running; returns `false` if the run already started
    fn begin(&self) -> bool {
        let mut phase = lock(&self.phase);
        if *phase != CrawlPhase::Idle {
            return false;
        }
        tracing::info!(
            from = %CrawlPhase::Idle,
            to = %CrawlPhase::Running,
            "Crawl phase changed"
        );
        *phase = CrawlPhase::Running;
        true
    }

    /// Running → Draining; no-op in any other phase
    fn enter_draining(&self) {
        let mut phase = lock(&self.phase);
        if *phase == CrawlPhase::Running {
            tracing::info!("Frontier capacity reached, draining queued work");
            *phase = CrawlPhase::Draining;
        }
    }

    fn frontier_state(&self) -> FrontierState {
        let frontier = lock(&self.frontier);
        if !frontier.is_empty() {
            FrontierState::Ready
        } else if frontier.in_flight() == 0 {
            FrontierState::Exhausted
        } else {
            FrontierState::Wait
        }
    }

    /// Fetches one entry and hands its outcome to the sink
    ///
    /// Returns `false` if the fetch was aborted by cancellation.
    async fn process(
        &self,
        worker: usize,
        entry: UrlEntry,
        records: &mpsc::Sender<CrawlRecord>,
        cancel: &CancellationToken,
    ) -> bool {
        let key = entry.key;
        tracing::debug!(worker, url = %key, priority = entry.priority, "Dequeued");

        if !self.governor.delay_before_next_fetch(cancel).await {
            self.complete(&key, FinalOutcome::Aborted, 0, None, records)
                .await;
            return false;
        }

        let report = self.executor.fetch(key.as_url(), cancel).await;

        let (outcome, body) = match report.outcome {
            FetchOutcome::Success(page) => {
                let links = self.extract_links(&page).unwrap_or_else(|e| {
                    tracing::warn!(url = %key, error = %e, "Link extraction failed");
                    Vec::new()
                });
                self.enqueue_links(&key, &page.url, &links);

                let outcome = FinalOutcome::Succeeded {
                    status: page.status,
                    content_type: page.content_type,
                };
                (outcome, Some(page.body))
            }
            FetchOutcome::FatalFailure(reason) => {
                let outcome = FinalOutcome::Failed {
                    reason: reason.to_string(),
                };
                (outcome, None)
            }
            FetchOutcome::Aborted => (FinalOutcome::Aborted, None),
        };

        let aborted = outcome == FinalOutcome::Aborted;
        self.complete(&key, outcome, report.attempts, body, records)
            .await;
        !aborted
    }

    /// Runs the extractor, turning a panic into an extraction error
    ///
    /// A panicking extractor would otherwise leave the key in flight forever.
    fn extract_links(&self, page: &FetchedPage) -> Result<Vec<DiscoveredLink>, ExtractError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(page))).unwrap_or_else(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ExtractError::Failed(format!("extractor panicked: {}", message)))
            },
        )
    }

    /// Marks the page visited and offers its links, in one critical section
    fn enqueue_links(&self, key: &UrlKey, base: &Url, links: &[DiscoveredLink]) {
        let mut accepted = 0;
        let mut rejected = RejectionCounts::default();

        let at_capacity = {
            let mut frontier = lock(&self.frontier);
            frontier.mark_visited(key);

            for link in links {
                let priority = self.priority.compute(&link.hint);
                match frontier.enqueue_relative(&link.candidate, base, priority) {
                    Ok(_) => accepted += 1,
                    Err(rejection) => {
                        tracing::trace!(
                            candidate = %link.candidate,
                            reason = %rejection,
                            "Link rejected"
                        );
                        rejected.record(&rejection);
                    }
                }
            }

            frontier.is_at_capacity()
        };

        {
            let mut stats = lock(&self.stats);
            stats.links_discovered += links.len() as u64;
            stats.rejections += rejected;
        }

        tracing::debug!(
            url = %key,
            discovered = links.len(),
            accepted,
            rejected = rejected.total(),
            "Links processed"
        );

        if at_capacity {
            self.enter_draining();
        }
    }

    /// Books a terminal outcome and forwards it to the sink task
    async fn complete(
        &self,
        key: &UrlKey,
        outcome: FinalOutcome,
        attempts: u32,
        body: Option<Vec<u8>>,
        records: &mpsc::Sender<CrawlRecord>,
    ) {
        let queued = {
            let mut frontier = lock(&self.frontier);
            frontier.mark_visited(key);
            frontier.len()
        };
        self.work_available.notify_waiters();

        let completed = {
            let mut stats = lock(&self.stats);
            stats.record_outcome(&outcome, attempts);
            stats.pages_completed()
        };
        if outcome != FinalOutcome::Aborted && completed % 10 == 0 {
            tracing::info!(completed, queued, "Progress");
        }

        let record = CrawlRecord {
            url: key.as_url().clone(),
            outcome,
            attempts,
            body,
            completed_at: Utc::now(),
        };
        if records.send(record).await.is_err() {
            tracing::error!(url = %key, "Sink task is gone, record dropped");
        }
    }
}

/// One worker: dequeue, fetch, extract, enqueue, repeat
async fn worker(
    id: usize,
    ctx: Arc<CrawlContext>,
    records: mpsc::Sender<CrawlRecord>,
    cancel: CancellationToken,
) -> WorkerExit {
    loop {
        if cancel.is_cancelled() {
            return WorkerExit::Cancelled;
        }

        // Registered before looking at the frontier so no wakeup is missed
        let notified = ctx.work_available.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match ctx.frontier_state() {
            FrontierState::Exhausted => {
                ctx.work_available.notify_waiters();
                tracing::debug!(worker = id, "Frontier exhausted, worker exiting");
                return WorkerExit::Exhausted;
            }
            FrontierState::Wait => {
                tokio::select! {
                    _ = cancel.cancelled() => return WorkerExit::Cancelled,
                    _ = &mut notified => continue,
                }
            }
            FrontierState::Ready => {}
        }

        if !ctx.governor.enforce_budget(&cancel).await {
            return WorkerExit::Cancelled;
        }

        let next = lock(&ctx.frontier).dequeue_next();
        let Some(entry) = next else {
            continue;
        };

        if !ctx.process(id, entry, &records, &cancel).await {
            return WorkerExit::Cancelled;
        }
    }
}

/// Forwards records to the sink in the order they arrive
async fn drain_records(sink: Arc<dyn Sink>, mut records: mpsc::Receiver<CrawlRecord>) {
    while let Some(record) = records.recv().await {
        let url = record.url.clone();
        if let Err(e) = sink.record(record).await {
            tracing::error!(url = %url, error = %e, "Sink failed to record result");
        }
    }
}

/// Main crawler coordinator structure
///
/// Owns one frontier and one politeness governor for the lifetime of a run.
/// A coordinator runs once; after `Done` it cannot be restarted.
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    sink: Arc<dyn Sink>,
    concurrency: usize,
}

impl Coordinator {
    /// Creates a coordinator with the default collaborators
    ///
    /// Fetches over HTTP, extracts links from HTML, and records to SQLite
    /// when `output.database-path` is set (to the log otherwise).
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    pub fn phase(&self) -> CrawlPhase {
        self.ctx.phase()
    }

    /// Number of entries waiting in the frontier
    pub fn queued(&self) -> usize {
        lock(&self.ctx.frontier).len()
    }

    /// Snapshot of the statistics collected so far
    pub fn statistics(&self) -> CrawlStatistics {
        lock(&self.ctx.stats).clone()
    }

    /// Runs the crawl until the frontier is exhausted or `cancel` fires
    ///
    /// Every terminal item reaches the sink before this returns, including
    /// items aborted by cancellation.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStatistics)` - The frontier was exhausted
    /// * `Err(CrawlError::Aborted)` - The run was cancelled
    /// * `Err(CrawlError::AlreadyStarted)` - `run` was called twice
    pub async fn run(&self, cancel: CancellationToken) -> Result<CrawlStatistics, CrawlError> {
        if !self.ctx.begin() {
            return Err(CrawlError::AlreadyStarted);
        }

        let (queued, at_capacity) = {
            let frontier = lock(&self.ctx.frontier);
            (frontier.len(), frontier.is_at_capacity())
        };
        if at_capacity {
            self.ctx.enter_draining();
        }
        lock(&self.ctx.stats).started_at = Utc::now();

        tracing::info!(workers = self.concurrency, queued, "Starting crawl");

        let (records_tx, records_rx) = mpsc::channel(RECORD_BUFFER);
        let sink_task = tokio::spawn(drain_records(self.sink.clone(), records_rx));

        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            workers.spawn(worker(
                id,
                self.ctx.clone(),
                records_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(records_tx);

        let mut cancelled = false;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(WorkerExit::Cancelled) => cancelled = true,
                Ok(WorkerExit::Exhausted) => {}
                Err(e) => tracing::error!(error = %e, "Worker task failed"),
            }
        }

        // Every sender is gone once the workers are; this flushes the channel
        if let Err(e) = sink_task.await {
            tracing::error!(error = %e, "Sink task failed");
        }

        if !cancelled {
            self.ctx.set_phase(CrawlPhase::Exhausted);
        }

        let stats = {
            let accepted = lock(&self.ctx.frontier).accepted() as u64;
            let mut stats = lock(&self.ctx.stats);
            stats.finished_at = Some(Utc::now());
            stats.urls_accepted = accepted;
            stats.budget_pauses = self.ctx.governor.pause_count();
            stats.cancelled = cancelled;
            stats.clone()
        };

        self.sink.finish(&stats).await?;
        self.ctx.set_phase(CrawlPhase::Done);

        if cancelled {
            tracing::warn!(
                completed = stats.pages_completed(),
                aborted = stats.pages_aborted,
                "Crawl cancelled"
            );
            return Err(CrawlError::Aborted {
                completed: stats.pages_completed(),
            });
        }

        tracing::info!(
            succeeded = stats.pages_succeeded,
            failed = stats.pages_failed,
            accepted = stats.urls_accepted,
            duration_secs = stats.duration_seconds().unwrap_or(0),
            "Crawl completed"
        );
        Ok(stats)
    }
}

/// Builds a coordinator, optionally replacing its collaborators
pub struct CoordinatorBuilder {
    config: Config,
    config_hash: String,
    transport: Option<Arc<dyn Transport>>,
    extractor: Option<Arc<dyn Extractor>>,
    sink: Option<Arc<dyn Sink>>,
    sampler: Option<Arc<dyn ResourceSampler>>,
}

impl CoordinatorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            config_hash: String::new(),
            transport: None,
            extractor: None,
            sink: None,
            sampler: None,
        }
    }

    /// Hash recorded alongside the run by the SQLite sink
    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Validates the configuration, seeds the frontier and wires everything
    ///
    /// A seed the frontier refuses as out of scope fails the whole run with
    /// `CrawlError::InvalidSeed`.
    pub fn build(self) -> Result<Coordinator, CrawlError> {
        let config = self.config;
        validate(&config)?;

        let scope = resolve_host_scope(&config.crawl)?;
        let mut frontier = Frontier::new(scope, config.crawl.max_frontier_size);
        let seed_priority = config.crawl.seed_priority.min(MAX_PRIORITY);

        for seed in &config.crawl.seeds {
            match frontier.enqueue(seed, seed_priority) {
                Ok(key) => tracing::debug!(url = %key, priority = seed_priority, "Seeded"),
                Err(Rejection::DuplicateKey) => {
                    tracing::debug!(url = %seed, "Duplicate seed ignored")
                }
                Err(Rejection::CapacityReached) => {
                    tracing::warn!(url = %seed, "Frontier full, seed skipped")
                }
                Err(Rejection::OutOfScope(violation)) => {
                    return Err(CrawlError::InvalidSeed {
                        url: seed.clone(),
                        reason: violation.to_string(),
                    });
                }
            }
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let sink: Arc<dyn Sink> = match self.sink {
            Some(sink) => sink,
            None => match &config.output.database_path {
                Some(path) => Arc::new(SqliteSink::open(Path::new(path), &self.config_hash)?),
                None => Arc::new(LogSink),
            },
        };
        let sampler: Arc<dyn ResourceSampler> = match self.sampler {
            Some(sampler) => sampler,
            None => Arc::new(ProcessMemorySampler),
        };
        let extractor: Arc<dyn Extractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(HtmlLinkExtractor),
        };

        let ctx = CrawlContext {
            frontier: Mutex::new(frontier),
            executor: FetchExecutor::from_config(&config, transport),
            governor: PolitenessGovernor::new(&config.politeness, &config.resources, sampler),
            extractor,
            priority: PriorityPolicy::from_config(&config.crawl),
            phase: Mutex::new(CrawlPhase::Idle),
            stats: Mutex::new(CrawlStatistics::new(Utc::now())),
            work_available: Notify::new(),
        };

        Ok(Coordinator {
            ctx: Arc::new(ctx),
            sink,
            concurrency: config.crawl.concurrency.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BackoffKind, ContentExpectation, CrawlConfig, FetchConfig, IdentityConfig, OutputConfig,
        PolitenessConfig, ResourceConfig,
    };
    use crate::crawler::fetcher::{
        TransportError, TransportErrorKind, TransportRequest, TransportResponse,
    };
    use crate::crawler::priority::LinkContext;
    use crate::output::MemorySink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned responses keyed by URL; unknown URLs refuse to connect
    #[derive(Default)]
    struct FakeWeb {
        pages: HashMap<String, (u16, &'static str)>,
        hits: Mutex<Vec<String>>,
    }

    impl FakeWeb {
        fn page(mut self, url: &str, status: u16, content_type: &'static str) -> Self {
            self.pages.insert(url.to_string(), (status, content_type));
            self
        }

        fn hits(&self) -> Vec<String> {
            lock(&self.hits).clone()
        }
    }

    #[async_trait]
    impl Transport for FakeWeb {
        async fn get(
            &self,
            request: TransportRequest<'_>,
        ) -> Result<TransportResponse, TransportError> {
            lock(&self.hits).push(request.url.to_string());
            match self.pages.get(request.url.as_str()) {
                Some((status, content_type)) => Ok(TransportResponse {
                    status: *status,
                    final_url: request.url.clone(),
                    content_type: Some(content_type.to_string()),
                    body: Vec::new(),
                }),
                None => Err(TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    /// Returns a fixed set of (href, priority-relevant context) per page URL
    #[derive(Default)]
    struct FakeExtractor {
        links: HashMap<String, Vec<DiscoveredLink>>,
    }

    impl FakeExtractor {
        fn links(mut self, page: &str, links: &[(&str, LinkContext)]) -> Self {
            self.links.insert(
                page.to_string(),
                links
                    .iter()
                    .map(|(href, hint)| DiscoveredLink {
                        candidate: href.to_string(),
                        hint: hint.clone(),
                    })
                    .collect(),
            );
            self
        }
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, page: &FetchedPage) -> Result<Vec<DiscoveredLink>, ExtractError> {
            Ok(self.links.get(page.url.as_str()).cloned().unwrap_or_default())
        }
    }

    struct NoMemory;

    /// Panics on one page, extracts nothing elsewhere
    struct PanickingExtractor {
        on: &'static str,
    }

    impl Extractor for PanickingExtractor {
        fn extract(&self, page: &FetchedPage) -> Result<Vec<DiscoveredLink>, ExtractError> {
            if page.url.as_str() == self.on {
                panic!("malformed markup");
            }
            Ok(Vec::new())
        }
    }

    /// Replays memory readings and notes how many fetches preceded each one
    struct ScriptedMemory {
        readings: Mutex<Vec<u64>>,
        web: Arc<FakeWeb>,
        fetches_seen: Mutex<Vec<usize>>,
    }

    impl ScriptedMemory {
        fn new(readings: &[u64], web: Arc<FakeWeb>) -> Self {
            let mut readings = readings.to_vec();
            readings.reverse();
            Self {
                readings: Mutex::new(readings),
                web,
                fetches_seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ResourceSampler for ScriptedMemory {
        fn sample(&self) -> u64 {
            lock(&self.fetches_seen).push(self.web.hits().len());
            lock(&self.readings).pop().unwrap_or(0)
        }
    }

    impl ResourceSampler for NoMemory {
        fn sample(&self) -> u64 {
            0
        }
    }

    fn config(capacity: usize, concurrency: usize) -> Config {
        Config {
            crawl: CrawlConfig {
                seeds: vec!["https://example.com/".to_string()],
                host_scope: Some("example.com".to_string()),
                max_frontier_size: capacity,
                concurrency,
                seed_priority: 10,
                keywords: vec!["gallery".to_string()],
                shallow_depth: 3,
            },
            fetch: FetchConfig {
                max_retries: 3,
                backoff: BackoffKind::Linear,
                base_delay_ms: 1,
                jitter_ms: 0,
                timeout_ms: 1000,
                expect: ContentExpectation::Html,
            },
            identity: IdentityConfig::default(),
            politeness: PolitenessConfig {
                min_delay_ms: 0,
                jitter_ms: 0,
            },
            resources: ResourceConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Context that scores 5 (deep, no keyword, no image)
    fn plain() -> LinkContext {
        LinkContext {
            anchor_text: "more".to_string(),
            depth: 10,
            near_image: false,
        }
    }

    /// Context that scores 8 (keyword match)
    fn topical() -> LinkContext {
        LinkContext {
            anchor_text: "Gallery".to_string(),
            depth: 10,
            near_image: false,
        }
    }

    fn coordinator(
        config: Config,
        web: Arc<FakeWeb>,
        extractor: FakeExtractor,
        sink: Arc<MemorySink>,
    ) -> Coordinator {
        Coordinator::builder(config)
            .transport(web)
            .extractor(Arc::new(extractor))
            .sink(sink)
            .sampler(Arc::new(NoMemory))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_dequeue_order_follows_priority_then_discovery() {
        let web = Arc::new(
            FakeWeb::default()
                .page("https://example.com/", 200, "text/html")
                .page("https://example.com/a", 200, "text/html")
                .page("https://example.com/b", 200, "text/html")
                .page("https://example.com/c", 200, "text/html"),
        );
        let extractor = FakeExtractor::default().links(
            "https://example.com/",
            &[("/a", plain()), ("/b", topical()), ("/c", plain())],
        );
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(50, 1), web.clone(), extractor, sink.clone());

        let stats = crawler.run(CancellationToken::new()).await.unwrap();

        assert_eq!(
            web.hits(),
            [
                "https://example.com/",
                "https://example.com/b",
                "https://example.com/a",
                "https://example.com/c",
            ]
        );
        assert_eq!(stats.pages_succeeded, 4);
        assert_eq!(crawler.phase(), CrawlPhase::Done);
        assert!(sink.finished().is_some());
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_crawl_continues() {
        let web = Arc::new(
            FakeWeb::default()
                .page("https://example.com/", 200, "text/html")
                .page("https://example.com/ok", 200, "text/html"),
        );
        let extractor = FakeExtractor::default().links(
            "https://example.com/",
            &[
                ("/down", topical()),
                ("/ok", plain()),
                ("https://other.com/x", plain()),
                ("/ok#section", plain()),
            ],
        );
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(50, 1), web.clone(), extractor, sink.clone());

        let stats = crawler.run(CancellationToken::new()).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 3);
        let down = records
            .iter()
            .find(|r| r.url.path() == "/down")
            .unwrap();
        assert_eq!(down.attempts, 3);
        assert!(matches!(down.outcome, FinalOutcome::Failed { .. }));

        assert_eq!(stats.pages_succeeded, 2);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.rejections.foreign_host, 1);
        assert_eq!(stats.rejections.duplicate, 1);
        assert_eq!(web.hits().iter().filter(|h| h.ends_with("/down")).count(), 3);
    }

    #[tokio::test]
    async fn test_capacity_drains_without_new_discovery() {
        let web = Arc::new(
            FakeWeb::default()
                .page("https://example.com/", 200, "text/html")
                .page("https://example.com/a", 200, "text/html")
                .page("https://example.com/b", 200, "text/html"),
        );
        let extractor = FakeExtractor::default()
            .links(
                "https://example.com/",
                &[("/a", plain()), ("/b", plain()), ("/c", plain())],
            )
            .links("https://example.com/a", &[("/d", plain())]);
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(3, 1), web.clone(), extractor, sink.clone());

        let stats = crawler.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.urls_accepted, 3);
        assert_eq!(stats.rejections.capacity, 2);
        assert_eq!(sink.records().len(), 3);
        assert!(!web.hits().iter().any(|h| h.ends_with("/c") || h.ends_with("/d")));
    }

    #[tokio::test]
    async fn test_concurrent_workers_fetch_each_url_once() {
        let mut web = FakeWeb::default().page("https://example.com/", 200, "text/html");
        let mut links = Vec::new();
        let hrefs: Vec<String> = (0..20).map(|i| format!("/p{}", i)).collect();
        for href in &hrefs {
            web = web.page(
                &format!("https://example.com{}", href),
                200,
                "text/html",
            );
        }
        for href in &hrefs {
            links.push((href.as_str(), plain()));
            links.push((href.as_str(), topical()));
        }
        let extractor = FakeExtractor::default().links("https://example.com/", &links);
        let web = Arc::new(web);
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(50, 8), web.clone(), extractor, sink.clone());

        let stats = crawler.run(CancellationToken::new()).await.unwrap();

        let mut hits = web.hits();
        let total = hits.len();
        hits.sort();
        hits.dedup();
        assert_eq!(hits.len(), total);
        assert_eq!(total, 21);
        assert_eq!(stats.pages_succeeded, 21);
        assert_eq!(stats.rejections.duplicate, 20);
    }

    #[tokio::test]
    async fn test_cancelled_run_flushes_and_reports_abort() {
        let web = Arc::new(FakeWeb::default().page("https://example.com/", 200, "text/html"));
        let mut config = config(50, 1);
        config.politeness.min_delay_ms = 60_000;
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config, web.clone(), FakeExtractor::default(), sink.clone());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = crawler.run(cancel).await;

        assert!(matches!(result, Err(CrawlError::Aborted { completed: 0 })));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, FinalOutcome::Aborted);
        assert!(web.hits().is_empty());
        assert!(sink.finished().unwrap().cancelled);
        assert_eq!(crawler.phase(), CrawlPhase::Done);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let web = Arc::new(FakeWeb::default().page("https://example.com/", 200, "text/html"));
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(50, 1), web, FakeExtractor::default(), sink);

        crawler.run(CancellationToken::new()).await.unwrap();
        assert!(matches!(
            crawler.run(CancellationToken::new()).await,
            Err(CrawlError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_binary_seed_is_invalid() {
        let mut config = config(50, 1);
        config.crawl.seeds = vec!["https://example.com/logo.png".to_string()];
        let result = Coordinator::builder(config)
            .transport(Arc::new(FakeWeb::default()))
            .sink(Arc::new(MemorySink::new()))
            .build();
        assert!(matches!(result, Err(CrawlError::InvalidSeed { .. })));
    }

    #[test]
    fn test_seeds_fill_frontier_before_run() {
        let mut config = config(50, 1);
        config.crawl.seeds = vec![
            "https://example.com/".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/#top".to_string(),
        ];
        let crawler = Coordinator::builder(config)
            .transport(Arc::new(FakeWeb::default()))
            .sink(Arc::new(MemorySink::new()))
            .build()
            .unwrap();
        assert_eq!(crawler.queued(), 2);
        assert_eq!(crawler.phase(), CrawlPhase::Idle);
    }

    #[tokio::test]
    async fn test_panicking_extractor_does_not_stall_workers() {
        let web = Arc::new(
            FakeWeb::default()
                .page("https://example.com/", 200, "text/html")
                .page("https://example.com/slow", 200, "text/html"),
        );
        let mut config = config(50, 2);
        config.crawl.seeds.push("https://example.com/slow".to_string());
        let sink = Arc::new(MemorySink::new());
        let crawler = Coordinator::builder(config)
            .transport(web.clone())
            .extractor(Arc::new(PanickingExtractor {
                on: "https://example.com/slow",
            }))
            .sink(sink.clone())
            .sampler(Arc::new(NoMemory))
            .build()
            .unwrap();

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            crawler.run(CancellationToken::new()),
        )
        .await
        .expect("crawl should finish")
        .unwrap();

        assert_eq!(stats.pages_succeeded, 2);
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.url.path() == "/slow"));
        assert_eq!(crawler.phase(), CrawlPhase::Done);
    }

    #[tokio::test]
    async fn test_over_budget_pauses_dequeues_then_resumes() {
        let web = Arc::new(
            FakeWeb::default()
                .page("https://example.com/", 200, "text/html")
                .page("https://example.com/a", 200, "text/html")
                .page("https://example.com/b", 200, "text/html"),
        );
        let extractor = FakeExtractor::default().links(
            "https://example.com/",
            &[("/a", plain()), ("/b", plain())],
        );
        let mut config = config(50, 1);
        config.resources = ResourceConfig {
            budget_bytes: 1000,
            threshold: 0.9,
            check_every: 1,
            grace_period_ms: 1,
            max_pause_cycles: 5,
        };
        let memory = Arc::new(ScriptedMemory::new(&[950, 990, 100], web.clone()));
        let sink = Arc::new(MemorySink::new());
        let crawler = Coordinator::builder(config)
            .transport(web.clone())
            .extractor(Arc::new(extractor))
            .sink(sink.clone())
            .sampler(memory.clone())
            .build()
            .unwrap();

        let stats = crawler.run(CancellationToken::new()).await.unwrap();

        // Nothing was fetched until usage dropped back under the threshold
        let seen = lock(&memory.fetches_seen).clone();
        assert_eq!(&seen[..3], &[0, 0, 0]);
        assert_eq!(stats.budget_pauses, 1);
        assert_eq!(stats.pages_succeeded, 3);
        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.finished().unwrap().budget_pauses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_start_only_once() {
        let web = Arc::new(FakeWeb::default().page("https://example.com/", 200, "text/html"));
        let sink = Arc::new(MemorySink::new());
        let crawler = coordinator(config(50, 1), web.clone(), FakeExtractor::default(), sink);

        let (first, second) = tokio::join!(
            crawler.run(CancellationToken::new()),
            crawler.run(CancellationToken::new())
        );

        let started = [&first, &second]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(started, 1);
        let rejected = [&first, &second]
            .iter()
            .filter(|result| matches!(result, Err(CrawlError::AlreadyStarted)))
            .count();
        assert_eq!(rejected, 1);
        assert_eq!(web.hits().len(), 1);
    }
}
