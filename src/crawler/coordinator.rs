//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns everything shared by a run (frontier, throttle, retry
//! policy, user agents, document store, HTTP client) and drives a bounded pool
//! of worker tasks:
//! - Pull tasks from the frontier while there is room in the pool
//! - Each worker fetches through the retry controller, gated by the throttle
//! - Pages have their links offered back to the frontier
//! - Documents are handed to the store
//! - In-site redirect targets go back to the frontier like any other URL
//! - The run ends when the frontier is empty and no worker is left, or after
//!   a stop request once in-flight work has resolved

use crate::config::{ensure_store_root, validate, Config};
use crate::crawler::classifier::{classify, Classification};
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchedResponse};
use crate::crawler::frontier::{CrawlTask, Frontier, OfferRejection};
use crate::crawler::parser::extract_links;
use crate::crawler::retry::{RetryOutcome, RetryPolicy};
use crate::crawler::shutdown::{self, ShutdownHandle, ShutdownSignal};
use crate::crawler::throttle::{Throttle, ThrottlePermit};
use crate::crawler::user_agent::{self, UserAgentStrategy};
use crate::output::{CrawlStatistics, FailureKind, LinkTally, TaskOutcome, TaskReport};
use crate::state::{TaskState, TaskTracker};
use crate::storage::{ArchiveError, ArchivedFile, DocumentStore, FsArchiver};
use crate::url::{normalize_url, SiteScope};
use crate::{HarvestError, UrlError};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Progress is logged every this many resolved tasks
const PROGRESS_INTERVAL: u64 = 10;

/// Everything a worker needs, cheap to clone into each spawned task
#[derive(Clone)]
struct Worker {
    config: Arc<Config>,
    frontier: Arc<Frontier>,
    throttle: Arc<Throttle>,
    retry: Arc<RetryPolicy>,
    user_agents: Arc<dyn UserAgentStrategy>,
    store: Arc<dyn DocumentStore>,
    client: Client,
    shutdown: ShutdownSignal,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    seed: Url,
    worker: Worker,
    shutdown: Arc<ShutdownHandle>,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration, creates the store root, builds the HTTP
    /// client and seeds the frontier with the start URL.
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Invalid configuration or unusable store root
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        validate(&config)?;

        let seed = normalize_url(&config.crawler.start_url)?;
        let scope = SiteScope::from_seed(&seed).ok_or(UrlError::MissingDomain)?;

        let store_root = Path::new(&config.output.store_root);
        ensure_store_root(store_root)?;

        let client = build_http_client(&config)?;

        let frontier = Frontier::new(scope, config.crawler.max_depth);
        frontier.seed(&seed);

        let (handle, signal) = shutdown::channel();

        let worker = Worker {
            frontier: Arc::new(frontier),
            throttle: Arc::new(Throttle::from_config(&config)),
            retry: Arc::new(RetryPolicy::from_config(&config.retry)),
            user_agents: user_agent::from_config(&config.user_agent),
            store: Arc::new(FsArchiver::new(
                store_root,
                config.output.write_provenance,
            )),
            client,
            shutdown: signal,
            config: Arc::new(config),
        };

        Ok(Self {
            seed,
            worker,
            shutdown: Arc::new(handle),
            config_hash: None,
        })
    }

    /// Replaces the user agent strategy
    pub fn with_user_agents(mut self, user_agents: Arc<dyn UserAgentStrategy>) -> Self {
        self.worker.user_agents = user_agents;
        self
    }

    /// Replaces the document store
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.worker.store = store;
        self
    }

    /// Records the configuration hash in the run's statistics
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = Some(config_hash.into());
        self
    }

    /// Handle that stops the run when triggered
    pub fn shutdown_handle(&self) -> Arc<ShutdownHandle> {
        Arc::clone(&self.shutdown)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.worker.frontier
    }

    pub fn throttle(&self) -> &Throttle {
        &self.worker.throttle
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the crawl to completion or until stopped
    ///
    /// Only configuration problems are fatal, and those were caught in
    /// [`Coordinator::new`]; every per-task problem is logged and counted.
    pub async fn run(&self) -> Result<CrawlStatistics, HarvestError> {
        let config = &self.worker.config;
        let pool_size = config.crawler.max_concurrent_requests.max(1) as usize;
        let start_time = Instant::now();

        tracing::info!(
            "Harvesting {} into {} ({} workers)",
            self.seed,
            config.output.store_root,
            pool_size
        );

        let mut stats = CrawlStatistics {
            config_hash: self.config_hash.clone(),
            ..CrawlStatistics::default()
        };
        let mut workers: JoinSet<TaskReport> = JoinSet::new();
        let mut signal = self.shutdown.signal();
        let mut stopping = false;

        loop {
            if !stopping {
                while workers.len() < pool_size {
                    let Some(task) = self.worker.frontier.next() else {
                        break;
                    };
                    tracing::trace!("Spawning worker for {} (depth {})", task.url, task.depth);
                    workers.spawn(self.worker.clone().process(task));
                }
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                _ = signal.cancelled(), if !stopping => {
                    tracing::info!(
                        "Stop requested, waiting for {} in-flight task(s)",
                        workers.len()
                    );
                    stopping = true;
                }
                joined = workers.join_next() => {
                    let report = match joined {
                        Some(Ok(report)) => report,
                        Some(Err(e)) => {
                            tracing::error!("Worker task failed: {}", e);
                            TaskReport {
                                outcome: TaskOutcome::Failed(FailureKind::Internal),
                                attempts: 0,
                                links: LinkTally::default(),
                            }
                        }
                        None => continue,
                    };
                    stats.record(&report);

                    let resolved = stats.tasks_resolved();
                    if resolved % PROGRESS_INTERVAL == 0 {
                        let elapsed = start_time.elapsed();
                        tracing::info!(
                            "Progress: {} tasks resolved, {} archived, {} queued, delay {:.2}s, {:.2} tasks/sec",
                            resolved,
                            stats.documents_archived,
                            self.worker.frontier.pending(),
                            self.worker.throttle.current_delay().as_secs_f64(),
                            resolved as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                        );
                    }
                }
            }
        }

        stats.not_dispatched = self.worker.frontier.pending() as u64;
        stats.final_delay = self.worker.throttle.current_delay();
        stats.elapsed = start_time.elapsed();

        if stopping {
            tracing::info!(
                "Crawl stopped: {} pages, {} documents, {} left in frontier",
                stats.pages_visited,
                stats.documents_archived,
                stats.not_dispatched
            );
        } else {
            tracing::info!(
                "Crawl completed: {} pages, {} documents in {:?}",
                stats.pages_visited,
                stats.documents_archived,
                stats.elapsed
            );
        }

        Ok(stats)
    }
}

impl Worker {
    /// Fetches one task and routes the response
    async fn process(self, task: CrawlTask) -> TaskReport {
        let mut tracker = TaskTracker::new(task.url.as_str());
        let mut links = LinkTally::default();
        let mut backoff_signal = self.shutdown.clone();

        let fetched = {
            let worker = &self;
            let url = &task.url;

            self.retry
                .execute(
                    &mut tracker,
                    &mut backoff_signal,
                    move || {
                        let mut cancel = worker.shutdown.clone();
                        async move {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                permit = worker.throttle.before_request() => permit,
                            }
                        }
                    },
                    move |attempt, permit: ThrottlePermit| {
                        let user_agent = worker.user_agents.next();
                        async move {
                            tracing::debug!("Fetching {} (attempt {})", url, attempt);
                            let outcome = fetch_url(&worker.client, url, &user_agent).await;
                            worker.throttle.observe(&outcome);
                            drop(permit);
                            outcome
                        }
                    },
                )
                .await
        };

        let (outcome, attempts) = match fetched {
            Ok(RetryOutcome::Succeeded { response, attempts }) => {
                let outcome = self
                    .handle_response(&task, response, &mut tracker, &mut links)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!("Failed to handle {}: {}", task.url, e);
                        TaskOutcome::Failed(FailureKind::Internal)
                    });
                (outcome, attempts)
            }
            Ok(RetryOutcome::PermanentlyFailed {
                attempts,
                last_error,
                exhausted,
            }) => {
                let kind = if exhausted {
                    FailureKind::RetriesExhausted
                } else if last_error.status_code().is_some() {
                    FailureKind::HttpStatus
                } else {
                    FailureKind::Transport
                };
                tracing::warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    task.url,
                    attempts,
                    last_error
                );
                (TaskOutcome::Failed(kind), attempts)
            }
            Ok(RetryOutcome::Cancelled { attempts }) => {
                tracing::debug!("Cancelled {}", task.url);
                (TaskOutcome::Cancelled, attempts)
            }
            Err(e) => {
                tracing::error!("Task {} aborted: {}", task.url, e);
                (TaskOutcome::Failed(FailureKind::Internal), 0)
            }
        };

        TaskReport {
            outcome,
            attempts,
            links,
        }
    }

    /// Routes a response: redirects back to the frontier, everything else by
    /// the classification of the task URL
    async fn handle_response(
        &self,
        task: &CrawlTask,
        response: FetchedResponse,
        tracker: &mut TaskTracker,
        links: &mut LinkTally,
    ) -> Result<TaskOutcome, HarvestError> {
        if let Some(target) = &response.redirect_to {
            return self.hand_off_redirect(task, response.status_code, target, tracker);
        }

        match classify(task.url.path(), &self.config.output.extensions) {
            Classification::Document => {
                let bytes = response.body.len() as u64;
                match self.archive(task, response.body).await? {
                    Ok(record) => {
                        tracker.transition(TaskState::Succeeded)?;
                        tracing::info!("Archived {} -> {}", task.url, record.local_path);
                        Ok(TaskOutcome::DocumentArchived { bytes })
                    }
                    Err(e) => {
                        tracker.transition(TaskState::PermanentlyFailed)?;
                        tracing::warn!("Failed to archive {}: {}", task.url, e);
                        Ok(TaskOutcome::Failed(FailureKind::ArchiveWrite))
                    }
                }
            }

            Classification::Page => {
                tracker.transition(TaskState::Succeeded)?;

                if !response.looks_like_html() {
                    tracing::debug!(
                        "Skipping link extraction for {} ({})",
                        task.url,
                        response.content_type.as_deref().unwrap_or("unknown type")
                    );
                    return Ok(TaskOutcome::PageVisited);
                }

                let html = String::from_utf8_lossy(&response.body);
                for link in extract_links(&html, &response.final_url) {
                    links.record(self.frontier.try_offer(&link, task.url.as_str()));
                }

                tracing::debug!(
                    "Visited {}: {} links, {} new",
                    task.url,
                    links.total(),
                    links.accepted
                );
                Ok(TaskOutcome::PageVisited)
            }
        }
    }

    /// Queues an in-site redirect target through the visited set
    ///
    /// A target that leaves the site ends the task as an HTTP failure; one that
    /// was already accepted is not fetched again.
    fn hand_off_redirect(
        &self,
        task: &CrawlTask,
        status_code: u16,
        target: &Url,
        tracker: &mut TaskTracker,
    ) -> Result<TaskOutcome, HarvestError> {
        match self.frontier.redirect(target, task) {
            Ok(()) => {
                tracker.transition(TaskState::Succeeded)?;
                tracing::debug!("{} redirected ({}) to {}", task.url, status_code, target);
                Ok(TaskOutcome::Redirected { queued: true })
            }
            Err(OfferRejection::AlreadyVisited) => {
                tracker.transition(TaskState::Succeeded)?;
                tracing::debug!(
                    "{} redirected ({}) to already visited {}",
                    task.url,
                    status_code,
                    target
                );
                Ok(TaskOutcome::Redirected { queued: false })
            }
            Err(rejection) => {
                tracker.transition(TaskState::PermanentlyFailed)?;
                tracing::warn!(
                    "Not following redirect ({}) from {} to {}: {:?}",
                    status_code,
                    task.url,
                    target,
                    rejection
                );
                Ok(TaskOutcome::Failed(FailureKind::HttpStatus))
            }
        }
    }

    /// Writes a document on a blocking thread
    async fn archive(
        &self,
        task: &CrawlTask,
        body: Vec<u8>,
    ) -> Result<Result<ArchivedFile, ArchiveError>, HarvestError> {
        let store = Arc::clone(&self.store);
        let url = task.url.clone();
        let source_page = task.discovered_from.clone();

        let written = tokio::task::spawn_blocking(move || {
            store.archive(&url, source_page.as_deref(), &body)
        })
        .await?;

        Ok(written)
    }
}

/// Runs the main crawl operation
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - The run finished; per-task failures are counted
/// * `Err(HarvestError)` - The run could not start
///
/// # Example
///
/// ```no_run
/// use site_harvester::config::load_config;
/// use site_harvester::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let stats = run_crawl(config).await?;
/// println!("{} documents archived", stats.documents_archived);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlStatistics, HarvestError> {
    Coordinator::new(config)?.run().await
}
