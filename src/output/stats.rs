//! Crawl statistics gathered while a run progresses
//!
//! Counts are accumulated from per-task reports, so the summary reflects what
//! actually happened even when the run was stopped early.

use crate::crawler::OfferRejection;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Why a task ended as permanently failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    /// Non-retryable HTTP status (404, 401, redirect off the site, ...)
    HttpStatus,

    /// Retryable failure on every allowed attempt
    RetriesExhausted,

    /// Transport error that is not worth retrying
    Transport,

    /// The document was fetched but could not be written
    ArchiveWrite,

    /// Bookkeeping failure inside the crawler
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpStatus => "http_status",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Transport => "transport",
            Self::ArchiveWrite => "archive_write",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a single task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    PageVisited,
    DocumentArchived { bytes: u64 },
    /// Answered with an in-site redirect; `queued` is false when the target
    /// had already been accepted
    Redirected { queued: bool },
    Failed(FailureKind),
    Cancelled,
}

/// Fate of the links offered from one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkTally {
    pub accepted: u64,
    pub out_of_scope: u64,
    pub duplicate: u64,
    pub too_deep: u64,
    pub invalid: u64,
}

impl LinkTally {
    /// Counts the result of one frontier offer
    pub fn record(&mut self, result: Result<(), OfferRejection>) {
        match result {
            Ok(()) => self.accepted += 1,
            Err(OfferRejection::OutOfScope) => self.out_of_scope += 1,
            Err(OfferRejection::AlreadyVisited) => self.duplicate += 1,
            Err(OfferRejection::TooDeep) => self.too_deep += 1,
            Err(OfferRejection::Invalid) => self.invalid += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.out_of_scope + self.duplicate + self.too_deep + self.invalid
    }
}

/// Everything a worker reports back about one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    pub outcome: TaskOutcome,

    /// Fetch attempts made, retries included
    pub attempts: u32,

    pub links: LinkTally,
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Pages fetched and scanned for links
    pub pages_visited: u64,

    /// Documents written to the store
    pub documents_archived: u64,

    pub bytes_archived: u64,

    /// Permanently failed tasks by cause
    pub failures: HashMap<FailureKind, u64>,

    /// Attempts beyond the first, over all tasks
    pub retries: u64,

    /// Tasks answered with an in-site redirect
    pub redirects: u64,

    /// Redirect targets that had already been accepted and were not queued again
    pub redirects_deduplicated: u64,

    /// Links accepted into the frontier (seed excluded)
    pub links_accepted: u64,

    /// Links dropped because they pointed off the site
    pub links_out_of_scope: u64,

    /// Links dropped because they were already visited
    pub links_duplicate: u64,

    pub links_too_deep: u64,

    pub links_invalid: u64,

    /// Tasks abandoned by a stop request after being dispatched
    pub cancelled: u64,

    /// Tasks still queued when the run stopped
    pub not_dispatched: u64,

    /// Throttle delay when the run ended
    pub final_delay: Duration,

    pub elapsed: Duration,

    /// Hash of the configuration file the run was started with
    pub config_hash: Option<String>,
}

impl CrawlStatistics {
    /// Folds one task report into the totals
    pub fn record(&mut self, report: &TaskReport) {
        match report.outcome {
            TaskOutcome::PageVisited => self.pages_visited += 1,
            TaskOutcome::DocumentArchived { bytes } => {
                self.documents_archived += 1;
                self.bytes_archived += bytes;
            }
            TaskOutcome::Redirected { queued } => {
                self.redirects += 1;
                if !queued {
                    self.redirects_deduplicated += 1;
                }
            }
            TaskOutcome::Failed(kind) => *self.failures.entry(kind).or_insert(0) += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
        }

        self.retries += u64::from(report.attempts.saturating_sub(1));

        self.links_accepted += report.links.accepted;
        self.links_out_of_scope += report.links.out_of_scope;
        self.links_duplicate += report.links.duplicate;
        self.links_too_deep += report.links.too_deep;
        self.links_invalid += report.links.invalid;
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// Tasks that reached a terminal state
    pub fn tasks_resolved(&self) -> u64 {
        self.pages_visited
            + self.documents_archived
            + self.redirects
            + self.total_failures()
            + self.cancelled
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    if let Some(hash) = &stats.config_hash {
        println!("Config hash: {}", hash);
    }
    println!("Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Overview:");
    println!("  Pages visited: {}", stats.pages_visited);
    println!(
        "  Documents archived: {} ({} bytes)",
        stats.documents_archived, stats.bytes_archived
    );
    println!("  Retries: {}", stats.retries);
    if stats.redirects > 0 {
        println!(
            "  Redirects: {} ({} to already visited URLs)",
            stats.redirects, stats.redirects_deduplicated
        );
    }
    println!("  Final delay: {:.2}s", stats.final_delay.as_secs_f64());
    println!();

    println!("Links:");
    println!("  Followed: {}", stats.links_accepted);
    println!("  Duplicate: {}", stats.links_duplicate);
    println!("  Out of scope: {}", stats.links_out_of_scope);
    if stats.links_too_deep > 0 {
        println!("  Too deep: {}", stats.links_too_deep);
    }
    if stats.links_invalid > 0 {
        println!("  Invalid: {}", stats.links_invalid);
    }
    println!();

    if !stats.failures.is_empty() {
        println!("Failures ({}):", stats.total_failures());
        let mut failure_counts: Vec<_> = stats.failures.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if stats.cancelled > 0 || stats.not_dispatched > 0 {
        println!(
            "Stopped early: {} cancelled, {} never dispatched",
            stats.cancelled, stats.not_dispatched
        );
    }
}
