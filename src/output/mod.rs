//! Output module for run summaries
//!
//! Workers hand a [`TaskReport`] back for every task they resolve; the
//! coordinator folds them into [`CrawlStatistics`], which the binary prints
//! when the run ends.

pub mod stats;

pub use stats::{
    print_statistics, CrawlStatistics, FailureKind, LinkTally, TaskOutcome, TaskReport,
};
