/// Task state definitions for tracking a crawl task through its fetch lifecycle
use std::fmt;

/// Represents the current state of a crawl task
///
/// ```text
/// Queued -> Dispatched -> Succeeded
///               |  ^
///               v  |
///           RetryPending
///               |
///               v
///        PermanentlyFailed
/// ```
///
/// `Dispatched -> PermanentlyFailed` is also allowed directly for
/// non-retryable failures, and any non-terminal state may move to `Cancelled`
/// when the run is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Accepted by the frontier, waiting to be dispatched
    Queued,

    /// Admitted by the throttle, request in flight
    Dispatched,

    /// Last attempt failed transiently, waiting out the backoff
    RetryPending,

    // ===== Terminal States =====
    /// Fetched with a 2xx response and routed to link extraction or the
    /// archiver, or handed an in-site redirect target back to the frontier
    Succeeded,

    /// Non-retryable failure, exhausted retries, or an archive write error
    PermanentlyFailed,

    /// Abandoned because the run was asked to stop
    Cancelled,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PermanentlyFailed | Self::Cancelled
        )
    }

    /// Returns true if this is an active state (task may still be fetched)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the task is in flight or waiting to be re-dispatched
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Dispatched | Self::RetryPending)
    }

    /// Returns true if moving from this state to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        match (*self, next) {
            (Queued, Dispatched) => true,
            (Dispatched, Succeeded | RetryPending | PermanentlyFailed) => true,
            (RetryPending, Dispatched) => true,
            (from, Cancelled) => from.is_active(),
            _ => false,
        }
    }

    /// Stable lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::RetryPending => "retry_pending",
            Self::Succeeded => "succeeded",
            Self::PermanentlyFailed => "permanently_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
