//! Retry controller
//!
//! Wraps the attempts of one task. Each failed attempt is checked against the
//! retryable status codes (plus timeouts and connection errors); retryable
//! failures are re-attempted after a capped exponential backoff until
//! `max_attempts` attempts have been made.
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx | Succeeded |
//! | Status in `retryable_codes`, attempts left | Backoff, retry |
//! | Timeout / connection error, attempts left | Backoff, retry |
//! | Any retryable failure, attempts exhausted | PermanentlyFailed |
//! | Any other status or transport error | PermanentlyFailed immediately |

use crate::config::RetryConfig;
use crate::crawler::backoff::ExponentialBackoff;
use crate::crawler::fetcher::{FetchFailure, FetchOutcome, FetchedResponse};
use crate::crawler::shutdown::ShutdownSignal;
use crate::state::{TaskState, TaskTracker};
use crate::HarvestError;
use std::collections::HashSet;
use std::future::Future;

/// How a single attempt is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    RetryableFailure,
    PermanentFailure,
}

/// Attempt bookkeeping for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,

    /// Upper bound on attempts, first one included
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Starts the next attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt = (self.attempt + 1).min(self.max_attempts);
        self.attempt
    }

    /// Returns true if another attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Final result of a task's attempts
#[derive(Debug)]
pub enum RetryOutcome {
    /// A 2xx response was received
    Succeeded {
        response: FetchedResponse,
        attempts: u32,
    },

    /// Gave up; `exhausted` tells retries-exhausted apart from non-retryable
    PermanentlyFailed {
        attempts: u32,
        last_error: FetchFailure,
        exhausted: bool,
    },

    /// The run was stopped before the task resolved
    Cancelled { attempts: u32 },
}

/// Retry policy shared by all tasks of a run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retryable_codes: HashSet<u16>,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        retryable_codes: impl IntoIterator<Item = u16>,
        backoff: ExponentialBackoff,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable_codes: retryable_codes.into_iter().collect(),
            backoff,
        }
    }

    /// Builds the policy from configuration; a disabled retry allows one attempt
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.effective_max_attempts(),
            config.http_codes.iter().copied(),
            ExponentialBackoff::new(config.backoff_base(), config.backoff_max()),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true if the failure is worth another attempt
    pub fn is_retryable(&self, failure: &FetchFailure) -> bool {
        match failure {
            FetchFailure::Http { status_code } => self.retryable_codes.contains(status_code),
            other => other.is_transient_transport(),
        }
    }

    /// Judges a single attempt
    pub fn status_of(&self, outcome: &FetchOutcome) -> FetchStatus {
        match &outcome.result {
            Ok(_) => FetchStatus::Success,
            Err(failure) if self.is_retryable(failure) => FetchStatus::RetryableFailure,
            Err(_) => FetchStatus::PermanentFailure,
        }
    }

    /// Runs attempts until success, a permanent failure, or a stop request
    ///
    /// Every attempt first waits on `admit`, which yields an admission token
    /// (a throttle permit in the crawler) or None if the run was stopped while
    /// waiting. `attempt_fn` then performs the attempt with its 1-based number
    /// and the token, which it holds until the request is done.
    ///
    /// The tracker moves to `Dispatched` only once an attempt is admitted,
    /// through `RetryPending` between attempts, and into `PermanentlyFailed`
    /// or `Cancelled` when the task ends that way. On success it is left in
    /// `Dispatched`; the caller decides whether handling the response
    /// succeeded.
    pub async fn execute<A, AdmitFut, P, F, Fut>(
        &self,
        tracker: &mut TaskTracker,
        shutdown: &mut ShutdownSignal,
        mut admit: A,
        mut attempt_fn: F,
    ) -> Result<RetryOutcome, HarvestError>
    where
        A: FnMut() -> AdmitFut,
        AdmitFut: Future<Output = Option<P>>,
        F: FnMut(u32, P) -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let mut state = RetryState::new(self.max_attempts);

        loop {
            let Some(admission) = admit().await else {
                tracker.transition(TaskState::Cancelled)?;
                return Ok(RetryOutcome::Cancelled {
                    attempts: state.attempt,
                });
            };

            let attempt = state.begin_attempt();
            tracker.transition(TaskState::Dispatched)?;

            let outcome = attempt_fn(attempt, admission).await;
            let status = self.status_of(&outcome);

            let failure = match outcome.result {
                Ok(response) => {
                    return Ok(RetryOutcome::Succeeded {
                        response,
                        attempts: attempt,
                    });
                }
                Err(failure) => failure,
            };

            if status == FetchStatus::PermanentFailure {
                tracker.transition(TaskState::PermanentlyFailed)?;
                return Ok(RetryOutcome::PermanentlyFailed {
                    attempts: attempt,
                    last_error: failure,
                    exhausted: false,
                });
            }

            if !state.can_retry() {
                tracker.transition(TaskState::PermanentlyFailed)?;
                return Ok(RetryOutcome::PermanentlyFailed {
                    attempts: attempt,
                    last_error: failure,
                    exhausted: true,
                });
            }

            tracker.transition(TaskState::RetryPending)?;
            let delay = self.backoff.delay(attempt);
            tracing::debug!(
                "Attempt {}/{} failed ({}), retrying in {:?}",
                attempt,
                self.max_attempts,
                failure,
                delay
            );

            if !shutdown.sleep(delay).await {
                tracker.transition(TaskState::Cancelled)?;
                return Ok(RetryOutcome::Cancelled { attempts: attempt });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RETRY_CODES;
    use crate::crawler::shutdown;
    use std::time::Duration;
    use url::Url;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            DEFAULT_RETRY_CODES.iter().copied(),
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1)),
        )
    }

    async fn admitted() -> Option<()> {
        Some(())
    }

    fn failed(failure: FetchFailure) -> FetchOutcome {
        FetchOutcome {
            result: Err(failure),
            latency: Duration::from_millis(5),
        }
    }

    fn http(status_code: u16) -> FetchOutcome {
        failed(FetchFailure::Http { status_code })
    }

    fn ok() -> FetchOutcome {
        FetchOutcome {
            result: Ok(FetchedResponse {
                final_url: Url::parse("https://example.com/").unwrap(),
                status_code: 200,
                content_type: None,
                body: b"ok".to_vec(),
                redirect_to: None,
            }),
            latency: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_retry_state_bounds() {
        let mut state = RetryState::new(3);
        assert_eq!(state.begin_attempt(), 1);
        assert!(state.can_retry());
        assert_eq!(state.begin_attempt(), 2);
        assert_eq!(state.begin_attempt(), 3);
        assert!(!state.can_retry());

        // Never exceeds the bound
        assert_eq!(state.begin_attempt(), 3);
    }

    #[test]
    fn test_status_of() {
        let policy = policy(5);
        assert_eq!(policy.status_of(&ok()), FetchStatus::Success);
        for code in [429, 403, 500, 502, 503, 504] {
            assert_eq!(policy.status_of(&http(code)), FetchStatus::RetryableFailure);
        }
        assert_eq!(policy.status_of(&http(404)), FetchStatus::PermanentFailure);
        assert_eq!(policy.status_of(&http(401)), FetchStatus::PermanentFailure);
        assert_eq!(
            policy.status_of(&failed(FetchFailure::Timeout {
                error: "t".to_string()
            })),
            FetchStatus::RetryableFailure
        );
        assert_eq!(
            policy.status_of(&failed(FetchFailure::Transport {
                error: "x".to_string()
            })),
            FetchStatus::PermanentFailure
        );
    }

    #[test]
    fn test_from_config_disabled() {
        let config = RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts(), 1);
        assert_eq!(
            RetryPolicy::from_config(&RetryConfig::default()).max_attempts(),
            5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failures_use_exactly_max_attempts() {
        for max_attempts in 1..=6 {
            let policy = policy(max_attempts);
            let mut tracker = TaskTracker::new("https://example.com/");
            let mut signal = ShutdownSignal::never();
            let mut calls = 0;

            let outcome = policy
                .execute(&mut tracker, &mut signal, admitted, |_, _| {
                    calls += 1;
                    async { http(503) }
                })
                .await
                .unwrap();

            assert_eq!(calls, max_attempts);
            match outcome {
                RetryOutcome::PermanentlyFailed {
                    attempts,
                    last_error,
                    exhausted,
                } => {
                    assert_eq!(attempts, max_attempts);
                    assert_eq!(last_error, FetchFailure::Http { status_code: 503 });
                    assert!(exhausted);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
            assert_eq!(tracker.state(), TaskState::PermanentlyFailed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits() {
        let policy = policy(5);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();
        let mut calls = 0;

        let outcome = policy
            .execute(&mut tracker, &mut signal, admitted, |_, _| {
                calls += 1;
                async { http(404) }
            })
            .await
            .unwrap();

        assert_eq!(calls, 1);
        assert!(matches!(
            outcome,
            RetryOutcome::PermanentlyFailed {
                attempts: 1,
                exhausted: false,
                ..
            }
        ));
        assert_eq!(tracker.state(), TaskState::PermanentlyFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = policy(5);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();
        let mut attempts_seen = Vec::new();

        let outcome = policy
            .execute(&mut tracker, &mut signal, admitted, |attempt, _| {
                attempts_seen.push(attempt);
                async move {
                    if attempt < 3 {
                        failed(FetchFailure::Connection {
                            error: "reset".to_string(),
                        })
                    } else {
                        ok()
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts_seen, vec![1, 2, 3]);
        assert!(matches!(outcome, RetryOutcome::Succeeded { attempts: 3, .. }));
        assert_eq!(tracker.state(), TaskState::Dispatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_applied_between_attempts() {
        let policy = policy(4);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();
        let start = tokio::time::Instant::now();

        policy
            .execute(&mut tracker, &mut signal, admitted, |_, _| async { http(500) })
            .await
            .unwrap();

        // 100ms + 200ms + 400ms between four attempts
        assert!(start.elapsed() >= Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff_cancels() {
        let policy = RetryPolicy::new(
            5,
            [503],
            ExponentialBackoff::new(Duration::from_secs(60), Duration::from_secs(60)),
        );
        let (handle, mut signal) = shutdown::channel();
        let mut tracker = TaskTracker::new("https://example.com/");

        let outcome = policy
            .execute(&mut tracker, &mut signal, admitted, |_, _| {
                handle.stop();
                async { http(503) }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
        assert_eq!(tracker.state(), TaskState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let policy = policy(5);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();
        let mut calls = 0;

        let outcome = policy
            .execute(
                &mut tracker,
                &mut signal,
                || async { None::<()> },
                |_, _| {
                    calls += 1;
                    async { ok() }
                },
            )
            .await
            .unwrap();

        assert_eq!(calls, 0);
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 0 }));
        assert_eq!(tracker.state(), TaskState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stays_queued_until_admitted() {
        let policy = policy(5);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();

        {
            let execution = policy.execute(
                &mut tracker,
                &mut signal,
                || std::future::pending::<Option<()>>(),
                |_, _| async { ok() },
            );
            tokio::pin!(execution);
            let waited =
                tokio::time::timeout(Duration::from_secs(30), execution.as_mut()).await;
            assert!(waited.is_err());
        }

        assert_eq!(tracker.state(), TaskState::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting_for_readmission() {
        let policy = policy(5);
        let mut tracker = TaskTracker::new("https://example.com/");
        let mut signal = ShutdownSignal::never();
        let mut admissions = 0;

        let outcome = policy
            .execute(
                &mut tracker,
                &mut signal,
                || {
                    admissions += 1;
                    let admitted = admissions == 1;
                    async move { admitted.then_some(()) }
                },
                |_, _| async { http(503) },
            )
            .await
            .unwrap();

        assert_eq!(admissions, 2);
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
        assert_eq!(tracker.state(), TaskState::Cancelled);
    }
}
