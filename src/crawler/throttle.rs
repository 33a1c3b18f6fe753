//! Adaptive request throttle
//!
//! One [`Throttle`] is shared by every fetch of a run and is the only place
//! request pacing is decided:
//! - Global concurrency limiting via a semaphore
//! - A minimum delay between two dispatches
//! - Adjusting that delay from observed response latency
//!
//! # Delay adjustment
//!
//! For each latency sample the target delay is `latency / target_concurrency`,
//! i.e. the delay at which `target_concurrency` requests would be in flight on
//! average. The new delay moves halfway towards the target but never below it:
//!
//! ```text
//! new = max(target, (current + target) / 2)    clamped to [floor, ceiling]
//! ```
//!
//! A slow sample therefore raises the delay at once, while fast samples lower
//! it gradually. Error responses may only raise the delay.

use crate::config::Config;
use crate::crawler::fetcher::{FetchFailure, FetchOutcome};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Snapshot of the throttle
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleState {
    /// Delay currently enforced between dispatches
    pub current_delay: Duration,

    /// Desired average number of in-flight requests
    pub target_concurrency: f64,

    /// Requests currently admitted and not yet released
    pub in_flight: usize,

    /// Lowest delay the throttle will ever use
    pub delay_floor: Duration,

    /// Highest delay the throttle will ever use
    pub delay_ceiling: Duration,
}

/// Mutable part guarded by the lock
#[derive(Debug)]
struct Pacing {
    current_delay: Duration,
    last_dispatch: Option<Instant>,
}

/// Admission ticket for one request; releases its in-flight slot on drop
#[derive(Debug)]
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

/// Shared delay and concurrency governor
#[derive(Debug)]
pub struct Throttle {
    pacing: Mutex<Pacing>,
    permits: Arc<Semaphore>,
    concurrency_limit: usize,
    target_concurrency: f64,
    delay_floor: Duration,
    delay_ceiling: Duration,
    adaptive: bool,
}

impl Throttle {
    /// Creates a throttle
    ///
    /// # Arguments
    ///
    /// * `initial_delay` - Starting delay, clamped into `[floor, ceiling]`
    /// * `delay_floor` / `delay_ceiling` - Bounds of the delay
    /// * `target_concurrency` - Drives the latency-based adjustment
    /// * `concurrency_limit` - Hard cap on requests in flight (at least 1)
    /// * `adaptive` - When false the delay never changes
    pub fn new(
        initial_delay: Duration,
        delay_floor: Duration,
        delay_ceiling: Duration,
        target_concurrency: f64,
        concurrency_limit: usize,
        adaptive: bool,
    ) -> Self {
        let delay_ceiling = delay_ceiling.max(delay_floor);
        let concurrency_limit = concurrency_limit.max(1);
        let target_concurrency = if target_concurrency.is_finite() && target_concurrency > 0.0 {
            target_concurrency
        } else {
            1.0
        };

        Self {
            pacing: Mutex::new(Pacing {
                current_delay: initial_delay.clamp(delay_floor, delay_ceiling),
                last_dispatch: None,
            }),
            permits: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
            target_concurrency,
            delay_floor,
            delay_ceiling,
            adaptive,
        }
    }

    /// Creates the run's throttle from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.initial_delay(),
            config.delay_floor(),
            config.delay_ceiling(),
            config.autothrottle.target_concurrency,
            config.crawler.max_concurrent_requests as usize,
            config.autothrottle.enabled,
        )
    }

    fn pacing(&self) -> MutexGuard<'_, Pacing> {
        self.pacing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until a request may be dispatched
    ///
    /// Returns once fewer than `concurrency_limit` requests are in flight and
    /// the current delay has elapsed since the previous dispatch. The returned
    /// permit must be held for the duration of the request.
    ///
    /// Returns None only if the throttle's semaphore was closed.
    pub async fn before_request(&self) -> Option<ThrottlePermit> {
        let permit = self.permits.clone().acquire_owned().await.ok()?;

        loop {
            let wait = {
                let mut pacing = self.pacing();
                let now = Instant::now();

                match pacing.last_dispatch {
                    Some(last) if now < last + pacing.current_delay => {
                        last + pacing.current_delay - now
                    }
                    _ => {
                        pacing.last_dispatch = Some(now);
                        return Some(ThrottlePermit { _permit: permit });
                    }
                }
            };

            tracing::trace!("Throttle gate closed for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Feeds one latency sample into the delay
    ///
    /// # Arguments
    ///
    /// * `latency` - Time until the response headers arrived
    /// * `success` - Whether the response was a 2xx; failures can only raise the delay
    pub fn after_response(&self, latency: Duration, success: bool) {
        if !self.adaptive {
            return;
        }

        let mut pacing = self.pacing();
        let current = pacing.current_delay.as_secs_f64();
        let target = latency.as_secs_f64() / self.target_concurrency;

        let proposed = target
            .max((current + target) / 2.0)
            .min(self.delay_ceiling.as_secs_f64());
        let proposed = Duration::from_secs_f64(proposed.max(0.0))
            .clamp(self.delay_floor, self.delay_ceiling);

        // Error pages are small and fast and must not speed the crawl up
        if !success && proposed < pacing.current_delay {
            return;
        }

        if proposed != pacing.current_delay {
            tracing::debug!(
                "Throttle delay {:?} -> {:?} (latency {:?}, success {})",
                pacing.current_delay,
                proposed,
                latency,
                success
            );
        }
        pacing.current_delay = proposed;
    }

    /// Feeds a fetch outcome into the delay
    ///
    /// Responses of any status count as samples, and so do timeouts, which
    /// can only push the delay up. Connection failures carry no latency
    /// information and are ignored.
    pub fn observe(&self, outcome: &FetchOutcome) {
        match &outcome.result {
            Ok(_) => self.after_response(outcome.latency, true),
            Err(FetchFailure::Http { .. }) | Err(FetchFailure::Timeout { .. }) => {
                self.after_response(outcome.latency, false)
            }
            Err(_) => {}
        }
    }

    /// Delay currently enforced between dispatches
    pub fn current_delay(&self) -> Duration {
        self.pacing().current_delay
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.concurrency_limit - self.permits.available_permits()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Returns a consistent snapshot of the throttle
    pub fn state(&self) -> ThrottleState {
        ThrottleState {
            current_delay: self.current_delay(),
            target_concurrency: self.target_concurrency,
            in_flight: self.in_flight(),
            delay_floor: self.delay_floor,
            delay_ceiling: self.delay_ceiling,
        }
    }
}
