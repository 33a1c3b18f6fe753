//! Crawler module for fetching and routing
//!
//! This module contains the core crawling logic, including:
//! - Classifying URLs as pages or documents
//! - The frontier and its visited set
//! - Request pacing (throttle), retries with backoff, user agent rotation
//! - HTTP fetching and link extraction
//! - Overall crawl coordination and stop requests

mod backoff;
mod classifier;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod retry;
pub mod shutdown;
mod throttle;
pub mod user_agent;

pub use backoff::ExponentialBackoff;
pub use classifier::{classify, Classification};
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_http_client, fetch_url, FetchFailure, FetchOutcome, FetchedResponse};
pub use frontier::{CrawlTask, Frontier, OfferRejection};
pub use parser::extract_links;
pub use retry::{FetchStatus, RetryOutcome, RetryPolicy, RetryState};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
pub use throttle::{Throttle, ThrottlePermit, ThrottleState};
pub use user_agent::{FixedSequence, RandomPool, UserAgentStrategy};
