//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client (timeouts, compression, no auto-redirects)
//! - Sending GET requests with a per-request user agent
//! - Surfacing redirects so their targets go through the frontier
//! - Measuring response latency for the throttle
//! - Classifying failures into HTTP, timeout, connection and other errors

use crate::config::Config;
use reqwest::header::{CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// A response the crawler can act on: a 2xx, or a redirect with a usable
/// `Location`
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// URL the response was served for
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,

    /// Absolute redirect target for 3xx responses
    pub redirect_to: Option<Url>,
}

impl FetchedResponse {
    pub fn is_redirect(&self) -> bool {
        self.redirect_to.is_some()
    }

    /// Returns true unless the server declared a non-HTML content type
    pub fn looks_like_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }
}

/// Why a single attempt did not produce a 2xx response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server answered with a non-2xx status (or a 3xx without `Location`)
    Http { status_code: u16 },

    /// The request or body read timed out
    Timeout { error: String },

    /// Connection refused, reset, or dropped mid-body
    Connection { error: String },

    /// Anything else (malformed request, too many redirects, decoding)
    Transport { error: String },
}

impl FetchFailure {
    /// HTTP status code, when the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns true for transport-level failures that are worth retrying
    pub fn is_transient_transport(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status_code } => write!(f, "HTTP {}", status_code),
            Self::Timeout { error } => write!(f, "timeout: {}", error),
            Self::Connection { error } => write!(f, "connection error: {}", error),
            Self::Transport { error } => write!(f, "transport error: {}", error),
        }
    }
}

/// Result of one fetch attempt together with its observed latency
///
/// Latency is measured until response headers arrive, so large bodies do not
/// make the server look slow.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub result: Result<FetchedResponse, FetchFailure>,
    pub latency: Duration,
}

impl FetchOutcome {
    /// HTTP status code of the attempt, success or not
    pub fn http_status(&self) -> Option<u16> {
        match &self.result {
            Ok(response) => Some(response.status_code),
            Err(failure) => failure.status_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent is not baked into the client; each request sets its own so
/// that identities can rotate. Redirects are never followed by the client:
/// a 3xx comes back as a [`FetchedResponse`] with `redirect_to` set, and the
/// caller decides whether the target is in scope and not yet visited.
///
/// # Example
///
/// ```no_run
/// use site_harvester::config::Config;
/// use site_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs a single GET request
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `user_agent` - Identity sent in the `User-Agent` header
///
/// # Returns
///
/// The attempt's outcome; never panics and never returns early on error.
pub async fn fetch_url(client: &Client, url: &Url, user_agent: &str) -> FetchOutcome {
    let started = Instant::now();

    let response = match client
        .get(url.clone())
        .header(USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return FetchOutcome {
                result: Err(classify_error(&e)),
                latency: started.elapsed(),
            };
        }
    };

    let latency = started.elapsed();
    let status = response.status();

    if status.is_redirection() {
        if let Some(target) = redirect_target(&response) {
            return FetchOutcome {
                result: Ok(FetchedResponse {
                    final_url: response.url().clone(),
                    status_code: status.as_u16(),
                    content_type: None,
                    body: Vec::new(),
                    redirect_to: Some(target),
                }),
                latency,
            };
        }
    }

    if !status.is_success() {
        return FetchOutcome {
            result: Err(FetchFailure::Http {
                status_code: status.as_u16(),
            }),
            latency,
        };
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let result = match response.bytes().await {
        Ok(body) => Ok(FetchedResponse {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
            redirect_to: None,
        }),
        Err(e) => Err(classify_error(&e)),
    };

    FetchOutcome { result, latency }
}

/// Resolves a redirect's `Location` against the URL it was served for
fn redirect_target(response: &reqwest::Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location.trim()).ok()
}

/// Maps a reqwest error onto a failure kind
fn classify_error(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout {
            error: e.to_string(),
        }
    } else if e.is_connect() || e.is_body() || e.is_request() {
        FetchFailure::Connection {
            error: e.to_string(),
        }
    } else {
        FetchFailure::Transport {
            error: e.to_string(),
        }
    }
}
