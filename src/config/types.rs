use serde::Deserialize;
use std::time::Duration;

/// Seed used when neither the config file, the CLI, nor `START_URL` names one
pub const DEFAULT_START_URL: &str = "https://cob.org";

/// Document suffixes archived by default
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".c", ".cpp", ".cs", ".css", ".doc", ".docx", ".go", ".html", ".java", ".js", ".json", ".md",
    ".pdf", ".php", ".pptx", ".py", ".rb", ".sh", ".tex", ".ts", ".txt",
];

/// Status codes retried by default
pub const DEFAULT_RETRY_CODES: &[u16] = &[429, 403, 500, 502, 503, 504];

/// Longest delay or timeout a setting may express, in seconds (one day)
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Main configuration structure for Site-Harvester
///
/// Every table and key is optional; missing values fall back to the defaults
/// of the respective section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub autothrottle: AutoThrottleConfig,
    pub retry: RetryConfig,
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Returns the effective starting delay for the throttle
    ///
    /// With autothrottle on this is the larger of the download delay and the
    /// autothrottle start delay; otherwise it is the fixed download delay.
    pub fn initial_delay(&self) -> Duration {
        if self.autothrottle.enabled {
            secs(self.crawler.download_delay.max(self.autothrottle.start_delay))
        } else {
            secs(self.crawler.download_delay)
        }
    }

    /// Lower bound of the throttle delay
    pub fn delay_floor(&self) -> Duration {
        secs(self.crawler.download_delay)
    }

    /// Upper bound of the throttle delay
    pub fn delay_ceiling(&self) -> Duration {
        if self.autothrottle.enabled {
            secs(self.autothrottle.max_delay)
        } else {
            secs(self.crawler.download_delay)
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seed of the crawl; its host is the only host that will be crawled
    pub start_url: String,

    /// Minimum seconds between two dispatched requests
    pub download_delay: f64,

    /// Maximum number of fetches in flight at once
    pub max_concurrent_requests: u32,

    /// Maximum link depth from the seed (unlimited when absent)
    pub max_depth: Option<u32>,

    /// Per-request timeout in seconds
    pub request_timeout: f64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            download_delay: 2.0,
            max_concurrent_requests: 8,
            max_depth: None,
            request_timeout: 30.0,
        }
    }
}

/// Adaptive delay configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutoThrottleConfig {
    /// Adjust the delay from observed latency; fixed delay when false
    pub enabled: bool,

    /// Initial delay in seconds
    pub start_delay: f64,

    /// Ceiling of the delay in seconds
    pub max_delay: f64,

    /// Desired number of requests in flight against the host
    pub target_concurrency: f64,
}

impl Default for AutoThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay: 2.0,
            max_delay: 30.0,
            target_concurrency: 0.5,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    pub enabled: bool,

    /// Total attempts per task, first attempt included
    pub max_attempts: u32,

    /// HTTP status codes that trigger another attempt
    pub http_codes: Vec<u16>,

    /// Backoff before the first retry, in seconds
    pub backoff_base: f64,

    /// Backoff cap, in seconds
    pub backoff_max: f64,
}

impl RetryConfig {
    /// Attempts actually allowed, honoring the `enabled` switch
    pub fn effective_max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts
        } else {
            1
        }
    }

    pub fn backoff_base(&self) -> Duration {
        secs(self.backoff_base)
    }

    pub fn backoff_max(&self) -> Duration {
        secs(self.backoff_max)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            http_codes: DEFAULT_RETRY_CODES.to_vec(),
            backoff_base: 1.0,
            backoff_max: 30.0,
        }
    }
}

/// User agent rotation configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Identities to rotate through; the built-in browser pool when empty
    pub pool: Vec<String>,

    /// Fixed RNG seed for reproducible rotation
    pub seed: Option<u64>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory archived documents are written under
    pub store_root: String,

    /// Write a `.meta.json` provenance record next to each document
    pub write_provenance: bool,

    /// Path suffixes treated as documents
    pub extensions: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            store_root: "data/files".to_string(),
            write_provenance: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Converts seconds to a duration, clamped to `[0, MAX_DURATION_SECS]`
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DURATION_SECS)).unwrap_or_default()
}
