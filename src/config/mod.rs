//! Configuration module for Site-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! All tunables live in one immutable [`Config`] that is built once at startup
//! and handed to the coordinator.
//!
//! # Example
//!
//! ```no_run
//! use site_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Archiving under: {}", config.output.store_root);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AutoThrottleConfig, Config, CrawlerConfig, OutputConfig, RetryConfig, UserAgentConfig,
    DEFAULT_EXTENSIONS, DEFAULT_RETRY_CODES, DEFAULT_START_URL, MAX_DURATION_SECS,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{ensure_store_root, validate};
