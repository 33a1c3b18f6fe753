//! URL handling module for Site-Harvester
//!
//! This module provides URL normalization (the dedup identity of a URL),
//! domain extraction, and the single-site scope check.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, SiteScope};
pub use normalize::{normalize_parsed, normalize_url};
