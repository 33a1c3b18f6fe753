//! Document store trait and error types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur while archiving a document
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Refusing to archive {url}: unsafe path segment")]
    UnsafePath { url: String },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode provenance: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Record of one archived document
///
/// Serialized as the provenance sidecar when provenance is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedFile {
    /// Path relative to the store root, `/`-separated
    pub local_path: String,

    pub source_url: String,

    /// Page the document was linked from; None when it was the seed
    pub source_page: Option<String>,

    pub downloaded_at: DateTime<Utc>,
}

/// Destination for downloaded documents
///
/// Implementations are called from blocking threads and must be shareable
/// between workers.
pub trait DocumentStore: Send + Sync {
    /// Persists `bytes` fetched from `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Normalized URL the document was fetched from
    /// * `source_page` - Page the link was found on
    /// * `bytes` - Response body
    ///
    /// # Returns
    ///
    /// The record of where the document was written
    fn archive(
        &self,
        url: &Url,
        source_page: Option<&str>,
        bytes: &[u8],
    ) -> ArchiveResult<ArchivedFile>;
}
