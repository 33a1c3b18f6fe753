//! Filesystem document archiver
//!
//! Every write goes to a temporary file in the destination directory and is
//! then renamed over the target, so a stopped run never leaves a truncated
//! document behind. The provenance record is written before the document, so
//! a visible document always has its record next to it.

use crate::storage::traits::{ArchiveError, ArchiveResult, ArchivedFile, DocumentStore};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// Suffix appended to a document's path for its provenance record
pub const PROVENANCE_SUFFIX: &str = ".meta.json";

/// Maps a URL to its path relative to the store root
///
/// The URL path loses its leading `/`. When nothing is left, or the path ends
/// in `/`, a file named after the host is appended. Two directory-style URLs
/// on one host therefore never collide, but `/a/` and `/a/x.org` would.
///
/// Returns None if a segment is `.` or `..`.
///
/// # Examples
///
/// ```
/// use site_harvester::storage::local_path_for;
/// use url::Url;
///
/// let url = Url::parse("http://x.org/a/b/report.pdf").unwrap();
/// assert_eq!(local_path_for(&url).as_deref(), Some("a/b/report.pdf"));
///
/// let url = Url::parse("http://x.org/docs/").unwrap();
/// assert_eq!(local_path_for(&url).as_deref(), Some("docs/x.org"));
/// ```
pub fn local_path_for(url: &Url) -> Option<String> {
    let path = url.path().trim_start_matches('/');
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }

    if path.is_empty() || path.ends_with('/') {
        segments.push(url.host_str()?);
    }

    Some(segments.join("/"))
}

/// Archives documents under a root directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsArchiver {
    root: PathBuf,
    write_provenance: bool,
}

impl FsArchiver {
    pub fn new(root: impl Into<PathBuf>, write_provenance: bool) -> Self {
        Self {
            root: root.into(),
            write_provenance,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` to `target` through a sibling temp file
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> ArchiveResult<()> {
        let io_err = |source| ArchiveError::Io {
            path: target.to_path_buf(),
            source,
        };
        let parent = target.parent().unwrap_or(&self.root);

        std::fs::create_dir_all(parent).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(target).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

impl DocumentStore for FsArchiver {
    fn archive(
        &self,
        url: &Url,
        source_page: Option<&str>,
        bytes: &[u8],
    ) -> ArchiveResult<ArchivedFile> {
        let local_path = local_path_for(url).ok_or_else(|| ArchiveError::UnsafePath {
            url: url.to_string(),
        })?;
        let target = self.root.join(&local_path);

        let record = ArchivedFile {
            local_path,
            source_url: url.to_string(),
            source_page: source_page.map(str::to_string),
            downloaded_at: Utc::now(),
        };

        if !self.write_provenance {
            self.write_atomic(&target, bytes)?;
            tracing::debug!("Wrote {} ({} bytes)", record.local_path, bytes.len());
            return Ok(record);
        }

        let mut meta_path = target.clone().into_os_string();
        meta_path.push(PROVENANCE_SUFFIX);
        let meta_path = PathBuf::from(meta_path);

        let meta = serde_json::to_vec_pretty(&record)?;
        self.write_atomic(&meta_path, &meta)?;

        if let Err(e) = self.write_atomic(&target, bytes) {
            if let Err(cleanup) = std::fs::remove_file(&meta_path) {
                tracing::warn!(
                    "Failed to remove provenance {}: {}",
                    meta_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        tracing::debug!("Wrote {} ({} bytes)", record.local_path, bytes.len());
        Ok(record)
    }
}
