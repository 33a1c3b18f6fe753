//! Storage module for archived documents
//!
//! Documents are written under a store root with a layout mirroring the path
//! they were served from:
//!
//! ```text
//! https://x.org/a/b/report.pdf  ->  <store_root>/a/b/report.pdf
//!                                   <store_root>/a/b/report.pdf.meta.json
//! ```

mod archiver;
mod traits;

pub use archiver::{local_path_for, FsArchiver, PROVENANCE_SUFFIX};
pub use traits::{ArchiveError, ArchiveResult, ArchivedFile, DocumentStore};
