//! Error types for the sego library.
//!
//! The binary and the HTTP layer wrap these in `anyhow`; everything inside
//! the library returns [`Result`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while indexing, ranking or persisting a corpus.
#[derive(Debug, Error)]
pub enum Error {
    /// A document or snapshot could not be opened or read
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Document content is not in the expected format
    #[error("cannot parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
    /// The document tree could not be walked
    #[error("cannot traverse {}: {reason}", .root.display())]
    Traversal { root: PathBuf, reason: String },
    /// A snapshot is corrupt, incompatible or could not be written
    #[error("snapshot {}: {reason}", .path.display())]
    Snapshot { path: PathBuf, reason: String },
    /// A configuration file is unreadable or malformed
    #[error("config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
    /// Bulk load was requested on an engine that already holds documents
    #[error("engine already holds {0} documents, build a new engine to re-index")]
    AlreadyLoaded(usize),
    /// Two documents share one path
    #[error("document {0:?} is already in the corpus")]
    DuplicateDocument(String),
    /// The loader thread pool could not be started
    #[error("cannot start worker pool: {0}")]
    WorkerPool(String),
    /// Strict bulk load stopped at the first document that failed
    #[error("bulk load aborted: {0}")]
    DocumentFailed(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn snapshot(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Snapshot {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;
