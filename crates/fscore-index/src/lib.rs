//! Filename catalog: the in-memory filename → paths index, the directory walker that
//! builds it, and the snapshot codec that persists it.

mod cancel;
mod catalog;
mod indexer;
mod shared;
pub mod snapshot;

use std::path::PathBuf;
use std::time::Duration;

pub use cancel::CancelToken;
pub use catalog::{CatalogMatch, PathCatalog};
pub use indexer::Indexer;
pub use shared::SharedCatalog;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("corrupt snapshot '{path}': {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("indexing cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptSnapshot {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of one completed indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub root: PathBuf,
    pub files: usize,
    pub names: usize,
    /// Entries the walk could not read (permission denied, vanished, symlink loops).
    pub skipped: usize,
    pub elapsed: Duration,
}
