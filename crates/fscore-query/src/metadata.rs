use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// Sentinel for a modification time the platform could not express.
pub const UNKNOWN_TS: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_unix_secs: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The path no longer resolves. Callers skip the entry.
    #[error("path unavailable: {0}")]
    NotFound(PathBuf),
}

/// Live size and modification time lookup; nothing is cached.
pub fn resolve(path: &Path) -> Result<FileMetadata, MetadataError> {
    let meta = std::fs::metadata(path).map_err(|_| MetadataError::NotFound(path.to_path_buf()))?;

    let modified_unix_secs = meta
        .modified()
        .ok()
        .and_then(|time| match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_secs()).ok(),
            Err(before) => i64::try_from(before.duration().as_secs()).ok().map(|s| -s),
        })
        .unwrap_or(UNKNOWN_TS);

    Ok(FileMetadata {
        size: meta.len(),
        modified_unix_secs,
    })
}
