//! Substring search over a [`PathCatalog`], enriched with live file metadata.

pub mod metadata;

use std::path::PathBuf;

use fscore_config::Settings;
use fscore_index::PathCatalog;
use serde::{Deserialize, Serialize};

pub use metadata::{FileMetadata, MetadataError, UNKNOWN_TS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub fragment: String,
    /// Explicitly confirmed by the user, so the live-typing minimum length does not apply.
    pub forced: bool,
}

impl SearchRequest {
    pub fn live(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            forced: false,
        }
    }

    pub fn forced(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            forced: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Display form of the catalogued filename.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified_unix_secs: i64,
}

pub trait QueryEngine {
    /// Whether `request` would scan the catalog at all.
    fn admits(&self, request: &SearchRequest) -> bool;

    fn search(&self, catalog: &PathCatalog, request: &SearchRequest) -> Vec<SearchItem>;
}

/// Case-insensitive filename substring matching. Results come back in path order.
#[derive(Debug, Clone)]
pub struct SubstringQueryEngine {
    min_live_query_len: usize,
    max_results: usize,
}

impl Default for SubstringQueryEngine {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SubstringQueryEngine {
    pub fn new(min_live_query_len: usize, max_results: usize) -> Self {
        Self {
            min_live_query_len,
            max_results,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.min_live_query_len, settings.max_results)
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn min_live_query_len(&self) -> usize {
        self.min_live_query_len
    }
}

impl QueryEngine for SubstringQueryEngine {
    fn admits(&self, request: &SearchRequest) -> bool {
        let fragment = request.fragment.trim();
        if fragment.is_empty() {
            return false;
        }

        request.forced || fragment.chars().count() >= self.min_live_query_len
    }

    fn search(&self, catalog: &PathCatalog, request: &SearchRequest) -> Vec<SearchItem> {
        if !self.admits(request) {
            return Vec::new();
        }

        let candidates = catalog.matches(request.fragment.trim());
        let mut out = Vec::with_capacity(candidates.len().min(self.max_results));
        let mut dropped = 0usize;

        for hit in candidates {
            if out.len() >= self.max_results {
                break;
            }

            match metadata::resolve(hit.path) {
                Ok(meta) => out.push(SearchItem {
                    name: hit.name.to_string_lossy().into_owned(),
                    path: hit.path.to_path_buf(),
                    size: meta.size,
                    modified_unix_secs: meta.modified_unix_secs,
                }),
                Err(MetadataError::NotFound(_)) => dropped += 1,
            }
        }

        tracing::debug!(
            fragment = request.fragment.trim(),
            forced = request.forced,
            results = out.len(),
            dropped,
            "search finished"
        );
        out
    }
}
