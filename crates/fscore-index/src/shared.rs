use std::sync::{Arc, PoisonError, RwLock};

use crate::PathCatalog;

/// The published catalog. Readers take an `Arc` and keep it for the whole query, so a
/// rebuild is swapped in whole and never observed half-built.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: RwLock<Arc<PathCatalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: PathCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn current(&self) -> Arc<PathCatalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Publishes `catalog`, returning the one it replaced.
    pub fn replace(&self, catalog: PathCatalog) -> Arc<PathCatalog> {
        let next = Arc::new(catalog);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    pub fn clear(&self) {
        self.replace(PathCatalog::new());
    }
}
