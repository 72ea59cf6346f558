//! Category store handles
//!
//! A [`CategoryStore`] binds a backend to one `(site, category)` pair and
//! exposes the per-category operations. It owns no data; cloning it is
//! cheap.

use std::sync::Arc;

use modlog_core::{Category, ChangeRecord, RecordKey, SiteId, StorageError};

use crate::{FacilityCounts, LogBackend};

/// Handle to one category of one site
#[derive(Clone)]
pub struct CategoryStore {
    backend: Arc<dyn LogBackend>,
    site: SiteId,
    category: Category,
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStore")
            .field("site", &self.site)
            .field("category", &self.category)
            .finish()
    }
}

impl CategoryStore {
    /// Create a new handle
    pub fn new(backend: Arc<dyn LogBackend>, site: SiteId, category: Category) -> Self {
        Self {
            backend,
            site,
            category,
        }
    }

    /// The site this store belongs to
    pub fn site(&self) -> &SiteId {
        &self.site
    }

    /// The category this store holds
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Insert a record under a fresh key, newest first
    pub fn insert(&self, record: &ChangeRecord) -> Result<RecordKey, StorageError> {
        self.backend.insert(&self.site, &self.category, record)
    }

    /// Get a record by key
    pub fn get(&self, key: RecordKey) -> Result<Option<ChangeRecord>, StorageError> {
        self.backend.get(&self.site, &self.category, key)
    }

    /// Delete a record, failing with `KeyNotFound` if it is absent
    pub fn delete(&self, key: RecordKey) -> Result<ChangeRecord, StorageError> {
        self.backend.delete(&self.site, &self.category, key)
    }

    /// Keys, newest first
    pub fn keys(&self) -> Result<Vec<RecordKey>, StorageError> {
        self.backend.keys(&self.site, &self.category)
    }

    /// Whether the key is in the order sequence
    pub fn contains(&self, key: RecordKey) -> Result<bool, StorageError> {
        self.backend.contains(&self.site, &self.category, key)
    }

    /// Number of keys in the order sequence
    pub fn len(&self) -> Result<usize, StorageError> {
        self.backend.len(&self.site, &self.category)
    }

    /// Whether the category holds no records
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.backend.is_empty(&self.site, &self.category)
    }

    /// Sizes of the order sequence and the record map
    pub fn counts(&self) -> Result<FacilityCounts, StorageError> {
        self.backend.counts(&self.site, &self.category)
    }
}
