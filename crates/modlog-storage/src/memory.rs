//! In-memory storage backend
//!
//! Suitable for tests, simulations, and hosts that persist the log
//! elsewhere. Each category sits behind its own lock, so inserts into
//! different categories never contend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use modlog_core::{Category, ChangeRecord, RecordKey, SiteId, StorageError};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::keygen::KeyGenerator;
use crate::{FacilityCounts, LogBackend};

/// The two structures backing one category
#[derive(Debug, Default)]
struct Facility {
    records: HashMap<RecordKey, ChangeRecord>,
    /// Newest key at the front
    order: VecDeque<RecordKey>,
    /// Set by the first committed insert; stays set once records are pruned
    materialized: bool,
}

type FacilityId = (SiteId, Category);

/// In-memory implementation of LogBackend
///
/// Uses `DashMap` to find a category and a per-category `RwLock` to mutate
/// it. Key generation runs under the category's write lock, so reserving a
/// key and committing the record cannot interleave with another insert.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    facilities: DashMap<FacilityId, Arc<RwLock<Facility>>>,
    /// Sites with at least one committed insert
    sites: DashSet<SiteId>,
    keygen: KeyGenerator,
    /// Total number of records across all sites and categories
    total_records: AtomicUsize,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom key generator
    pub fn with_keygen(keygen: KeyGenerator) -> Self {
        Self {
            keygen,
            ..Self::default()
        }
    }

    /// Get the total number of records across all sites and categories
    pub fn total_records(&self) -> usize {
        self.total_records.load(Ordering::SeqCst)
    }

    /// Get the number of materialized categories across all sites
    pub fn facility_count(&self) -> usize {
        self.facilities
            .iter()
            .filter(|entry| entry.value().read().materialized)
            .count()
    }

    /// Look up a category without creating it
    fn facility(&self, site: &SiteId, category: &Category) -> Option<Arc<RwLock<Facility>>> {
        self.facilities
            .get(&(site.clone(), category.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a category, allocating a slot for it if needed
    ///
    /// The slot stays invisible to `site_exists`, `categories` and
    /// `facility_count` until an insert commits into it.
    fn facility_slot(&self, site: &SiteId, category: &Category) -> Arc<RwLock<Facility>> {
        let entry = self
            .facilities
            .entry((site.clone(), category.clone()))
            .or_default();
        Arc::clone(entry.value())
    }
}

impl LogBackend for MemoryBackend {
    fn insert(
        &self,
        site: &SiteId,
        category: &Category,
        record: &ChangeRecord,
    ) -> Result<RecordKey, StorageError> {
        let facility = self.facility_slot(site, category);
        let mut facility = facility.write();

        let existing = facility.records.len() as u64;
        let key = self
            .keygen
            .generate(category, existing, |candidate| {
                Ok(facility.records.contains_key(&candidate))
            })?;

        if !facility.materialized {
            debug!(site = %site, category = %category, "Creating in-memory category");
            facility.materialized = true;
            self.sites.insert(site.clone());
        }
        facility.records.insert(key, record.clone());
        facility.order.push_front(key);
        self.total_records.fetch_add(1, Ordering::SeqCst);

        debug!(site = %site, category = %category, key = %key, uid = %record.uid, "Inserted record");
        Ok(key)
    }

    fn get(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<Option<ChangeRecord>, StorageError> {
        Ok(self
            .facility(site, category)
            .and_then(|facility| facility.read().records.get(&key).cloned()))
    }

    fn delete(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<ChangeRecord, StorageError> {
        let Some(facility) = self.facility(site, category) else {
            return Err(StorageError::key_not_found(category.as_str(), key));
        };
        let mut facility = facility.write();

        let position = facility.order.iter().position(|k| *k == key);
        let in_records = facility.records.contains_key(&key);

        match (position, in_records) {
            (Some(position), true) => {
                facility.order.remove(position);
                let record = facility
                    .records
                    .remove(&key)
                    .ok_or_else(|| StorageError::key_not_found(category.as_str(), key))?;
                self.total_records.fetch_sub(1, Ordering::SeqCst);
                debug!(site = %site, category = %category, key = %key, "Deleted record");
                Ok(record)
            }
            (None, false) => Err(StorageError::key_not_found(category.as_str(), key)),
            (position, in_records) => {
                warn!(
                    site = %site,
                    category = %category,
                    key = %key,
                    in_order = position.is_some(),
                    in_records,
                    "Key present in only one structure"
                );
                Err(StorageError::key_not_found(category.as_str(), key))
            }
        }
    }

    fn keys(&self, site: &SiteId, category: &Category) -> Result<Vec<RecordKey>, StorageError> {
        Ok(self
            .facility(site, category)
            .map(|facility| facility.read().order.iter().copied().collect())
            .unwrap_or_default())
    }

    fn contains(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<bool, StorageError> {
        Ok(self
            .facility(site, category)
            .is_some_and(|facility| facility.read().order.contains(&key)))
    }

    fn len(&self, site: &SiteId, category: &Category) -> Result<usize, StorageError> {
        Ok(self
            .facility(site, category)
            .map_or(0, |facility| facility.read().order.len()))
    }

    fn counts(&self, site: &SiteId, category: &Category) -> Result<FacilityCounts, StorageError> {
        Ok(self
            .facility(site, category)
            .map(|facility| {
                let facility = facility.read();
                FacilityCounts {
                    order: facility.order.len(),
                    records: facility.records.len(),
                }
            })
            .unwrap_or_default())
    }

    fn site_exists(&self, site: &SiteId) -> Result<bool, StorageError> {
        Ok(self.sites.contains(site))
    }

    fn categories(&self, site: &SiteId) -> Result<Vec<Category>, StorageError> {
        let mut categories: Vec<Category> = self
            .facilities
            .iter()
            .filter(|entry| &entry.key().0 == site && entry.value().read().materialized)
            .map(|entry| entry.key().1.clone())
            .collect();
        categories.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(categories)
    }
}
