//! # Modlog Storage
//!
//! Storage engine for the modlog audit trail.
//!
//! A site's log is split into categories (additions, deletions,
//! modifications, moves). Each category keeps a map from a random
//! [`RecordKey`] to its [`ChangeRecord`] plus an order sequence of keys,
//! newest first. Both structures always hold the same key set.
//!
//! ## Features
//!
//! - **LogBackend trait**: Storage abstraction addressed by site and category
//! - **MemoryBackend**: In-memory implementation, per-category locking
//! - **RedbBackend**: Persistent implementation on redb, one transaction per mutation
//! - **KeyGenerator**: Bounded, collision-free random key generation
//! - **ChangesetView**: Read-only LIFO query lens with filtered batching
//! - **ModificationLog**: Facade that logs actions and prunes old records
//! - **ModlogConfig**: TOML configuration selecting and opening a backend
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use modlog_core::{ContentRef, SiteId};
//! use modlog_storage::{MemoryBackend, ModificationLog};
//!
//! let log = ModificationLog::builder(Arc::new(MemoryBackend::new()), SiteId::new("plone")?)
//!     .build()?;
//!
//! let doc = ContentRef::new("u1", "/plone/doc1");
//! log.added(&doc, Some("alice"), None)?;
//!
//! assert_eq!(log.additions().len()?, 1);
//! log.prune(None, Some(30.0), None)?;
//! ```

pub mod config;
pub mod events;
pub mod keygen;
pub mod memory;
pub mod modlog;
pub mod store;
pub mod structured;
pub mod view;

// Re-exports
pub use config::{ConfigError, ModlogConfig, StorageBackendConfig};
pub use events::LifecycleEvent;
pub use keygen::{KeyGenConfig, KeyGenerator};
pub use memory::MemoryBackend;
pub use modlog::{ModificationLog, ModificationLogBuilder, PruneFailure, PruneReport};
pub use store::CategoryStore;
pub use structured::{RedbBackend, RedbStorageConfig};
pub use view::{ChangesetView, Items, Limit, LimitItems, Values};

// Re-export core types for convenience
pub use modlog_core::{Category, ChangeRecord, RecordFilter, RecordKey, SiteId, StorageError};

/// Sizes of the two structures backing a category
///
/// A healthy category always has `order == records`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FacilityCounts {
    /// Number of keys in the LIFO order sequence
    pub order: usize,
    /// Number of records in the key map
    pub records: usize,
}

impl FacilityCounts {
    /// Whether order and records agree
    pub fn is_consistent(&self) -> bool {
        self.order == self.records
    }
}

/// Storage for the categories of one or more sites
///
/// Every method addresses a single category of a single site. Categories
/// (and the site itself) are materialized lazily by the first `insert`;
/// reads against a category that was never written return empty results
/// and never allocate storage.
///
/// Implementations must make `insert` and `delete` atomic with respect to
/// the key map and the order sequence: no reader may observe a key in one
/// but not the other.
pub trait LogBackend: Send + Sync {
    /// Store a record under a freshly generated key and put the key at the
    /// front of the order sequence
    ///
    /// # Errors
    ///
    /// Returns `KeyExhaustion` if no free key could be generated.
    fn insert(
        &self,
        site: &SiteId,
        category: &Category,
        record: &ChangeRecord,
    ) -> Result<RecordKey, StorageError>;

    /// Get a record by key
    fn get(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<Option<ChangeRecord>, StorageError>;

    /// Remove a record and its order entry, returning the removed record
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is missing from either structure.
    fn delete(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<ChangeRecord, StorageError>;

    /// Keys in LIFO order (newest first)
    fn keys(&self, site: &SiteId, category: &Category) -> Result<Vec<RecordKey>, StorageError>;

    /// Whether the key is present in the order sequence
    fn contains(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<bool, StorageError>;

    /// Length of the order sequence
    fn len(&self, site: &SiteId, category: &Category) -> Result<usize, StorageError>;

    /// Whether the order sequence is empty
    fn is_empty(&self, site: &SiteId, category: &Category) -> Result<bool, StorageError> {
        Ok(self.len(site, category)? == 0)
    }

    /// Sizes of both backing structures, for consistency checks
    fn counts(&self, site: &SiteId, category: &Category) -> Result<FacilityCounts, StorageError>;

    /// Whether anything was ever logged for the site
    fn site_exists(&self, site: &SiteId) -> Result<bool, StorageError>;

    /// Categories materialized for the site, sorted by name
    fn categories(&self, site: &SiteId) -> Result<Vec<Category>, StorageError>;
}
