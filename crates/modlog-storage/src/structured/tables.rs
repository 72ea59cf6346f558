//! redb table definitions and database manager
//!
//! Layout per site and category, both created by the first insert:
//!
//! ```text
//! modlog/{site}/{category}/records   i32 key -> postcard(StoredRecord)
//! modlog/{site}/{category}/order     u64 seq -> i32 key   (highest seq = newest)
//! ```
//!
//! plus one global `modlog_sites` registry written together with a site's
//! first record.

use std::path::PathBuf;
use std::sync::Arc;

use modlog_core::{Category, ChangeRecord, SiteId, StorageError};
use redb::{
    Builder, Database, Key, ReadOnlyTable, ReadTransaction, TableDefinition, TableError, Value,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::keygen::KeyGenerator;

// Key: site name, Value: creation time (Unix millis)
pub const SITES: TableDefinition<&str, i64> = TableDefinition::new("modlog_sites");

const TABLE_PREFIX: &str = "modlog";
const RECORDS_SUFFIX: &str = "records";
const ORDER_SUFFIX: &str = "order";

/// Name of a category's record table
pub fn records_table_name(site: &SiteId, category: &Category) -> String {
    format!("{TABLE_PREFIX}/{site}/{category}/{RECORDS_SUFFIX}")
}

/// Name of a category's order table
pub fn order_table_name(site: &SiteId, category: &Category) -> String {
    format!("{TABLE_PREFIX}/{site}/{category}/{ORDER_SUFFIX}")
}

/// Recover the category from a record table name belonging to `site`
pub(crate) fn category_from_table_name(site: &SiteId, name: &str) -> Option<Category> {
    let prefix = format!("{TABLE_PREFIX}/{site}/");
    let middle = name
        .strip_prefix(&prefix)?
        .strip_suffix(&format!("/{RECORDS_SUFFIX}"))?;
    Category::from_name(middle).ok()
}

/// Record as persisted, with its position in the order table
#[derive(Debug, Deserialize)]
pub(crate) struct StoredRecord {
    pub seq: u64,
    pub record: ChangeRecord,
}

/// Borrowing twin of [`StoredRecord`] used for encoding
#[derive(Serialize)]
pub(crate) struct StoredRecordRef<'a> {
    pub seq: u64,
    pub record: &'a ChangeRecord,
}

pub(crate) fn encode(seq: u64, record: &ChangeRecord) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(&StoredRecordRef { seq, record })
        .map_err(|e| StorageError::serialization(e.to_string()))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<StoredRecord, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

pub(crate) fn db_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::database(err.to_string())
}

/// Open a table for reading, treating a missing table as empty
pub(crate) fn open_existing<K: Key + 'static, V: Value + 'static>(
    txn: &ReadTransaction,
    definition: TableDefinition<K, V>,
) -> Result<Option<ReadOnlyTable<K, V>>, StorageError> {
    match txn.open_table(definition) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Configuration for redb storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/modlog.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Persistent LogBackend on a single redb database
///
/// Every insert and delete runs in one write transaction covering both the
/// record table and the order table, so the two commit together or not at
/// all. redb admits one writer at a time, which also makes key generation
/// and insertion a single atomic step.
pub struct RedbBackend {
    pub(crate) db: Arc<Database>,
    pub(crate) keygen: KeyGenerator,
    config: RedbStorageConfig,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("config", &self.config)
            .field("keygen", &self.keygen)
            .finish()
    }
}

impl RedbBackend {
    /// Open or create the database
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        Self::open_with_keygen(config, KeyGenerator::default())
    }

    /// Open or create the database with a custom key generator
    #[instrument(skip(config, keygen), fields(path = %config.db_path.display()))]
    pub fn open_with_keygen(
        config: RedbStorageConfig,
        keygen: KeyGenerator,
    ) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Opened redb database");

        let backend = Self {
            db: Arc::new(db),
            keygen,
            config,
        };

        backend.init_tables()?;

        Ok(backend)
    }

    /// Create the site registry if it doesn't exist
    ///
    /// Category tables are not created here; they appear with their first
    /// record.
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        write_txn.open_table(SITES).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get a reference to the database
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Compact the database file, reclaiming space freed by pruning
    ///
    /// Needs exclusive access; returns `Ok(false)` if the database handle
    /// is shared.
    pub fn compact(&mut self) -> Result<bool, StorageError> {
        match Arc::get_mut(&mut self.db) {
            Some(db) => {
                let compacted = db.compact().map_err(db_err)?;
                info!(compacted, "Database compaction finished");
                Ok(compacted)
            }
            None => {
                debug!("Database compaction skipped, handle is shared");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_table_names() {
        let site = SiteId::new("plone").unwrap();
        assert_eq!(
            records_table_name(&site, &Category::Additions),
            "modlog/plone/additions/records"
        );
        assert_eq!(
            order_table_name(&site, &Category::Moves),
            "modlog/plone/moves/order"
        );
    }

    #[test]
    fn test_category_from_table_name() {
        let site = SiteId::new("plone").unwrap();
        let name = records_table_name(&site, &Category::Custom("reviews".into()));
        assert_eq!(
            category_from_table_name(&site, &name),
            Some(Category::Custom("reviews".into()))
        );
        assert_eq!(
            category_from_table_name(&site, "modlog/plone/moves/order"),
            None
        );

        let other = SiteId::new("plone2").unwrap();
        assert_eq!(category_from_table_name(&other, &name), None);
    }

    #[test]
    fn test_stored_record_encoding() {
        let record = ChangeRecord::new("u1", "/p", "alice", Utc::now());
        let bytes = encode(9, &record).unwrap();
        let stored = decode(&bytes).unwrap();
        assert_eq!(stored.seq, 9);
        assert_eq!(stored.record, record);
        assert!(decode(&[0xff, 0xff]).is_err());
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig {
            db_path: temp_dir.path().join("nested").join("log.redb"),
            ..Default::default()
        };
        let backend = RedbBackend::open(config).unwrap();
        assert!(backend.config().db_path.exists());
    }

    #[test]
    fn test_compact_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig {
            db_path: temp_dir.path().join("log.redb"),
            ..Default::default()
        };
        let mut backend = RedbBackend::open(config).unwrap();
        assert!(backend.compact().is_ok());

        let shared = Arc::clone(&backend.db);
        assert!(!backend.compact().unwrap());
        drop(shared);
    }
}
