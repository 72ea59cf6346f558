//! LogBackend implementation for redb

use chrono::Utc;
use modlog_core::{Category, ChangeRecord, RecordKey, SiteId, StorageError};
use redb::{ReadableTable, ReadableTableMetadata, TableDefinition, TableHandle};
use tracing::{debug, warn};

use super::tables::{
    RedbBackend, SITES, category_from_table_name, db_err, decode, encode, open_existing,
    order_table_name, records_table_name,
};
use crate::{FacilityCounts, LogBackend};

impl LogBackend for RedbBackend {
    fn insert(
        &self,
        site: &SiteId,
        category: &Category,
        record: &ChangeRecord,
    ) -> Result<RecordKey, StorageError> {
        let records_name = records_table_name(site, category);
        let order_name = order_table_name(site, category);
        let records_def: TableDefinition<i32, &[u8]> = TableDefinition::new(&records_name);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        let write_txn = self.db.begin_write().map_err(db_err)?;

        let key = {
            let mut records = write_txn.open_table(records_def).map_err(db_err)?;
            let mut order = write_txn.open_table(order_def).map_err(db_err)?;

            let existing = records.len().map_err(db_err)?;
            let key = self.keygen.generate(category, existing, |candidate| {
                Ok(records.get(candidate.get()).map_err(db_err)?.is_some())
            })?;

            let seq = match order.last().map_err(db_err)? {
                Some((seq, _)) => seq.value() + 1,
                None => 0,
            };

            let value = encode(seq, record)?;
            records
                .insert(key.get(), value.as_slice())
                .map_err(db_err)?;
            order.insert(seq, key.get()).map_err(db_err)?;
            key
        };

        {
            let mut sites = write_txn.open_table(SITES).map_err(db_err)?;
            if sites.get(site.as_str()).map_err(db_err)?.is_none() {
                sites
                    .insert(site.as_str(), Utc::now().timestamp_millis())
                    .map_err(db_err)?;
                debug!(site = %site, "Registered site");
            }
        }

        write_txn.commit().map_err(db_err)?;

        debug!(site = %site, category = %category, key = %key, uid = %record.uid, "Inserted record");
        Ok(key)
    }

    fn get(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<Option<ChangeRecord>, StorageError> {
        let records_name = records_table_name(site, category);
        let records_def: TableDefinition<i32, &[u8]> = TableDefinition::new(&records_name);

        let read_txn = self.db.begin_read().map_err(db_err)?;
        let Some(records) = open_existing(&read_txn, records_def)? else {
            return Ok(None);
        };

        let record = match records.get(key.get()).map_err(db_err)? {
            Some(value) => Some(decode(value.value())?.record),
            None => None,
        };
        Ok(record)
    }

    fn delete(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<ChangeRecord, StorageError> {
        let records_name = records_table_name(site, category);
        let order_name = order_table_name(site, category);
        let records_def: TableDefinition<i32, &[u8]> = TableDefinition::new(&records_name);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        // Opening a table in a write transaction creates it, so check first.
        // Category tables are never dropped, so the answer cannot go stale.
        {
            let read_txn = self.db.begin_read().map_err(db_err)?;
            if open_existing(&read_txn, records_def)?.is_none() {
                return Err(StorageError::key_not_found(category.as_str(), key));
            }
        }

        let write_txn = self.db.begin_write().map_err(db_err)?;

        let record = {
            let mut records = write_txn.open_table(records_def).map_err(db_err)?;
            let mut order = write_txn.open_table(order_def).map_err(db_err)?;

            let stored = match records.remove(key.get()).map_err(db_err)? {
                Some(value) => decode(value.value())?,
                None => return Err(StorageError::key_not_found(category.as_str(), key)),
            };

            let ordered = order
                .remove(stored.seq)
                .map_err(db_err)?
                .map(|k| k.value());
            if ordered != Some(key.get()) {
                // Dropping the transaction without commit rolls back the record removal
                warn!(
                    site = %site,
                    category = %category,
                    key = %key,
                    seq = stored.seq,
                    "Order entry missing for record"
                );
                return Err(StorageError::key_not_found(category.as_str(), key));
            }
            stored.record
        };

        write_txn.commit().map_err(db_err)?;

        debug!(site = %site, category = %category, key = %key, "Deleted record");
        Ok(record)
    }

    fn keys(&self, site: &SiteId, category: &Category) -> Result<Vec<RecordKey>, StorageError> {
        let order_name = order_table_name(site, category);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        let read_txn = self.db.begin_read().map_err(db_err)?;
        let Some(order) = open_existing(&read_txn, order_def)? else {
            return Ok(Vec::new());
        };

        let mut keys = Vec::with_capacity(order.len().map_err(db_err)? as usize);
        for entry in order.iter().map_err(db_err)?.rev() {
            let (_seq, key) = entry.map_err(db_err)?;
            keys.push(RecordKey::new(key.value()));
        }
        Ok(keys)
    }

    fn contains(
        &self,
        site: &SiteId,
        category: &Category,
        key: RecordKey,
    ) -> Result<bool, StorageError> {
        let records_name = records_table_name(site, category);
        let order_name = order_table_name(site, category);
        let records_def: TableDefinition<i32, &[u8]> = TableDefinition::new(&records_name);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        let read_txn = self.db.begin_read().map_err(db_err)?;
        let Some(order) = open_existing(&read_txn, order_def)? else {
            return Ok(false);
        };
        let records = open_existing(&read_txn, records_def)?;

        // Fast path: the record points at its own order entry
        if let Some(records) = &records
            && let Some(value) = records.get(key.get()).map_err(db_err)?
        {
            let seq = decode(value.value())?.seq;
            if order.get(seq).map_err(db_err)?.map(|k| k.value()) == Some(key.get()) {
                return Ok(true);
            }
        }

        // Membership is defined by the order table alone
        for entry in order.iter().map_err(db_err)? {
            let (_seq, ordered) = entry.map_err(db_err)?;
            if ordered.value() == key.get() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn len(&self, site: &SiteId, category: &Category) -> Result<usize, StorageError> {
        let order_name = order_table_name(site, category);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        let read_txn = self.db.begin_read().map_err(db_err)?;
        let len = match open_existing(&read_txn, order_def)? {
            Some(order) => order.len().map_err(db_err)? as usize,
            None => 0,
        };
        Ok(len)
    }

    fn counts(&self, site: &SiteId, category: &Category) -> Result<FacilityCounts, StorageError> {
        let records_name = records_table_name(site, category);
        let order_name = order_table_name(site, category);
        let records_def: TableDefinition<i32, &[u8]> = TableDefinition::new(&records_name);
        let order_def: TableDefinition<u64, i32> = TableDefinition::new(&order_name);

        // One read transaction, so both counts come from the same snapshot
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let records = match open_existing(&read_txn, records_def)? {
            Some(table) => table.len().map_err(db_err)? as usize,
            None => 0,
        };
        let order = match open_existing(&read_txn, order_def)? {
            Some(table) => table.len().map_err(db_err)? as usize,
            None => 0,
        };
        Ok(FacilityCounts { order, records })
    }

    fn site_exists(&self, site: &SiteId) -> Result<bool, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let exists = match open_existing(&read_txn, SITES)? {
            Some(sites) => sites.get(site.as_str()).map_err(db_err)?.is_some(),
            None => false,
        };
        Ok(exists)
    }

    fn categories(&self, site: &SiteId) -> Result<Vec<Category>, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let mut categories: Vec<Category> = read_txn
            .list_tables()
            .map_err(db_err)?
            .filter_map(|handle| category_from_table_name(site, handle.name()))
            .collect();
        categories.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(categories)
    }
}
