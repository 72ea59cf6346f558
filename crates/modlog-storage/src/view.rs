//! Read-only changeset views
//!
//! A [`ChangesetView`] enumerates one category in LIFO order (newest
//! first). Enumerations take a snapshot of the key order when they start
//! and resolve each record lazily while iterating; a record deleted after
//! the snapshot is skipped, so an iteration may yield fewer records than
//! `len()` reported.

use std::vec;

use modlog_core::{Category, ChangeRecord, RecordFilter, RecordKey, SiteId, StorageError};

use crate::store::CategoryStore;

/// LIFO-ordered, read-only lens over one category
#[derive(Debug, Clone)]
pub struct ChangesetView {
    store: CategoryStore,
}

impl ChangesetView {
    /// Create a view over a category store
    pub fn new(store: CategoryStore) -> Self {
        Self { store }
    }

    /// The category name this view enumerates
    pub fn name(&self) -> &Category {
        self.store.category()
    }

    /// The site whose log this view reads
    pub fn site(&self) -> &SiteId {
        self.store.site()
    }

    /// Get a record by key
    pub fn get(&self, key: RecordKey) -> Result<Option<ChangeRecord>, StorageError> {
        self.store.get(key)
    }

    /// Get a record by key, falling back to `default`
    pub fn get_or(
        &self,
        key: RecordKey,
        default: ChangeRecord,
    ) -> Result<ChangeRecord, StorageError> {
        Ok(self.store.get(key)?.unwrap_or(default))
    }

    /// Whether the key is in the LIFO order
    pub fn contains(&self, key: RecordKey) -> Result<bool, StorageError> {
        self.store.contains(key)
    }

    /// Number of keys in the LIFO order
    pub fn len(&self) -> Result<usize, StorageError> {
        self.store.len()
    }

    /// Whether the category is empty
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.store.is_empty()
    }

    /// Keys, newest first
    pub fn keys(&self) -> Result<Vec<RecordKey>, StorageError> {
        self.store.keys()
    }

    /// Records, newest first, resolved lazily
    pub fn values(&self) -> Result<Values, StorageError> {
        Ok(Values {
            inner: self.resolver()?,
        })
    }

    /// `(key, record)` pairs, newest first, resolved lazily
    pub fn items(&self) -> Result<Items, StorageError> {
        Ok(Items {
            inner: self.resolver()?,
        })
    }

    /// Filtered, offset enumeration for batching
    ///
    /// Without a filter (or with an empty one) this yields the records of
    /// `keys()[start..]`. With a filter, records are tested with
    /// [`RecordFilter::matches`] and the first `start` matches are skipped.
    /// Either way the order stays newest first. Each call works from a
    /// fresh snapshot of the current order.
    pub fn limit(&self, filter: Option<&RecordFilter>, start: usize) -> Result<Limit, StorageError> {
        Ok(Limit {
            inner: self.limit_items(filter, start)?,
        })
    }

    /// Same as [`limit`](Self::limit), yielding `(key, record)` pairs
    pub fn limit_items(
        &self,
        filter: Option<&RecordFilter>,
        start: usize,
    ) -> Result<LimitItems, StorageError> {
        let filter = filter.filter(|f| !f.is_empty()).cloned();
        let mut keys = self.store.keys()?;

        let skip = match filter {
            Some(_) => start,
            None => {
                keys.drain(..start.min(keys.len()));
                0
            }
        };

        Ok(LimitItems {
            inner: Resolver {
                store: self.store.clone(),
                keys: keys.into_iter(),
            },
            filter,
            skip,
        })
    }

    fn resolver(&self) -> Result<Resolver, StorageError> {
        Ok(Resolver {
            store: self.store.clone(),
            keys: self.store.keys()?.into_iter(),
        })
    }
}

/// Resolves a key snapshot to records, skipping keys deleted since
#[derive(Debug)]
struct Resolver {
    store: CategoryStore,
    keys: vec::IntoIter<RecordKey>,
}

impl Iterator for Resolver {
    type Item = Result<(RecordKey, ChangeRecord), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            match self.store.get(key) {
                Ok(Some(record)) => return Some(Ok((key, record))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

/// Lazy iterator over records, newest first
#[derive(Debug)]
pub struct Values {
    inner: Resolver,
}

impl Iterator for Values {
    type Item = Result<ChangeRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.map(|(_, record)| record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Lazy iterator over `(key, record)` pairs, newest first
#[derive(Debug)]
pub struct Items {
    inner: Resolver,
}

impl Iterator for Items {
    type Item = Result<(RecordKey, ChangeRecord), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Lazy iterator returned by [`ChangesetView::limit_items`]
#[derive(Debug)]
pub struct LimitItems {
    inner: Resolver,
    filter: Option<RecordFilter>,
    /// Matches still to skip before yielding
    skip: usize,
}

impl Iterator for LimitItems {
    type Item = Result<(RecordKey, ChangeRecord), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, record) = match self.inner.next()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            if let Some(filter) = &self.filter
                && !filter.matches(&record)
            {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            return Some(Ok((key, record)));
        }
    }
}

/// Lazy iterator returned by [`ChangesetView::limit`]
#[derive(Debug)]
pub struct Limit {
    inner: LimitItems,
}

impl Iterator for Limit {
    type Item = Result<ChangeRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.map(|(_, record)| record))
    }
}
