//! Persistent storage using redb
//!
//! Each category of each site is a pair of redb tables: records keyed by
//! their random key, and an order table keyed by a monotonically growing
//! sequence number. Both are mutated in a single write transaction.

mod backend;
mod tables;

pub use tables::{RedbBackend, RedbStorageConfig, SITES, order_table_name, records_table_name};
