//! Stress tests for modlog-storage
//!
//! These tests verify key uniqueness under volume, the order/records
//! invariant under concurrent writers, and pruning that races inserts.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use chrono::{TimeZone, Utc};
use modlog_core::ContentRef;
use modlog_storage::{
    Category, CategoryStore, ChangeRecord, LogBackend, MemoryBackend, ModificationLog,
    RecordKey, RedbBackend, RedbStorageConfig, SiteId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn site() -> SiteId {
    SiteId::new("stress").unwrap()
}

fn record(i: usize) -> ChangeRecord {
    ChangeRecord::new(format!("u{i}"), format!("/stress/doc{i}"), "loader", Utc::now())
}

fn open_redb(dir: &TempDir) -> RedbBackend {
    RedbBackend::open(RedbStorageConfig {
        db_path: dir.path().join("stress.redb"),
        ..Default::default()
    })
    .unwrap()
}

fn assert_unique(keys: &[RecordKey]) {
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len(), "duplicate keys generated");
}

// ============================================================================
// Throughput Tests
// ============================================================================

/// Insert 10,000 records into one category
///
/// Every generated key must be distinct and the order sequence must hold
/// all of them.
#[test]
fn test_key_uniqueness_10k() {
    let backend: Arc<dyn LogBackend> = Arc::new(MemoryBackend::new());
    let store = CategoryStore::new(backend, site(), Category::Modifications);
    let count = 10_000;

    let start = Instant::now();
    let mut keys = Vec::with_capacity(count);
    for i in 0..count {
        keys.push(store.insert(&record(i)).expect("Failed to insert record"));
    }
    let duration = start.elapsed();
    println!(
        "Inserted {} records in {:?} ({:.2} records/sec)",
        count,
        duration,
        count as f64 / duration.as_secs_f64()
    );

    assert_unique(&keys);
    assert_eq!(store.len().unwrap(), count);
    assert!(store.counts().unwrap().is_consistent());

    keys.reverse();
    assert_eq!(store.keys().unwrap(), keys);
}

/// Throughput on the persistent backend, one transaction per insert
#[test]
fn test_redb_insert_throughput() {
    let temp_dir = TempDir::new().unwrap();
    let backend: Arc<dyn LogBackend> = Arc::new(open_redb(&temp_dir));
    let store = CategoryStore::new(backend, site(), Category::Additions);
    let count = 500;

    let start = Instant::now();
    let keys: Vec<_> = (0..count)
        .map(|i| store.insert(&record(i)).expect("Failed to insert record"))
        .collect();
    println!("Inserted {} records into redb in {:?}", count, start.elapsed());

    assert_unique(&keys);
    assert_eq!(store.len().unwrap(), count);
    assert!(store.counts().unwrap().is_consistent());
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Many writers racing on the same category
///
/// Key reservation and insertion are one step, so no key is assigned twice
/// and no record is lost.
#[test]
fn test_concurrent_inserts_same_category() {
    let backend: Arc<dyn LogBackend> = Arc::new(MemoryBackend::new());
    let threads = 8;
    let per_thread = 1_000;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = CategoryStore::new(Arc::clone(&backend), site(), Category::Moves);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|i| store.insert(&record(t * per_thread + i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut keys = Vec::new();
    for handle in handles {
        keys.extend(handle.join().expect("writer panicked"));
    }

    assert_unique(&keys);
    let counts = backend.counts(&site(), &Category::Moves).unwrap();
    assert_eq!(counts.order, threads * per_thread);
    assert!(counts.is_consistent());
}

/// Writers on different categories each see only their own records
#[test]
fn test_concurrent_inserts_across_categories() {
    let backend: Arc<dyn LogBackend> = Arc::new(MemoryBackend::new());
    let per_thread = 2_000;
    let barrier = Arc::new(Barrier::new(Category::FIXED.len()));

    let handles: Vec<_> = Category::FIXED
        .into_iter()
        .map(|category| {
            let store = CategoryStore::new(Arc::clone(&backend), site(), category);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    store.insert(&record(i)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer panicked");
    }

    for category in Category::FIXED {
        let counts = backend.counts(&site(), &category).unwrap();
        assert_eq!(counts.order, per_thread, "{category}");
        assert!(counts.is_consistent(), "{category}");
    }
}

/// Concurrent writers against redb serialize on its single writer
#[test]
fn test_redb_concurrent_inserts() {
    let temp_dir = TempDir::new().unwrap();
    let backend: Arc<dyn LogBackend> = Arc::new(open_redb(&temp_dir));
    let threads = 4;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = CategoryStore::new(Arc::clone(&backend), site(), Category::Deletions);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|i| store.insert(&record(t * per_thread + i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut keys = Vec::new();
    for handle in handles {
        keys.extend(handle.join().expect("writer panicked"));
    }

    assert_unique(&keys);
    let counts = backend.counts(&site(), &Category::Deletions).unwrap();
    assert_eq!(counts.order, threads * per_thread);
    assert!(counts.is_consistent());
}

/// Pruning while another thread keeps inserting
///
/// Records inserted after the prune snapshot are never examined, so every
/// fresh record survives and every old one is gone.
#[test]
fn test_prune_during_inserts() {
    let backend: Arc<dyn LogBackend> = Arc::new(MemoryBackend::new());
    let old = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    let cutoff = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();

    let store = CategoryStore::new(Arc::clone(&backend), site(), Category::Modifications);
    for i in 0..2_000 {
        store
            .insert(&ChangeRecord::new(format!("old{i}"), "/stress/old", "loader", old))
            .unwrap();
    }

    let log = ModificationLog::builder(Arc::clone(&backend), site())
        .build()
        .unwrap();
    let barrier = Arc::new(Barrier::new(2));
    let fresh_count = 1_000;

    let inserter = {
        let barrier = Arc::clone(&barrier);
        let store = store.clone();
        thread::spawn(move || {
            barrier.wait();
            for i in 0..fresh_count {
                store.insert(&record(i)).unwrap();
            }
        })
    };

    barrier.wait();
    let report = log.prune_before(Some("modifications"), cutoff).unwrap();
    inserter.join().expect("inserter panicked");

    assert_eq!(report.total_removed(), 2_000);
    assert!(report.is_complete());

    let counts = store.counts().unwrap();
    assert_eq!(counts.order, fresh_count);
    assert!(counts.is_consistent());
    assert!(
        log.modifications()
            .values()
            .unwrap()
            .all(|r| r.unwrap().timestamp >= cutoff)
    );
}

/// Two threads logging through one shared log
#[test]
fn test_shared_log_across_threads() {
    let log = Arc::new(
        ModificationLog::builder(Arc::new(MemoryBackend::new()), site())
            .build()
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|user| {
            let log = Arc::clone(&log);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..500 {
                    let doc = ContentRef::new(format!("{user}-{i}"), format!("/stress/{user}/{i}"));
                    log.modified(&doc, Some(user), None).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("logger panicked");
    }

    assert_eq!(log.modifications().len().unwrap(), 1_000);
    let alice = modlog_storage::RecordFilter::new().user("alice");
    assert_eq!(log.modifications().limit(Some(&alice), 0).unwrap().count(), 500);
}

// ============================================================================
// Randomized Sequences
// ============================================================================

/// Apply a random insert/delete sequence and compare against a model
fn run_random_sequence(backend: Arc<dyn LogBackend>, steps: usize, seed: u64) {
    let store = CategoryStore::new(backend, site(), Category::Additions);
    let mut rng = StdRng::seed_from_u64(seed);
    // Newest first, like the order sequence
    let mut model: Vec<RecordKey> = Vec::new();

    for step in 0..steps {
        if model.is_empty() || rng.random_bool(0.6) {
            let key = store.insert(&record(step)).unwrap();
            model.insert(0, key);
        } else {
            let index = rng.random_range(0..model.len());
            let key = model.remove(index);
            store.delete(key).unwrap();
            assert!(store.delete(key).is_err());
        }

        let counts = store.counts().unwrap();
        assert!(counts.is_consistent(), "step {step}: {counts:?}");
        assert_eq!(counts.order, model.len(), "step {step}");
    }

    assert_eq!(store.keys().unwrap(), model);
}

#[test]
fn test_random_sequence_memory() {
    for seed in 0..5 {
        run_random_sequence(Arc::new(MemoryBackend::new()), 2_000, seed);
    }
}

#[test]
fn test_random_sequence_redb() {
    let temp_dir = TempDir::new().unwrap();
    run_random_sequence(Arc::new(open_redb(&temp_dir)), 300, 42);
}
