//! Collision-free random key generation
//!
//! Keys are drawn uniformly from the full `i32` range and re-drawn while
//! they collide with a key already present in the category. The collision
//! probe is supplied by the caller so it runs inside the caller's critical
//! section (a write lock or a write transaction); reserving the key and
//! inserting the record are then a single atomic step.

use modlog_core::{Category, RecordKey, StorageError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default number of draws before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

/// Default category size at which generation refuses to draw (half the key space)
pub const DEFAULT_MAX_KEYS: u64 = 1 << 31;

/// Limits applied by a [`KeyGenerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyGenConfig {
    /// Maximum draws per key before failing with `KeyExhaustion`
    pub max_attempts: u32,
    /// Category size at which generation fails fast with `KeyExhaustion`
    pub max_keys: u64,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

enum KeySource {
    Thread,
    Seeded(Mutex<StdRng>),
}

/// Generates record keys that do not collide within a category
pub struct KeyGenerator {
    config: KeyGenConfig,
    source: KeySource,
}

impl std::fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("config", &self.config)
            .field("seeded", &matches!(self.source, KeySource::Seeded(_)))
            .finish()
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(KeyGenConfig::default())
    }
}

impl KeyGenerator {
    /// Create a generator drawing from the thread-local RNG
    pub fn new(config: KeyGenConfig) -> Self {
        Self {
            config: sanitize(config),
            source: KeySource::Thread,
        }
    }

    /// Create a generator with a reproducible draw sequence
    pub fn seeded(config: KeyGenConfig, seed: u64) -> Self {
        Self {
            config: sanitize(config),
            source: KeySource::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Get the configured limits
    pub fn config(&self) -> KeyGenConfig {
        self.config
    }

    /// Generate a key not yet used in `category`
    ///
    /// `existing` is the current number of keys in the category and
    /// `is_taken` reports whether a candidate is already in use. An empty
    /// category accepts the first draw without probing.
    ///
    /// # Errors
    ///
    /// Returns `KeyExhaustion` when the category holds `max_keys` or more
    /// keys, or when `max_attempts` draws all collided. Probe errors are
    /// passed through.
    pub fn generate<F>(
        &self,
        category: &Category,
        existing: u64,
        mut is_taken: F,
    ) -> Result<RecordKey, StorageError>
    where
        F: FnMut(RecordKey) -> Result<bool, StorageError>,
    {
        if existing >= self.config.max_keys {
            return Err(StorageError::KeyExhaustion {
                category: category.to_string(),
                attempts: 0,
            });
        }

        if existing == 0 {
            return Ok(self.draw());
        }

        for attempt in 1..=self.config.max_attempts {
            let key = self.draw();
            if !is_taken(key)? {
                return Ok(key);
            }
            trace!(category = %category, attempt, key = %key, "Key collision, redrawing");
        }

        Err(StorageError::KeyExhaustion {
            category: category.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    fn draw(&self) -> RecordKey {
        let raw = match &self.source {
            KeySource::Thread => rand::rng().random_range(i32::MIN..=i32::MAX),
            KeySource::Seeded(rng) => rng.lock().random_range(i32::MIN..=i32::MAX),
        };
        RecordKey::new(raw)
    }
}

fn sanitize(config: KeyGenConfig) -> KeyGenConfig {
    KeyGenConfig {
        max_attempts: config.max_attempts.max(1),
        ..config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_category_takes_first_draw() {
        let keygen = KeyGenerator::default();
        let mut probes = 0;
        keygen
            .generate(&Category::Additions, 0, |_| {
                probes += 1;
                Ok(true)
            })
            .unwrap();
        assert_eq!(probes, 0);
    }

    #[test]
    fn test_redraws_on_collision() {
        let keygen = KeyGenerator::seeded(KeyGenConfig::default(), 7);
        let mut probes = 0;
        let key = keygen
            .generate(&Category::Moves, 10, |_| {
                probes += 1;
                Ok(probes < 3)
            })
            .unwrap();
        assert_eq!(probes, 3);

        // Same seed replays the same draws
        let replay = KeyGenerator::seeded(KeyGenConfig::default(), 7);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(replay.draw());
        }
        assert_eq!(seen[2], key);
    }

    #[test]
    fn test_bounded_retries() {
        let config = KeyGenConfig {
            max_attempts: 5,
            ..Default::default()
        };
        let keygen = KeyGenerator::new(config);
        let mut probes = 0;
        let err = keygen
            .generate(&Category::Deletions, 1, |_| {
                probes += 1;
                Ok(true)
            })
            .unwrap_err();
        assert_eq!(probes, 5);
        assert!(matches!(
            err,
            StorageError::KeyExhaustion { attempts: 5, .. }
        ));
    }

    #[test]
    fn test_saturation_fails_fast() {
        let config = KeyGenConfig {
            max_keys: 100,
            ..Default::default()
        };
        let keygen = KeyGenerator::new(config);
        let err = keygen
            .generate(&Category::Modifications, 100, |_| Ok(false))
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::KeyExhaustion { attempts: 0, .. }
        ));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let config = KeyGenConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let keygen = KeyGenerator::new(config);
        assert_eq!(keygen.config().max_attempts, 1);
        assert!(keygen.generate(&Category::Moves, 1, |_| Ok(false)).is_ok());
    }

    #[test]
    fn test_probe_errors_propagate() {
        let keygen = KeyGenerator::default();
        let err = keygen
            .generate(&Category::Moves, 1, |_| Err(StorageError::database("boom")))
            .unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_uniqueness_against_growing_set() {
        let keygen = KeyGenerator::seeded(KeyGenConfig::default(), 42);
        let mut keys = HashSet::new();
        for _ in 0..10_000 {
            let key = keygen
                .generate(&Category::Additions, keys.len() as u64, |k| Ok(keys.contains(&k)))
                .unwrap();
            assert!(keys.insert(key));
        }
        assert_eq!(keys.len(), 10_000);
    }
}
