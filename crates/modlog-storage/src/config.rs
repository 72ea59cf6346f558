//! Configuration for modlog storage
//!
//! Selects the backend, key generation limits, accepted custom categories,
//! and the default retention used by maintenance jobs. Loaded from TOML:
//!
//! ```toml
//! site = "plone"
//! custom_categories = ["reviews"]
//! retention_days = 90
//!
//! [storage]
//! backend = "redb"
//! db_path = "/var/lib/modlog/plone.redb"
//!
//! [keys]
//! max_attempts = 32
//! ```

use std::path::Path;
use std::sync::Arc;

use modlog_core::{Category, ModlogError, SiteId, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keygen::{KeyGenConfig, KeyGenerator};
use crate::memory::MemoryBackend;
use crate::modlog::ModificationLogBuilder;
use crate::structured::{RedbBackend, RedbStorageConfig};
use crate::LogBackend;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

impl From<ModlogError> for ConfigError {
    fn from(err: ModlogError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Which backend holds the log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackendConfig {
    /// Process-local storage, lost on exit
    Memory,
    /// Persistent redb database
    Redb(RedbStorageConfig),
}

impl Default for StorageBackendConfig {
    fn default() -> Self {
        Self::Redb(RedbStorageConfig::default())
    }
}

/// Top-level modlog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModlogConfig {
    /// Site to log for when the caller doesn't name one
    pub site: Option<String>,
    /// Custom categories accepted besides the fixed four
    pub custom_categories: Vec<String>,
    /// Default age in days for prune jobs that give no bound
    pub retention_days: Option<f64>,
    /// Storage backend
    pub storage: StorageBackendConfig,
    /// Key generation limits
    pub keys: KeyGenConfig,
}

impl ModlogConfig {
    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(site) = &self.site {
            SiteId::new(site.as_str())?;
        }

        for name in &self.custom_categories {
            if Category::from_name(name)?.is_fixed() {
                return Err(ConfigError::Invalid(format!(
                    "'{name}' is a fixed category and cannot be listed as custom"
                )));
            }
        }

        if let Some(days) = self.retention_days
            && (!days.is_finite() || days < 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "retention_days must be a non-negative number, got {days}"
            )));
        }

        if self.keys.max_attempts == 0 {
            return Err(ConfigError::Invalid("keys.max_attempts must be positive".to_string()));
        }

        Ok(())
    }

    /// The configured site, if any
    pub fn site_id(&self) -> Result<Option<SiteId>, ConfigError> {
        Ok(self.site.as_deref().map(SiteId::new).transpose()?)
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Arc<dyn LogBackend>, ConfigError> {
        let keygen = KeyGenerator::new(self.keys);
        let backend: Arc<dyn LogBackend> = match &self.storage {
            StorageBackendConfig::Memory => Arc::new(MemoryBackend::with_keygen(keygen)),
            StorageBackendConfig::Redb(redb) => {
                Arc::new(RedbBackend::open_with_keygen(redb.clone(), keygen)?)
            }
        };
        Ok(backend)
    }

    /// Start a log builder that accepts the configured custom categories
    pub fn log_builder(&self, backend: Arc<dyn LogBackend>, site: SiteId) -> ModificationLogBuilder {
        ModificationLogBuilder::new(backend, site).allow_categories(self.custom_categories.iter().cloned())
    }
}
