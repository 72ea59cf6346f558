//! Error types for modlog

use thiserror::Error;

use crate::record::RecordKey;

/// Top-level error type for modification logging
#[derive(Debug, Error)]
pub enum ModlogError {
    /// Caller supplied an unusable argument (bad prune bounds, unknown category)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The content entity has no resolvable UID or path
    #[error("Entity cannot be identified: {0}")]
    EntityUnidentifiable(String),

    /// No user was supplied and none could be resolved
    #[error("No acting user supplied or resolvable")]
    NoActor,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ModlogError {
    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new EntityUnidentifiable error
    pub fn unidentifiable(message: impl Into<String>) -> Self {
        Self::EntityUnidentifiable(message.into())
    }

    /// Whether this error reports a missing record key
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::KeyNotFound { .. }))
    }
}

/// Errors raised by category storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Lookup or deletion of a key absent from the category
    #[error("Key {key} not found in category '{category}'")]
    KeyNotFound { category: String, key: RecordKey },

    /// Key generation gave up, either after too many collisions or because
    /// the category is close to saturating the key space
    #[error("Key space exhausted in category '{category}' after {attempts} attempts")]
    KeyExhaustion { category: String, attempts: u32 },
}

impl StorageError {
    /// Create a new KeyNotFound error
    pub fn key_not_found(category: impl Into<String>, key: RecordKey) -> Self {
        Self::KeyNotFound {
            category: category.into(),
            key,
        }
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
