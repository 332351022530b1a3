//! Error types for the storage contract and the cache core.

use thiserror::Error;

/// Errors reported by a [`Storage`](super::Storage) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not present. Lookups treat this as a plain miss.
    #[error("key not found")]
    NotFound,

    /// A first-write-only `set` found the key already present.
    #[error("key already exists")]
    AlreadyExists,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Errors produced by the cache coordinator and entry codec.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored bytes do not decode as a current-schema cache entry.
    #[error("corrupt cache entry: {0}")]
    CorruptEntry(String),

    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
