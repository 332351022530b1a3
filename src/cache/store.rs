//! The storage contract the cache core depends on.

use async_trait::async_trait;

use super::StoreError;

/// A shared key/value capability holding encoded cache entries.
///
/// Backends must be safe for concurrent use; the cache adds no locking of
/// its own and performs no retries, so every error surfaces to the caller
/// exactly once.
///
/// | Operation | Fails with                                 |
/// |-----------|--------------------------------------------|
/// | `get`     | `NotFound` when absent                     |
/// | `set`     | `AlreadyExists` when present (first write wins) |
/// | `update`  | `NotFound` when absent (full replacement)  |
/// | `remove`  | `NotFound` when absent                     |
/// | `keys`    | backend failures only                      |
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Enumerates every key held by the backend, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}
