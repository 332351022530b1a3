//! In-process storage backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Storage, StoreError};

/// A [`Storage`] backed by a `HashMap` behind an async read/write lock.
///
/// This is the default backend when a cache is configured without one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        if map.contains_key(key) {
            return Err(StoreError::AlreadyExists);
        }
        map.insert(key.to_owned(), value);
        Ok(())
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        match self.inner.write().await.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
