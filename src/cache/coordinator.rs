//! Hit/miss decisions and entry persistence over a [`Storage`] backend.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{
    CacheEntry, CacheError, CacheKey, CacheOptions, CacheResult, EntryCodec, ExpiryPolicy,
    KEY_PREFIX, KeyDeriver, Storage, StoreError,
};
use crate::{Method, Request, Response, StatusCode};

/// Response header carrying the cache key.
pub const ETAG_HEADER: &str = "Etag";
/// Response header reporting `HIT` or `MISS`.
pub const CACHE_HIT_HEADER: &str = "X-Gin-Cache-Hit";
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";

/// Outcome of looking a key up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A fresh entry was found.
    Hit(CacheEntry),
    /// Nothing servable: absent, expired, or corrupt.
    Miss,
}

/// Orchestrates key derivation, the entry codec, bucketed expiry, and storage.
///
/// The coordinator holds no per-request state and no per-key locks. Two
/// concurrent misses on one key both run downstream and both write; the last
/// write wins.
pub struct CacheCoordinator {
    store: Arc<dyn Storage>,
    codec: EntryCodec,
    expiry: ExpiryPolicy,
    keys: KeyDeriver,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn Storage>, expiry: ExpiryPolicy, keys: KeyDeriver) -> Self {
        Self {
            store,
            codec: EntryCodec::new(),
            expiry,
            keys,
        }
    }

    pub fn from_options(options: &CacheOptions) -> Self {
        Self::new(
            Arc::clone(options.store()),
            ExpiryPolicy::new(options.ttl()),
            KeyDeriver::new(options.headers().iter().cloned()),
        )
    }

    pub fn expiry(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    pub fn key_deriver(&self) -> &KeyDeriver {
        &self.keys
    }

    /// Only `GET` requests are cached.
    pub fn is_eligible(&self, method: &Method) -> bool {
        *method == Method::Get
    }

    pub fn key_for(&self, request: &Request) -> CacheKey {
        self.keys.derive_for(request)
    }

    /// Reads and decodes the entry under `key`.
    ///
    /// Absent keys yield `Ok(None)`. An entry whose deadline is at or before
    /// `now` is removed (best effort) and also yields `Ok(None)`. A corrupt
    /// entry is removed (best effort) and reported as
    /// [`CacheError::CorruptEntry`]; any other storage failure is returned
    /// unchanged.
    pub async fn get(&self, key: &str, now: SystemTime) -> CacheResult<Option<CacheEntry>> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry = match self.codec.decode(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                self.remove_best_effort(key, "corrupt").await;
                return Err(e);
            }
        };

        if entry.is_expired(now) {
            debug!(key, "cached entry expired");
            self.remove_best_effort(key, "expired").await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Like [`get`](Self::get), but folds every failure into [`Lookup::Miss`].
    ///
    /// Caching is an optimization, so a broken backend degrades to serving
    /// fresh responses rather than failing the request.
    pub async fn lookup(&self, key: &str, now: SystemTime) -> Lookup {
        match self.get(key, now).await {
            Ok(Some(entry)) => Lookup::Hit(entry),
            Ok(None) => Lookup::Miss,
            Err(e) => {
                warn!(key, error = %e, "cache lookup failed, treating as miss");
                Lookup::Miss
            }
        }
    }

    /// Stores `entry` only if `key` is not present yet.
    pub async fn set(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = self.codec.encode(entry)?;
        Ok(self.store.set(key, bytes).await?)
    }

    /// Replaces the entry under an existing `key`.
    pub async fn update(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = self.codec.encode(entry)?;
        Ok(self.store.update(key, bytes).await?)
    }

    /// Stores `entry`, replacing whatever is already under `key`.
    ///
    /// Tries a first-write `set` and falls back to `update` on
    /// `AlreadyExists`. If the key vanishes between the two calls the update
    /// reports `NotFound`; no further attempt is made.
    pub async fn upsert(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = self.codec.encode(entry)?;
        match self.store.set(key, bytes.clone()).await {
            Err(StoreError::AlreadyExists) => Ok(self.store.update(key, bytes).await?),
            other => Ok(other?),
        }
    }

    /// Administrative removal.
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        Ok(self.store.remove(key).await?)
    }

    /// Keys in the backend that belong to the cache namespace.
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut keys = self.store.keys().await?;
        keys.retain(|key| key.starts_with(KEY_PREFIX));
        Ok(keys)
    }

    /// Builds the entry to persist for a completed downstream response.
    pub fn capture(&self, response: &Response, now: SystemTime) -> CacheEntry {
        CacheEntry::capture(response, self.expiry.bucket_boundary(now))
    }

    /// Captures `response` and upserts it under `key`.
    pub async fn persist(&self, key: &str, response: &Response, now: SystemTime) -> CacheResult<()> {
        let entry = self.capture(response, now);
        self.upsert(key, &entry).await
    }

    /// Stamps the miss annotations onto a response on its way out, replacing
    /// any `Etag` or `Cache-Control` the handler set itself.
    pub fn annotate_miss(&self, response: &mut Response, key: &CacheKey, now: SystemTime) {
        response.set_header(ETAG_HEADER, key.as_str());
        response.set_header(CACHE_HIT_HEADER, "MISS");
        response.set_header(CACHE_CONTROL_HEADER, self.expiry.cache_control(now));
    }

    /// Rebuilds a response from a fresh entry and marks it as a hit.
    ///
    /// Fails with [`CacheError::CorruptEntry`] if the stored status code is
    /// not one the response type can carry.
    pub fn hit_response(&self, entry: &CacheEntry, now: SystemTime) -> CacheResult<Response> {
        let status = StatusCode::try_from(entry.status)
            .map_err(|e| CacheError::CorruptEntry(e.to_string()))?;
        let mut response = Response::from_parts(status, entry.headers.clone(), entry.body.clone());
        response.set_header(CACHE_HIT_HEADER, "HIT");
        response.set_header(CACHE_CONTROL_HEADER, self.expiry.cache_control(now));
        Ok(response)
    }

    pub(super) async fn remove_best_effort(&self, key: &str, reason: &'static str) {
        match self.store.remove(key).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => warn!(key, reason, error = %e, "failed to remove cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryStore;
    use crate::http::Headers;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn coordinator(store: Arc<dyn Storage>, ttl: Duration) -> CacheCoordinator {
        CacheCoordinator::new(store, ExpiryPolicy::new(ttl), KeyDeriver::default())
    }

    fn entry(expire_at: Option<SystemTime>) -> CacheEntry {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        CacheEntry {
            status: 200,
            headers,
            body: b"hello".to_vec(),
            expire_at,
        }
    }

    /// A backend whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl Storage for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn update(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_a_hit() {
        let store = Arc::new(MemoryStore::new());
        let cache = coordinator(store, Duration::from_secs(60));
        let stored = entry(Some(at(180)));
        cache.set("gin:cache:k", &stored).await.unwrap();
        assert_eq!(cache.lookup("gin:cache:k", at(150)).await, Lookup::Hit(stored));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_removed() {
        let store = Arc::new(MemoryStore::new());
        let cache = coordinator(store.clone(), Duration::from_secs(60));
        cache.set("gin:cache:k", &entry(Some(at(100)))).await.unwrap();

        assert_eq!(cache.get("gin:cache:k", at(100)).await.unwrap(), None);
        assert!(store.get("gin:cache:k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn entry_without_deadline_never_expires() {
        let store = Arc::new(MemoryStore::new());
        let cache = coordinator(store, Duration::ZERO);
        cache.set("gin:cache:k", &entry(None)).await.unwrap();
        assert!(matches!(
            cache.lookup("gin:cache:k", at(u32::MAX as u64)).await,
            Lookup::Hit(_)
        ));
    }

    #[tokio::test]
    async fn corrupt_entry_is_reported_and_purged() {
        let store = Arc::new(MemoryStore::new());
        store.set("gin:cache:k", b"garbage".to_vec()).await.unwrap();
        let cache = coordinator(store.clone(), Duration::from_secs(60));

        assert!(matches!(
            cache.get("gin:cache:k", at(0)).await,
            Err(CacheError::CorruptEntry(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn backend_failure_propagates_from_get_but_lookup_misses() {
        let cache = coordinator(Arc::new(BrokenStore), Duration::from_secs(60));
        assert!(matches!(
            cache.get("gin:cache:k", at(0)).await,
            Err(CacheError::Store(StoreError::Backend(_)))
        ));
        assert_eq!(cache.lookup("gin:cache:k", at(0)).await, Lookup::Miss);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_entry() {
        let store = Arc::new(MemoryStore::new());
        let cache = coordinator(store, Duration::ZERO);
        cache.upsert("gin:cache:k", &entry(None)).await.unwrap();

        let mut newer = entry(None);
        newer.body = b"newer".to_vec();
        assert!(matches!(
            cache.set("gin:cache:k", &newer).await,
            Err(CacheError::Store(StoreError::AlreadyExists))
        ));
        cache.upsert("gin:cache:k", &newer).await.unwrap();
        assert_eq!(cache.lookup("gin:cache:k", at(0)).await, Lookup::Hit(newer));
    }

    #[tokio::test]
    async fn keys_only_lists_cache_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.set("session:1", Vec::new()).await.unwrap();
        let cache = coordinator(store, Duration::ZERO);
        cache.set("gin:cache:a", &entry(None)).await.unwrap();
        assert_eq!(cache.keys().await.unwrap(), vec!["gin:cache:a"]);

        cache.remove("gin:cache:a").await.unwrap();
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[test]
    fn persisted_deadline_is_bucket_boundary() {
        let cache = coordinator(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let response = Response::new(StatusCode::Ok).body("x");
        assert_eq!(cache.capture(&response, at(125)).expire_at, Some(at(180)));

        let untimed = coordinator(Arc::new(MemoryStore::new()), Duration::ZERO);
        assert_eq!(untimed.capture(&response, at(125)).expire_at, None);
    }

    #[test]
    fn hit_response_replaces_cache_annotations() {
        let cache = coordinator(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let key = cache.key_deriver().derive("/a", &Headers::new());
        let mut miss = Response::new(StatusCode::Ok).body("hello");
        cache.annotate_miss(&mut miss, &key, at(120));
        let stored = cache.capture(&miss, at(120));

        let hit = cache.hit_response(&stored, at(150)).unwrap();
        assert_eq!(hit.headers().get(ETAG_HEADER), Some(key.as_str()));
        let hits: Vec<_> = hit.headers().get_all(CACHE_HIT_HEADER).collect();
        assert_eq!(hits, vec!["HIT"]);
        let controls: Vec<_> = hit.headers().get_all(CACHE_CONTROL_HEADER).collect();
        assert_eq!(controls, vec!["max-age=30, public"]);
        assert_eq!(hit.body_ref(), b"hello");
    }

    #[test]
    fn miss_annotations_replace_handler_cache_headers() {
        let cache = coordinator(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let key = cache.key_deriver().derive("/a", &Headers::new());
        let mut miss = Response::new(StatusCode::Ok)
            .header("Cache-Control", "no-store")
            .header("Etag", "\"v1\"")
            .body("hello");
        cache.annotate_miss(&mut miss, &key, at(150));

        let etags: Vec<_> = miss.headers().get_all(ETAG_HEADER).collect();
        assert_eq!(etags, vec![key.as_str()]);
        let controls: Vec<_> = miss.headers().get_all(CACHE_CONTROL_HEADER).collect();
        assert_eq!(controls, vec!["max-age=30, public"]);

        // A later hit advertises the same policy as the miss did.
        let hit = cache.hit_response(&cache.capture(&miss, at(150)), at(150)).unwrap();
        assert_eq!(hit.headers().get(CACHE_CONTROL_HEADER), Some("max-age=30, public"));
        assert_eq!(hit.headers().get_all(ETAG_HEADER).count(), 1);
    }

    #[test]
    fn unknown_stored_status_is_corrupt() {
        let cache = coordinator(Arc::new(MemoryStore::new()), Duration::ZERO);
        let mut odd = entry(None);
        odd.status = 299;
        assert!(matches!(
            cache.hit_response(&odd, at(0)),
            Err(CacheError::CorruptEntry(_))
        ));
    }
}
