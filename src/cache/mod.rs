//! Response caching — bucketed expiry over a pluggable key/value store.
//!
//! Idempotent `GET` requests are fingerprinted into a [`CacheKey`]; a fresh
//! stored response is replayed, otherwise the request runs and its response is
//! captured and stored for the next caller.
//!
//! ## Components
//!
//! - [`KeyDeriver`] — builds namespaced keys from the URI and allow-listed headers.
//! - [`ExpiryPolicy`] — aligns deadlines to TTL-wide windows and renders `Cache-Control`.
//! - [`EntryCodec`] — versioned byte encoding of a [`CacheEntry`].
//! - [`Storage`] — the backend contract, with [`MemoryStore`] and [`FileStore`].
//! - [`CacheCoordinator`] — lookup, lazy expiry, capture, and persistence.
//! - [`CacheMiddleware`] — plugs the coordinator into the middleware chain.
//!
//! ## Response headers
//!
//! | Header            | Value                                                      |
//! |-------------------|------------------------------------------------------------|
//! | `Etag`            | the cache key                                              |
//! | `X-Gin-Cache-Hit` | `HIT` or `MISS`                                            |
//! | `Cache-Control`   | `max-age=<secs>, public`, or `max-age=0, no-cache, no-store, must-revalidate` when no window remains |
//!
//! Expiry is passive: entries are never invalidated by writes, only found
//! stale on a later read.

mod config;
mod coordinator;
mod entry;
mod error;
mod expiry;
mod file;
mod key;
mod memory;
mod middleware;
mod store;

pub use config::{CacheConfig, CacheOptions};
pub use coordinator::{
    CACHE_CONTROL_HEADER, CACHE_HIT_HEADER, CacheCoordinator, ETAG_HEADER, Lookup,
};
pub use entry::{CacheEntry, ENTRY_SCHEMA_VERSION, EntryCodec};
pub use error::{CacheError, CacheResult, StoreError};
pub use expiry::{Clock, ExpiryPolicy, FixedClock, NO_CACHE, SystemClock};
pub use file::FileStore;
pub use key::{CacheKey, DEFAULT_KEY_HEADERS, KEY_PREFIX, KeyDeriver};
pub use memory::MemoryStore;
pub use middleware::CacheMiddleware;
pub use store::Storage;
