//! Configuration for the response cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{Clock, DEFAULT_KEY_HEADERS, MemoryStore, Storage, SystemClock};

/// Runtime options for a [`CacheMiddleware`](super::CacheMiddleware).
///
/// The defaults are:
///
/// | Setting          | Default value                                         |
/// |------------------|-------------------------------------------------------|
/// | Store            | a fresh [`MemoryStore`]                               |
/// | TTL              | `0` (no bucketed expiry, `no-cache` advertised)        |
/// | Key headers      | `User-Agent`, `Accept`, `Accept-Encoding`, `Accept-Language`, `Cookie` |
/// | Abort on hit     | yes                                                   |
/// | Clock            | [`SystemClock`], used when no request time is injected |
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheOptions, MemoryStore};
///
/// let options = CacheOptions::new()
///     .with_store(Arc::new(MemoryStore::new()))
///     .with_ttl(Duration::from_secs(60))
///     .with_headers(["Accept", "Accept-Language"]);
/// assert_eq!(options.headers().len(), 2);
/// assert!(options.aborts_on_hit());
/// ```
#[derive(Clone)]
pub struct CacheOptions {
    store: Arc<dyn Storage>,
    ttl: Duration,
    headers: Vec<String>,
    do_not_use_abort: bool,
    clock: Arc<dyn Clock>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("ttl", &self.ttl)
            .field("headers", &self.headers)
            .field("do_not_use_abort", &self.do_not_use_abort)
            .finish_non_exhaustive()
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            ttl: Duration::ZERO,
            headers: DEFAULT_KEY_HEADERS.iter().map(|h| h.to_string()).collect(),
            do_not_use_abort: false,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Storage>) -> Self {
        self.store = store;
        self
    }

    /// Sets the bucket width. `Duration::ZERO` disables time-based expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replaces the header allow-list used for key derivation.
    #[must_use]
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// When `true`, a hit pre-fills the response but downstream handlers still run.
    #[must_use]
    pub fn do_not_use_abort(mut self, do_not_use_abort: bool) -> Self {
        self.do_not_use_abort = do_not_use_abort;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn aborts_on_hit(&self) -> bool {
        !self.do_not_use_abort
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Plain-data cache settings as a host would load them from a config file.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheConfig, MemoryStore};
///
/// let config: CacheConfig = serde_json::from_str(r#"{ "ttl_secs": 30 }"#).unwrap();
/// let options = config.into_options(Arc::new(MemoryStore::new()));
/// assert_eq!(options.ttl(), Duration::from_secs(30));
/// assert_eq!(options.headers().len(), 5);
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// `None` keeps the default allow-list; an empty list keys on the URI alone.
    pub headers: Option<Vec<String>>,
    pub do_not_use_abort: bool,
}

impl CacheConfig {
    pub fn into_options(self, store: Arc<dyn Storage>) -> CacheOptions {
        let options = CacheOptions::new()
            .with_store(store)
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .do_not_use_abort(self.do_not_use_abort);
        match self.headers {
            Some(headers) => options.with_headers(headers),
            None => options,
        }
    }
}
