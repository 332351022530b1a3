//! Cached responses and their byte encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{CacheError, CacheResult};
use crate::{Response, http::Headers};

/// Schema version written into every encoded entry.
pub const ENTRY_SCHEMA_VERSION: u32 = 1;

/// A fully captured response.
///
/// Entries are immutable once written; refreshing one replaces it whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// `None` (or the Unix epoch, a legacy zero value) means the entry never
    /// expires by time.
    pub expire_at: Option<SystemTime>,
}

impl CacheEntry {
    /// Snapshots a completed downstream response.
    pub fn capture(response: &Response, expire_at: Option<SystemTime>) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: response.body_ref().to_vec(),
            expire_at,
        }
    }

    /// Returns `true` when the entry has a deadline at or before `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expire_at {
            Some(at) if at != UNIX_EPOCH => at <= now,
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct EncodedEntryRef<'a> {
    version: u32,
    status: u16,
    headers: &'a Headers,
    body: &'a [u8],
    expire_at: Option<SystemTime>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EncodedEntry {
    version: u32,
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    expire_at: Option<SystemTime>,
}

/// Converts [`CacheEntry`] values to and from the bytes a storage backend holds.
///
/// The encoding is a versioned JSON document. Bytes that are not valid JSON,
/// miss a field, carry an unknown field, or declare another schema version
/// all decode to [`CacheError::CorruptEntry`].
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::{CacheEntry, EntryCodec};
/// use rttp_cache::http::Headers;
///
/// let codec = EntryCodec::new();
/// let entry = CacheEntry { status: 200, headers: Headers::new(), body: b"hi".to_vec(), expire_at: None };
/// let bytes = codec.encode(&entry).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), entry);
/// assert!(codec.decode(b"not json").is_err());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryCodec;

impl EntryCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, entry: &CacheEntry) -> CacheResult<Vec<u8>> {
        let encoded = EncodedEntryRef {
            version: ENTRY_SCHEMA_VERSION,
            status: entry.status,
            headers: &entry.headers,
            body: &entry.body,
            expire_at: entry.expire_at,
        };
        serde_json::to_vec(&encoded).map_err(CacheError::Encode)
    }

    pub fn decode(&self, bytes: &[u8]) -> CacheResult<CacheEntry> {
        let decoded: EncodedEntry = serde_json::from_slice(bytes)
            .map_err(|e| CacheError::CorruptEntry(e.to_string()))?;

        if decoded.version != ENTRY_SCHEMA_VERSION {
            return Err(CacheError::CorruptEntry(format!(
                "schema version {} (expected {ENTRY_SCHEMA_VERSION})",
                decoded.version
            )));
        }

        Ok(CacheEntry {
            status: decoded.status,
            headers: decoded.headers,
            body: decoded.body,
            expire_at: decoded.expire_at,
        })
    }
}
