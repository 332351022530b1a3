//! Cache-key derivation from a request's identity.

use std::fmt;

use crate::{Request, http::Headers};

/// Namespace prepended to every derived key so cache entries can share a
/// storage backend with unrelated data.
pub const KEY_PREFIX: &str = "gin:cache:";

/// Request headers folded into the key when the caller configures none.
pub const DEFAULT_KEY_HEADERS: [&str; 5] = [
    "User-Agent",
    "Accept",
    "Accept-Encoding",
    "Accept-Language",
    "Cookie",
];

/// A namespaced, hex-encoded request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds [`CacheKey`]s from the request-target and an allow-list of headers.
///
/// The hashed string is the URI exactly as received followed by, for each
/// allow-listed header present on the request, the header name and its values
/// concatenated with no separator. Values `["a", "b"]` and `["ab"]` therefore
/// produce the same key.
///
/// The method is not part of the key: only `GET` requests ever reach the
/// deriver.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::{KeyDeriver, KEY_PREFIX};
/// use rttp_cache::http::Headers;
///
/// let deriver = KeyDeriver::default();
/// let mut headers = Headers::new();
/// headers.insert("Accept", "text/html");
///
/// let key = deriver.derive("/a?x=1", &headers);
/// assert!(key.as_str().starts_with(KEY_PREFIX));
/// assert_eq!(key, deriver.derive("/a?x=1", &headers));
/// ```
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    headers: Vec<String>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_HEADERS)
    }
}

impl KeyDeriver {
    /// Creates a deriver over the given header allow-list, kept in order.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// The header names folded into every key, in hashing order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Derives the key for a request-target and its headers.
    pub fn derive(&self, uri: &str, request_headers: &Headers) -> CacheKey {
        let mut base = String::with_capacity(uri.len() + 64);
        base.push_str(uri);

        for name in &self.headers {
            if !request_headers.contains(name) {
                continue;
            }
            base.push_str(name);
            for value in request_headers.get_all(name) {
                base.push_str(value);
            }
        }

        let digest = blake3::hash(base.as_bytes()).to_hex();
        CacheKey(format!("{KEY_PREFIX}{digest}"))
    }

    /// Derives the key for a parsed request.
    pub fn derive_for(&self, request: &Request) -> CacheKey {
        self.derive(request.uri(), request.headers())
    }
}
