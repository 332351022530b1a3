//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer. The request-target is
/// kept verbatim alongside the split path and query so that cache keys can be
/// built from the URI exactly as the client sent it.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::request::Request;
///
/// let raw = b"GET /hello?name=world&x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_string(), Some("name=world&x=1"));
/// assert_eq!(request.uri(), "/hello?name=world&x=1");
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
        {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.clone(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            match std::str::from_utf8(header.value) {
                Ok(value) => header_map.insert(header.name, value),
                Err(_) => debug!(header = header.name, "dropping header with non-UTF-8 value"),
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                target,
                path,
                version,
                headers: header_map,
                query,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request-target (path plus query string) exactly as received.
    ///
    /// No decoding or parameter re-ordering is applied.
    pub fn uri(&self) -> &str {
        &self.target
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method().as_str(), "GET");
        assert_eq!(req.path(), "/");
        assert_eq!(req.uri(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len()); // no body
    }

    #[test]
    fn uri_keeps_query_order_and_encoding() {
        let raw = b"GET /search?q=a%20b&page=2&q=c HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=a%20b&page=2&q=c"));
        assert_eq!(req.uri(), "/search?q=a%20b&page=2&q=c");
    }

    #[test]
    fn repeated_headers_stay_separate() {
        let raw = b"GET / HTTP/1.1\r\nAccept: text/html\r\nAccept: */*\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        let values: Vec<_> = req.headers().get_all("accept").collect();
        assert_eq!(values, vec!["text/html", "*/*"]);
    }

    #[test]
    fn non_utf8_header_values_are_dropped() {
        let raw = b"GET / HTTP/1.1\r\nCookie: a=\xff\r\nAccept: text/html\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.headers().contains("cookie"));
        assert_eq!(req.headers().get("accept"), Some("text/html"));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn body_follows_headers() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(&raw[body_offset..], b"hello");
        assert_eq!(req.body().as_ref(), b"hello");
    }
}
