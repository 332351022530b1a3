//! # rttp-cache
//!
//! Time-bucketed HTTP response caching for the rttp middleware pipeline.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rttp_cache::cache::{CacheMiddleware, CacheOptions};
//! use rttp_cache::context::Context;
//! use rttp_cache::middleware::{Next, RequestTimeMiddleware, from_middleware, handler};
//! use rttp_cache::{Request, Response, StatusCode};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let cache = Arc::new(CacheMiddleware::new(
//!         CacheOptions::new().with_ttl(Duration::from_secs(60)),
//!     ));
//!     let chain = vec![
//!         from_middleware(Arc::new(RequestTimeMiddleware::new())),
//!         from_middleware(cache),
//!         handler(|_ctx| async { Response::new(StatusCode::Ok).body("hello") }),
//!     ];
//!
//!     let (request, _) = Request::parse(b"GET /a?x=1 HTTP/1.1\r\n\r\n").unwrap();
//!     let response = Next::new(chain).run(Context::new(request)).await;
//!     assert_eq!(response.headers().get("X-Gin-Cache-Hit"), Some("MISS"));
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
