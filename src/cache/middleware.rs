//! The cache as a pipeline interceptor.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, warn};

use super::{CacheCoordinator, CacheOptions, Clock};
use crate::{
    Response,
    context::Context,
    middleware::{Middleware, Next},
};

/// Middleware that serves fresh cached responses and records misses.
///
/// Per request:
///
/// 1. **Ineligible** (any method but `GET`) — passed downstream untouched; no
///    cache headers are added and storage is not consulted.
/// 2. **Hit** — the stored status, headers, and body are replayed with
///    `X-Gin-Cache-Hit: HIT` and a `Cache-Control` for the remaining window.
///    Downstream is skipped unless the cache was built with
///    `do_not_use_abort(true)`, in which case it still runs and its response
///    is discarded.
/// 3. **Miss** — downstream runs; its response gets `Etag`,
///    `X-Gin-Cache-Hit: MISS`, and `Cache-Control`, is captured whole, and is
///    upserted into storage. A failed write is logged and the response is
///    returned unchanged.
///
/// The reference time comes from the request's
/// [`RequestTime`](crate::context::RequestTime) extension, falling back to the
/// configured clock.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheMiddleware, CacheOptions};
/// use rttp_cache::middleware::from_middleware;
///
/// let cache = CacheMiddleware::new(CacheOptions::new().with_ttl(Duration::from_secs(60)));
/// let layer = from_middleware(Arc::new(cache));
/// ```
pub struct CacheMiddleware {
    coordinator: Arc<CacheCoordinator>,
    abort_on_hit: bool,
    clock: Arc<dyn Clock>,
}

impl CacheMiddleware {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            coordinator: Arc::new(CacheCoordinator::from_options(&options)),
            abort_on_hit: options.aborts_on_hit(),
            clock: Arc::clone(options.clock()),
        }
    }

    /// The coordinator, for administrative access to stored entries.
    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let coordinator = Arc::clone(&self.coordinator);
        let abort_on_hit = self.abort_on_hit;
        let clock = Arc::clone(&self.clock);

        Box::pin(async move {
            if !coordinator.is_eligible(ctx.request().method()) {
                debug!(method = %ctx.request().method(), path = %ctx.request().path(), "cache bypass");
                return next.run(ctx).await;
            }

            let key = coordinator.key_for(ctx.request());
            let now = ctx.request_time().unwrap_or_else(|| clock.now());
            let path = ctx.request().path().to_owned();

            let cached = match coordinator.get(key.as_str(), now).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key = %key, path = %path, error = %e, "cache lookup failed, serving fresh");
                    None
                }
            };

            if let Some(entry) = cached {
                match coordinator.hit_response(&entry, now) {
                    Ok(response) => {
                        debug!(key = %key, path = %path, "cache hit");
                        if !abort_on_hit {
                            let _ = next.run(ctx).await;
                        }
                        return response;
                    }
                    Err(e) => {
                        warn!(key = %key, path = %path, error = %e, "unservable cache entry");
                        coordinator.remove_best_effort(key.as_str(), "unservable").await;
                    }
                }
            }

            debug!(key = %key, path = %path, "cache miss");
            let mut response = next.run(ctx).await;
            coordinator.annotate_miss(&mut response, &key, now);

            if let Err(e) = coordinator.persist(key.as_str(), &response, now).await {
                warn!(key = %key, path = %path, error = %e, "failed to store response");
            }

            response
        })
    }
}
