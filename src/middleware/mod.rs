//! Middleware pipeline — composable before/after request handler logic.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response decoration without coupling handlers to infrastructure
//! concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`handler`] — turns an async closure into a terminal [`MiddlewareHandler`].
//! - [`RequestTimeMiddleware`] — stamps each request with a reference time.
//!
//! The response cache ([`crate::cache::CacheMiddleware`]) is one more layer in
//! this stack.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    Response,
    cache::{Clock, SystemClock},
    context::{Context, RequestTime},
};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware (or returns a fallback `500` response when the chain is exhausted
/// without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use rttp_cache::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// Construct one with [`from_middleware`] or by wrapping a closure directly:
///
/// ```rust,no_run
/// use std::{pin::Pin, sync::Arc};
/// use rttp_cache::{Response, context::Context, middleware::{MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(|ctx: Context, next: Next| {
///     Box::pin(async move { next.run(ctx).await })
/// });
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Arguments
///
/// - `middleware` — a reference-counted [`Middleware`] to wrap.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::middleware::{RequestTimeMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(RequestTimeMiddleware::new()));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Wraps an async closure as the terminal layer of a middleware stack.
///
/// The closure receives the [`Context`] and never sees a [`Next`]; it is the
/// business handler the interceptors sit in front of.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::{Response, StatusCode, middleware::handler};
///
/// let terminal = handler(|_ctx| async { Response::new(StatusCode::Ok).body("hello") });
/// ```
pub fn handler<H, F>(handler: H) -> MiddlewareHandler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |ctx: Context, _next: Next| {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler(ctx).await })
    })
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    ///
    /// # Arguments
    ///
    /// - `middlewares` — the ordered list of handlers that make up the pipeline.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use rttp_cache::middleware::Next;
    ///
    /// let next = Next::new(vec![]);
    /// ```
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains (i.e. the chain is
    /// exhausted without producing a response), a `500 Internal Server Error`
    /// response is returned as a safe fallback.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the per-request [`Context`] to pass to the next middleware.
    ///
    /// # Returns
    ///
    /// The [`Response`] produced by the next middleware or handler in the chain.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all rttp middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited across
///   `.await` points in multi-threaded runtimes.
/// - Implementations **should not** hold `&mut` references to shared state across
///   an `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the per-request [`Context`] carrying the HTTP method, headers,
    ///   path, path parameters, and extensions.
    /// - `next` — cursor into the remainder of the middleware chain; call
    ///   [`Next::run`] to forward the request.
    ///
    /// # Returns
    ///
    /// A [`Response`] — either produced by this middleware directly (short-circuit)
    /// or forwarded from a downstream handler.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Middleware that records the instant a request entered the pipeline.
///
/// Inserts a [`RequestTime`] extension read from its [`Clock`], so that every
/// later layer (the cache in particular) computes freshness against the same
/// reference time. An existing `RequestTime` set by the host is left alone.
pub struct RequestTimeMiddleware {
    clock: Arc<dyn Clock>,
}

impl Default for RequestTimeMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTimeMiddleware {
    /// Stamps requests with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamps requests with a caller-provided clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Middleware for RequestTimeMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        if ctx.request_time().is_none() {
            let now = self.clock.now();
            ctx.extensions_mut().insert(RequestTime(now));
        }
        Box::pin(async move { next.run(ctx).await })
    }
}
