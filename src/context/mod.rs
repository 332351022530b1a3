//! Per-request context — the request plus type-safe extensions.
//!
//! Middleware communicates with later layers by inserting typed values into
//! the context's [`Extensions`]. The cache reads the request's reference time
//! this way (see [`RequestTime`]) instead of consulting the system clock, so
//! every interceptor on one request agrees on "now".

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    time::SystemTime,
};

use crate::Request;

/// Type-erased request extensions map — used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the extensions map, replacing any previous value of the same type
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// The reference instant a request is processed at.
///
/// Inserted by [`RequestTimeMiddleware`](crate::middleware::RequestTimeMiddleware)
/// or directly by the host before the cache runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub SystemTime);

/// Per-request context handed down the middleware chain.
pub struct Context {
    request: Request,
    extensions: Extensions,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the injected reference time, if any layer set one.
    pub fn request_time(&self) -> Option<SystemTime> {
        self.extensions.get::<RequestTime>().map(|t| t.0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn context() -> Context {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        Context::new(req)
    }

    #[test]
    fn extensions_are_keyed_by_type() {
        let mut ext = Extensions::new();
        ext.insert(7u32);
        ext.insert("label");
        assert_eq!(ext.get::<u32>(), Some(&7));
        assert_eq!(ext.get::<&str>(), Some(&"label"));
        assert_eq!(ext.remove::<u32>(), Some(7));
        assert!(ext.get::<u32>().is_none());
    }

    #[test]
    fn request_time_absent_until_injected() {
        let mut ctx = context();
        assert!(ctx.request_time().is_none());

        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(120);
        ctx.extensions_mut().insert(RequestTime(at));
        assert_eq!(ctx.request_time(), Some(at));
    }
}
