//! # Request Context
//!
//! Lets code deep in a call graph read "the current request" without having
//! it threaded through every signature.
//!
//! Values are keyed by [`ContextId`], never held in a single global slot: a
//! cooperative worker interleaves many requests on one OS thread, and a
//! shared slot would leak one request's data into another whenever a handler
//! yields. Under the process-per-request model every lookup uses
//! [`ContextId::GLOBAL`] and the table degrades to one entry.
//!
//! ```rust
//! use brrtkernel::context::RequestContext;
//! use brrtkernel::ids::ContextId;
//! use brrtkernel::server::Request;
//! use http::Method;
//!
//! let ctx = RequestContext::new();
//! let id = ContextId::allocate();
//! ctx.set(id, Request::new(Method::GET, "/health"));
//! assert_eq!(ctx.get(id).unwrap().path(), "/health");
//! ctx.clear(id);
//! assert!(ctx.get(id).is_none());
//! ```

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::ids::ContextId;
use crate::server::Request;

static GLOBAL_CONTEXT: Lazy<Arc<RequestContext>> = Lazy::new(|| Arc::new(RequestContext::new()));

/// Map from execution-context id to the request active in that context.
#[derive(Debug, Default)]
pub struct RequestContext {
    slots: DashMap<ContextId, Arc<Request>>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Process-wide instance, shared by kernels that are not given their own.
    #[must_use]
    pub fn global() -> Arc<RequestContext> {
        Arc::clone(&GLOBAL_CONTEXT)
    }

    /// Publish `request` for `ctx`, replacing whatever was there.
    pub fn set(&self, ctx: ContextId, request: impl Into<Arc<Request>>) {
        self.slots.insert(ctx, request.into());
    }

    #[must_use]
    pub fn get(&self, ctx: ContextId) -> Option<Arc<Request>> {
        self.slots.get(&ctx).map(|entry| Arc::clone(entry.value()))
    }

    /// The request published for the context bound to the running coroutine.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Request>> {
        self.get(ContextId::current())
    }

    pub fn clear(&self, ctx: ContextId) {
        self.slots.remove(&ctx);
    }

    /// Number of contexts with a published request (requests in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Ambient lookup against the process-wide context.
#[must_use]
pub fn current_request() -> Option<Arc<Request>> {
    GLOBAL_CONTEXT.current()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_contexts_are_isolated() {
        let ctx = RequestContext::new();
        let a = ContextId::allocate();
        let b = ContextId::allocate();
        ctx.set(a, Request::new(Method::GET, "/a"));
        ctx.set(b, Request::new(Method::GET, "/b"));
        assert_eq!(ctx.get(a).unwrap().path(), "/a");
        assert_eq!(ctx.get(b).unwrap().path(), "/b");
        ctx.clear(a);
        assert!(ctx.get(a).is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_current_follows_binding() {
        let ctx = RequestContext::new();
        let id = ContextId::allocate();
        ctx.set(id, Request::new(Method::POST, "/bound"));
        assert!(ctx.current().is_none());
        let _binding = id.bind();
        assert_eq!(ctx.current().unwrap().path(), "/bound");
    }

    #[test]
    fn test_global_slot_for_process_model() {
        let ctx = RequestContext::new();
        ctx.set(ContextId::GLOBAL, Request::new(Method::GET, "/only"));
        assert_eq!(ctx.current().unwrap().path(), "/only");
        ctx.set(ContextId::GLOBAL, Request::new(Method::GET, "/next"));
        assert_eq!(ctx.len(), 1);
    }
}
