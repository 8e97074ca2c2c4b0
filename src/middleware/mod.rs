//! # Middleware Module
//!
//! Interceptor composition: global interceptors, named interceptors with
//! arguments, per-route declarations and post-response interceptors.
//!
//! Every interceptor is normalised to one shape, `(request, next) -> response`.
//! Named interceptors receive their declaration arguments through a wrapping
//! [`BoundMiddleware`], so no arity inspection happens at dispatch time.
//!
//! ```rust
//! use brrtkernel::middleware::{from_fn, MiddlewareDecl, MiddlewareManager};
//! use brrtkernel::server::Response;
//! use std::sync::Arc;
//!
//! let mut mm = MiddlewareManager::new();
//! mm.register_named(
//!     "maintenance",
//!     Arc::new(from_fn(|_req, _next| Ok(Response::error(503, "Down for maintenance")))),
//! );
//! let chain = mm
//!     .resolve_route_middleware(&[MiddlewareDecl::parse("maintenance")], None)
//!     .unwrap();
//! assert_eq!(chain.len(), 1);
//! ```

mod core;
mod manager;
mod tracing;

pub use self::core::{
    after_fn, from_fn, named_fn, AfterMiddleware, BoundMiddleware, Endpoint, FnAfterMiddleware,
    FnMiddleware, FnNamedMiddleware, Middleware, MiddlewareDecl, NamedMiddleware, Next,
};
pub use self::manager::{ClassResolver, MiddlewareManager};
pub use self::tracing::TracingMiddleware;
