//! # Kernel Module
//!
//! [`HttpKernel`] ties the router, interceptors, validator, error handler,
//! request context and dependency resolver into one call,
//! `handle(Request) -> Response`, used by every runtime driver.
//!
//! ## Pipeline
//!
//! ```text
//! routing → [validation] → middleware chain → handler → after middleware → response
//!     └──────────── any error or panic ────────────→ ErrorHandler ──┘
//! ```
//!
//! Per request the kernel opens a resolver scope, publishes the request in
//! the [`RequestContext`](crate::context::RequestContext) under the current
//! [`ContextId`](crate::ids::ContextId), and tears both down on every exit
//! path. The response is stamped with the request id and passed to the
//! access logger, if any.
//!
//! ## Example
//!
//! ```rust
//! use brrtkernel::kernel::{HttpKernel, Param, RouteTarget};
//! use brrtkernel::server::Request;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut kernel = HttpKernel::default();
//! kernel
//!     .get(
//!         "/users/{id}",
//!         RouteTarget::from_fn(|Param(id): Param<String>| json!({ "id": id })),
//!     )
//!     .unwrap()
//!     .name("users.show");
//!
//! let res = kernel.handle(Request::new(Method::GET, "/users/42"));
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.json_body().unwrap()["id"], "42");
//! assert_eq!(kernel.url_for("users.show", [("id", 42)], None).unwrap(), "/users/42");
//! ```

mod access_log;
mod builder;
mod core;
mod handler;

pub use self::access_log::{AccessInfo, AccessLogger, TracingAccessLogger};
pub use self::builder::RouteBuilder;
pub use self::core::HttpKernel;
pub use self::handler::{
    Controller, ErasedHandler, FromRequest, Handler, HandlerContext, Inject, IntoReply, Json,
    Param, Params, Query, RouteTarget,
};
