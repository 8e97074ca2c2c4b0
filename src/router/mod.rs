//! # Router Module
//!
//! Path-template routing with host constraints and reverse URL generation.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling path templates (`/users/{id}`, `/archive/{year?}`) into anchored matchers
//! - Matching `(method, path, host)` to a route, first registration wins
//! - Accumulating the allowed methods of path-only matches so the kernel can
//!   answer 405 instead of 404
//! - Rebuilding literal paths from route names (`url_for`)
//! - Nesting group prefixes (`push_prefix` / `pop_prefix`)
//!
//! ## Example
//!
//! ```rust
//! use brrtkernel::kernel::RouteTarget;
//! use brrtkernel::router::{RouteOptions, Router};
//! use brrtkernel::server::Response;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router
//!     .add_route(
//!         Method::GET,
//!         "/users/{id}",
//!         RouteTarget::from_fn(|| Response::text(200, "ok")),
//!         RouteOptions { name: Some("users.show".into()), ..Default::default() },
//!     )
//!     .unwrap();
//!
//! let outcome = router.match_route(&Method::GET, "/users/42", None);
//! let m = outcome.matched.unwrap();
//! assert_eq!(m.params[0].1, "42");
//! assert_eq!(router.url_for("users.show", [("id", 42)], None).unwrap(), "/users/42");
//! ```
//!
//! ## Performance
//!
//! Matching is a linear scan over compiled regexes in registration order, so
//! the tie-break stays explicit. Parameters are collected into a stack-allocated
//! `ParamVec`.

mod core;
mod host;
mod template;
#[cfg(test)]
mod tests;

pub use self::core::{MatchOutcome, Route, RouteId, RouteMatch, RouteOptions, RouteUpdate, Router};
pub use host::HostConstraint;
pub use template::{PathTemplate, Segment};

use thiserror::Error;

use crate::error::KernelError;

/// Route registration and reverse-routing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid route template '{path}': {reason}")]
    InvalidTemplate { path: String, reason: String },

    #[error("invalid host pattern '{pattern}': {reason}")]
    InvalidHostPattern { pattern: String, reason: String },

    #[error("no route with id {0}")]
    UnknownRoute(usize),

    #[error("no route named '{0}'")]
    UnknownName(String),

    #[error("missing required parameter '{param}' for route '{route}'")]
    MissingParameter { route: String, param: String },
}

impl From<RouteError> for KernelError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnknownName(_) | RouteError::MissingParameter { .. } => {
                KernelError::UrlGeneration(err.to_string())
            }
            other => KernelError::Configuration(other.to_string()),
        }
    }
}
