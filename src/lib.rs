//! # brrtkernel
//!
//! **brrtkernel** is an embeddable HTTP request-dispatch kernel for the `may`
//! coroutine runtime. Given a request, it resolves a route, runs validation
//! and interceptors, invokes the handler, and turns the result (or any
//! failure) into a response.
//!
//! ## Overview
//!
//! The kernel is transport-agnostic. A runtime driver parses the wire format,
//! builds a [`server::Request`], calls [`HttpKernel::handle`] and writes the
//! returned [`server::Response`]. The same call serves two execution models:
//!
//! - **process**: one request per process; ambient state uses a single slot.
//! - **cooperative**: many requests interleaved on coroutines in one process;
//!   every piece of per-request state is keyed by a [`ids::ContextId`].
//!
//! ## Architecture
//!
//! - **[`server`]** - Request and response value types
//! - **[`context`]** - The "current request" table, keyed by execution context
//! - **[`router`]** - Path templates, host constraints, reverse routing
//! - **[`middleware`]** - Global, named and after interceptors
//! - **[`validator`]** - Declarative field validation
//! - **[`error`]** / **[`error_handler`]** - Failure taxonomy and its JSON mapping
//! - **[`container`]** - Request-scoped dependency resolution
//! - **[`kernel`]** - The pipeline itself
//! - **[`worker`]** - Runs each request on its own coroutine
//! - **[`runtime_config`]** / **[`logging`]** - Configuration and tracing setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Driver as Runtime driver
//!     participant Kernel as HttpKernel
//!     participant Router
//!     participant Validator
//!     participant Chain as Middleware chain
//!     participant Handler
//!     participant Errors as ErrorHandler
//!
//!     Driver->>Kernel: handle(Request)
//!     Kernel->>Kernel: begin resolver scope, publish context
//!     Kernel->>Router: match_route(method, path, host)
//!     alt no match
//!         Router-->>Kernel: allowed methods
//!         Kernel->>Errors: 404 / 405
//!     end
//!     Kernel->>Validator: rules (body / query / params)
//!     alt invalid
//!         Kernel->>Errors: 422
//!     end
//!     Kernel->>Chain: global ++ route interceptors
//!     Chain->>Handler: next.run(req)
//!     Handler-->>Chain: reply
//!     Chain-->>Kernel: response
//!     Kernel->>Kernel: after interceptors
//!     Kernel->>Kernel: clear context, end scope, stamp request id
//!     Kernel-->>Driver: Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtkernel::kernel::{HttpKernel, Param, RouteTarget};
//! use brrtkernel::middleware::from_fn;
//! use brrtkernel::server::Request;
//! use brrtkernel::KernelError;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut kernel = HttpKernel::default();
//! kernel.register_middleware(
//!     "auth",
//!     from_fn(|req, next| match req.header("authorization") {
//!         Some(_) => next.run(req),
//!         None => Err(KernelError::unauthorized()),
//!     }),
//! );
//! kernel
//!     .get("/me/{id}", RouteTarget::from_fn(|Param(id): Param<u64>| json!({ "id": id })))
//!     .unwrap()
//!     .middleware("auth");
//!
//! let denied = kernel.handle(Request::new(Method::GET, "/me/7"));
//! assert_eq!(denied.status(), 401);
//!
//! let ok = kernel.handle(
//!     Request::builder(Method::GET, "/me/7")
//!         .header("Authorization", "Bearer t")
//!         .build(),
//! );
//! assert_eq!(ok.json_body().unwrap()["id"], 7);
//! assert!(ok.header("x-request-id").is_some());
//! ```
//!
//! ## Runtime Considerations
//!
//! brrtkernel uses the `may` coroutine runtime, not tokio. The kernel itself
//! never blocks or yields; handlers and interceptors may. Coroutine stack size
//! is configurable via `BRRTK_STACK_SIZE`.

pub mod container;
pub mod context;
pub mod error;
pub mod error_handler;
pub mod ids;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod validator;
pub mod worker;

pub use error::{KernelError, KernelResult};
pub use kernel::{HttpKernel, RouteTarget};
pub use router::Router;
pub use runtime_config::{ExecutionModel, KernelConfig};
