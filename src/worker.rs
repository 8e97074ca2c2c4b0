//! # Cooperative Worker
//!
//! Embedding adapter for the cooperative execution model: every submitted
//! request runs [`HttpKernel::handle`] on its own `may` coroutine, so many
//! requests interleave inside one process while the kernel keeps their
//! ambient state apart by [`ContextId`](crate::ids::ContextId).
//!
//! This is not a network driver; a server loop owns sockets and hands each
//! parsed request to [`CoroutineWorker::submit`].
//!
//! ```rust
//! use brrtkernel::kernel::{HttpKernel, RouteTarget};
//! use brrtkernel::server::{Request, Response};
//! use brrtkernel::worker::CoroutineWorker;
//! use http::Method;
//! use std::sync::Arc;
//!
//! let mut kernel = HttpKernel::default();
//! kernel.get("/ping", RouteTarget::from_fn(|| Response::text(200, "pong"))).unwrap();
//!
//! let worker = CoroutineWorker::new(Arc::new(kernel));
//! let handle = worker.submit(Request::new(Method::GET, "/ping")).unwrap();
//! assert_eq!(handle.join().text_body().as_deref(), Some("pong"));
//! ```

use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use may::coroutine::JoinHandle;
use tracing::{debug, error, warn};

use crate::kernel::HttpKernel;
use crate::runtime_config::ExecutionModel;
use crate::server::{Request, Response};

/// Counters shared between the worker and its coroutines.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    in_flight: AtomicUsize,
    completed: AtomicU64,
}

impl WorkerMetrics {
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

pub struct CoroutineWorker {
    kernel: Arc<HttpKernel>,
    stack_size: usize,
    metrics: Arc<WorkerMetrics>,
}

impl CoroutineWorker {
    /// Stack size comes from the kernel's configuration.
    #[must_use]
    pub fn new(kernel: Arc<HttpKernel>) -> Self {
        if kernel.config().execution_model == ExecutionModel::Process {
            warn!(
                "Kernel uses the process execution model; concurrent requests will share the global context slot"
            );
        }
        let stack_size = kernel.config().stack_size;
        Self {
            kernel,
            stack_size,
            metrics: Arc::new(WorkerMetrics::default()),
        }
    }

    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    #[must_use]
    pub fn kernel(&self) -> &Arc<HttpKernel> {
        &self.kernel
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Run `req` on a new coroutine.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if the runtime cannot create the coroutine.
    pub fn submit(&self, req: Request) -> io::Result<ResponseHandle> {
        let kernel = Arc::clone(&self.kernel);
        let metrics = Arc::clone(&self.metrics);
        metrics.in_flight.fetch_add(1, Ordering::Relaxed);

        // SAFETY: the coroutine owns everything it touches, and the kernel keeps
        // per-request state in coroutine-local storage rather than thread-locals.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || {
                    let res = kernel.handle(req);
                    metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
                    metrics.completed.fetch_add(1, Ordering::Relaxed);
                    res
                })
        };

        match spawned {
            Ok(inner) => {
                debug!(stack_size = self.stack_size, "Request coroutine spawned");
                Ok(ResponseHandle { inner })
            }
            Err(e) => {
                self.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
                error!(error = %e, "Failed to spawn request coroutine");
                Err(e)
            }
        }
    }
}

/// Pending response of a submitted request.
pub struct ResponseHandle {
    inner: JoinHandle<Response>,
}

impl ResponseHandle {
    /// Wait for the response. The kernel converts handler panics itself, so a
    /// failed join only happens if the coroutine dies outside the kernel.
    #[must_use]
    pub fn join(self) -> Response {
        match self.inner.join() {
            Ok(res) => res,
            Err(panic) => {
                error!(panic = ?panic, "Request coroutine terminated abnormally");
                Response::error(500, "Server Error")
            }
        }
    }
}
