use std::time::Instant;

use tracing::{debug, field, info_span};

use super::{Middleware, Next};
use crate::error::KernelResult;
use crate::server::{Request, Response};

/// Global interceptor that wraps the rest of the chain in a `request` span
/// and records the outcome on it.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, req: &Request, next: Next<'_>) -> KernelResult<Response> {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            status = field::Empty,
            latency_ms = field::Empty
        );
        let start = Instant::now();
        let result = span.in_scope(|| next.run(req));
        let latency_ms = start.elapsed().as_millis() as u64;

        span.record("latency_ms", latency_ms);
        match &result {
            Ok(res) => {
                span.record("status", res.status());
                debug!(parent: &span, status = res.status(), latency_ms, "Chain completed");
            }
            Err(err) => {
                span.record("status", err.status());
                debug!(parent: &span, error = %err, latency_ms, "Chain failed");
            }
        }
        result
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
