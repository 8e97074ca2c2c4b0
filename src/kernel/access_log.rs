use tracing::info;

use crate::server::{Request, Response};

/// Timing metadata handed to an [`AccessLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfo {
    pub request_id: String,
    pub duration_ms: u64,
}

/// Called once per exchange, after the response is final.
pub trait AccessLogger: Send + Sync {
    fn log(&self, req: &Request, res: &Response, info: &AccessInfo);
}

/// Emits one structured `info` event per exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAccessLogger;

impl AccessLogger for TracingAccessLogger {
    fn log(&self, req: &Request, res: &Response, info: &AccessInfo) {
        info!(
            request_id = %info.request_id,
            method = %req.method(),
            path = %req.path(),
            status = res.status(),
            duration_ms = info.duration_ms,
            "Request completed"
        );
    }
}
