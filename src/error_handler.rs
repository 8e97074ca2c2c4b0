//! # Error Handler
//!
//! Maps any [`KernelError`] to a JSON response. Domain failures keep their own
//! status and message, and an unsupported handler return value reports its
//! kind; everything else becomes a 500 with a generic message.
//!
//! Body shape:
//!
//! ```json
//! {"error": "The given data was invalid.", "errors": {"email": "The email field is required."}}
//! {"error": "Method PUT is not allowed for /users/1", "allowed_methods": ["GET", "DELETE"]}
//! ```
//!
//! With `debug` enabled every body also carries `exception`, `message`,
//! `location`, `stage` and, for unrecognised failures, `trace`.

use std::backtrace::BacktraceStatus;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::error::KernelError;
use crate::server::{Request, Response};

/// Message shown for failures that carry no status of their own.
pub const GENERIC_MESSAGE: &str = "Server Error";

/// Application hook consulted before the built-in mapping.
pub type CustomErrorHandler = Arc<dyn Fn(&KernelError, &Request) -> Option<Response> + Send + Sync>;

/// Pipeline stage in which a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Validation,
    Middleware,
    Handler,
    AfterMiddleware,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Routing => "routing",
            Stage::Validation => "validation",
            Stage::Middleware => "middleware",
            Stage::Handler => "handler",
            Stage::AfterMiddleware => "after_middleware",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Default)]
pub struct ErrorHandler {
    debug: bool,
    custom: Option<CustomErrorHandler>,
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("debug", &self.debug)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl ErrorHandler {
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            custom: None,
        }
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Install a hook whose `Some(response)` wins outright over the built-in mapping.
    pub fn set_custom_handler(&mut self, custom: CustomErrorHandler) {
        self.custom = Some(custom);
    }

    /// Produce the response for `err`, raised while in `stage`.
    #[must_use]
    pub fn handle(&self, err: &KernelError, req: &Request, stage: Stage) -> Response {
        let status = err.status();
        if status >= 500 {
            error!(
                method = %req.method(),
                path = %req.path(),
                status,
                stage = %stage,
                exception = err.kind(),
                error = %err,
                "Request failed"
            );
        } else {
            debug!(
                method = %req.method(),
                path = %req.path(),
                status,
                stage = %stage,
                exception = err.kind(),
                error = %err,
                "Request rejected"
            );
        }

        if let Some(custom) = &self.custom {
            if let Some(res) = custom(err, req) {
                return res;
            }
        }

        let mut body = Map::new();
        let message = if err.exposes_message() {
            err.to_string()
        } else {
            GENERIC_MESSAGE.to_string()
        };
        body.insert("error".into(), Value::String(message));

        match err {
            KernelError::ValidationFailed { errors } => {
                body.insert("errors".into(), json!(errors));
            }
            KernelError::MethodNotAllowed { allowed, .. } => {
                let names: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
                body.insert("allowed_methods".into(), json!(names));
            }
            _ => {}
        }

        if self.debug {
            body.insert("exception".into(), Value::String(err.kind().to_string()));
            body.insert("message".into(), Value::String(err.to_string()));
            body.insert(
                "location".into(),
                err.location()
                    .map_or(Value::Null, |l| Value::String(l.to_string())),
            );
            body.insert("stage".into(), Value::String(stage.to_string()));
            if !err.is_domain() {
                body.insert("trace".into(), json!(trace_frames(err)));
            }
        }

        let mut res = Response::json(status, &Value::Object(body));
        if let KernelError::MethodNotAllowed { allowed, .. } = err {
            let allow: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
            res = res.with_header("allow", allow.join(", "));
        }
        res
    }
}

/// Backtrace frames of an internal failure, falling back to the raising
/// location when no backtrace was captured.
fn trace_frames(err: &KernelError) -> Vec<String> {
    if let KernelError::Internal { error, .. } = err {
        let bt = error.backtrace();
        if bt.status() == BacktraceStatus::Captured {
            return bt
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    err.location()
        .map(|l| vec![l.to_string()])
        .unwrap_or_default()
}
