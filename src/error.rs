//! Failure taxonomy shared by every pipeline stage.
//!
//! Each variant carries its intrinsic HTTP status; the
//! [`ErrorHandler`](crate::error_handler::ErrorHandler) turns any of them into
//! a JSON response at the kernel's single catch boundary.

use http::Method;
use std::collections::BTreeMap;
use std::panic::Location;
use thiserror::Error;

/// Convenience alias used by handlers and interceptors.
pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Error)]
pub enum KernelError {
    /// No route pattern matched the request path (404).
    #[error("No route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// The path matched at least one route, but not for this method (405).
    #[error("Method {method} is not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// Rule evaluation produced field errors (422).
    #[error("The given data was invalid.")]
    ValidationFailed { errors: BTreeMap<String, String> },

    /// Raised by authentication interceptors (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Raised by authorization interceptors (403).
    #[error("{0}")]
    Forbidden(String),

    /// The worker is draining or not yet accepting traffic (503).
    #[error("{0}")]
    ServerNotRunning(String),

    /// Any other domain failure with an explicit status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Misconfigured routes, interceptors, rules or services (500).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A handler returned a value that cannot become a response (500).
    #[error("Unsupported response type: {0}")]
    UnsupportedResponse(String),

    /// Reverse routing failed: unknown name or missing parameter (500).
    #[error("URL generation failed: {0}")]
    UrlGeneration(String),

    /// Anything unrecognised (500). Keeps the raising call site for debug output.
    #[error("{error}")]
    Internal {
        error: anyhow::Error,
        location: &'static Location<'static>,
    },
}

impl KernelError {
    /// Wrap an arbitrary error, recording the caller's location.
    #[track_caller]
    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        KernelError::Internal {
            error: error.into(),
            location: Location::caller(),
        }
    }

    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        KernelError::Http {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        KernelError::Unauthorized("Unauthenticated.".to_string())
    }

    #[must_use]
    pub fn forbidden() -> Self {
        KernelError::Forbidden("This action is unauthorized.".to_string())
    }

    /// Intrinsic HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            KernelError::RouteNotFound { .. } => 404,
            KernelError::MethodNotAllowed { .. } => 405,
            KernelError::ValidationFailed { .. } => 422,
            KernelError::Unauthorized(_) => 401,
            KernelError::Forbidden(_) => 403,
            KernelError::ServerNotRunning(_) => 503,
            KernelError::Http { status, .. } => *status,
            KernelError::Configuration(_)
            | KernelError::UnsupportedResponse(_)
            | KernelError::UrlGeneration(_)
            | KernelError::Internal { .. } => 500,
        }
    }

    /// Stable variant name, reported as `exception` in debug payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::RouteNotFound { .. } => "RouteNotFound",
            KernelError::MethodNotAllowed { .. } => "MethodNotAllowed",
            KernelError::ValidationFailed { .. } => "ValidationFailed",
            KernelError::Unauthorized(_) => "Unauthorized",
            KernelError::Forbidden(_) => "Forbidden",
            KernelError::ServerNotRunning(_) => "ServerNotRunning",
            KernelError::Http { .. } => "HttpError",
            KernelError::Configuration(_) => "ConfigurationError",
            KernelError::UnsupportedResponse(_) => "UnsupportedResponse",
            KernelError::UrlGeneration(_) => "UrlGenerationError",
            KernelError::Internal { .. } => "InternalError",
        }
    }

    /// Domain errors carry a status of their own; everything else is "unrecognised".
    #[must_use]
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            KernelError::Internal { .. }
                | KernelError::Configuration(_)
                | KernelError::UnsupportedResponse(_)
                | KernelError::UrlGeneration(_)
        )
    }

    /// Whether the message is safe to show outside debug mode. Domain
    /// errors qualify, as does `UnsupportedResponse`, which names only a
    /// value kind.
    #[must_use]
    pub fn exposes_message(&self) -> bool {
        self.is_domain() || matches!(self, KernelError::UnsupportedResponse(_))
    }

    #[must_use]
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            KernelError::Internal { location, .. } => Some(location),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for KernelError {
    #[track_caller]
    fn from(error: anyhow::Error) -> Self {
        KernelError::internal(error)
    }
}

impl From<serde_json::Error> for KernelError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        KernelError::internal(error)
    }
}

impl From<std::io::Error> for KernelError {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        KernelError::internal(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        let nf = KernelError::RouteNotFound {
            method: Method::GET,
            path: "/x".into(),
        };
        assert_eq!(nf.status(), 404);
        assert!(nf.is_domain());
        assert_eq!(KernelError::unauthorized().status(), 401);
        assert_eq!(KernelError::forbidden().status(), 403);
        assert_eq!(KernelError::http(418, "teapot").status(), 418);
        assert_eq!(KernelError::ServerNotRunning("down".into()).status(), 503);
    }

    #[test]
    fn test_internal_records_call_site() {
        let err: KernelError = anyhow::anyhow!("boom").into();
        let loc = err.location().expect("location");
        assert!(loc.file().ends_with("error.rs"));
        assert_eq!(err.status(), 500);
        assert!(!err.is_domain());
        assert!(!err.exposes_message());
        assert_eq!(err.to_string(), "boom");
    }
}
