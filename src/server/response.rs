use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use super::request::HeaderVec;

/// Deferred body producer. The driver hands it a sink once headers are out.
pub type StreamProducer = Arc<dyn Fn(&mut dyn Write) -> io::Result<()> + Send + Sync>;

/// Response payload: fixed bytes or a stream producer, never both.
#[derive(Clone)]
pub enum ResponseBody {
    Bytes(Vec<u8>),
    Stream(StreamProducer),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Outbound response value.
///
/// Built through the named constructors and the `with_*` copy-with-mutation
/// methods; once handed to a caller it is never mutated in place.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderVec,
    body: ResponseBody,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Bytes(body),
        }
    }

    /// JSON response from anything serialisable.
    ///
    /// Serialisation of `serde_json::Value` cannot fail; for other types a
    /// failure degrades to a 500 error body rather than a panic.
    #[must_use]
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::with_content_type(status, "application/json", bytes),
            Err(e) => Self::error(500, &format!("Failed to serialize response: {e}")),
        }
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, "text/plain; charset=utf-8", body.into().into_bytes())
    }

    #[must_use]
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, "text/html; charset=utf-8", body.into().into_bytes())
    }

    /// 204 with no body.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(204, HeaderVec::new(), Vec::new())
    }

    /// 302 redirect unless another 3xx status is given.
    #[must_use]
    pub fn redirect(location: &str, status: Option<u16>) -> Self {
        Self::new(status.unwrap_or(302), HeaderVec::new(), Vec::new())
            .with_header("location", location)
    }

    /// `{"error": message}` with the given status
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    #[must_use]
    pub fn stream(status: u16, content_type: &str, producer: StreamProducer) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: ResponseBody::Stream(producer),
        }
        .with_header("content-type", content_type)
    }

    fn with_content_type(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), content_type.to_string()));
        Self::new(status, headers, body)
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Fixed body bytes; `None` for streamed responses.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Bytes(b) => Some(b),
            ResponseBody::Stream(_) => None,
        }
    }

    /// Decode a fixed JSON body.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        self.body_bytes()
            .and_then(|b| serde_json::from_slice(b).ok())
    }

    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        self.body_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self.body, ResponseBody::Stream(_))
    }

    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy with a header set, replacing any existing value of that name.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Copy with a fixed body, dropping any stream producer.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = ResponseBody::Bytes(body.into());
        self
    }

    /// Emit the body into `sink`, driving the producer for streamed responses.
    pub fn write_body(&self, sink: &mut dyn Write) -> io::Result<()> {
        match &self.body {
            ResponseBody::Bytes(b) => sink.write_all(b),
            ResponseBody::Stream(producer) => producer(sink),
        }
    }
}

/// Canonical reason phrase, used by drivers and access logs.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}
