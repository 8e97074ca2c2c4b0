//! # Request / Response value types
//!
//! Transport-agnostic carriers exchanged between a runtime driver and the
//! kernel. Drivers decode the wire format themselves and hand over a
//! [`Request`]; the kernel hands back a [`Response`] whose body is either a
//! fixed byte buffer or a deferred stream producer.

pub mod request;
pub mod response;

pub use request::{
    parse_cookies, parse_method, parse_query_string, HeaderVec, ParamVec, Request, RequestBody,
    RequestBuilder, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
pub use response::{status_reason, Response, ResponseBody, StreamProducer};
