#![allow(dead_code)]

use brrtkernel::kernel::{AccessInfo, AccessLogger, HttpKernel, Param, RouteTarget};
use brrtkernel::server::{Request, Response};
use brrtkernel::validator::{RuleSet, ValidationTarget};
use http::Method;
use serde_json::{json, Value};
use std::sync::Mutex;

/// Route events to the test harness output for the lifetime of the guard.
pub fn test_tracing() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

pub fn get(path: &str) -> Request {
    Request::new(Method::GET, path)
}

pub fn json_request(method: Method, path: &str, body: Value) -> Request {
    Request::builder(method, path)
        .header("content-type", "application/json")
        .json(body)
        .build()
}

/// Kernel with the small user API most integration tests exercise.
pub fn user_kernel() -> HttpKernel {
    let mut kernel = HttpKernel::default();
    kernel
        .get(
            "/users/{id}",
            RouteTarget::from_fn(|Param(id): Param<String>| json!({ "id": id })),
        )
        .unwrap()
        .name("users.show");
    kernel
        .delete("/users/{id}", RouteTarget::from_fn(|| ()))
        .unwrap()
        .name("users.destroy");
    kernel
        .post(
            "/register",
            RouteTarget::from_fn(|| Response::json(201, &json!({ "registered": true }))),
        )
        .unwrap()
        .name("register")
        .validate(
            RuleSet::new().field("email", "required|email"),
            ValidationTarget::Body,
        );
    kernel
}

/// Access logger that keeps every entry for later assertions.
#[derive(Default)]
pub struct RecordingLogger {
    pub entries: Mutex<Vec<(String, u16, AccessInfo)>>,
}

impl AccessLogger for RecordingLogger {
    fn log(&self, req: &Request, res: &Response, info: &AccessInfo) {
        self.entries
            .lock()
            .unwrap()
            .push((req.path().to_string(), res.status(), info.clone()));
    }
}
