use brrtkernel::kernel::{HttpKernel, RouteTarget};
use brrtkernel::middleware::{
    after_fn, from_fn, named_fn, Middleware, MiddlewareDecl, MiddlewareManager, Next,
    TracingMiddleware,
};
use brrtkernel::server::{Request, Response};
use brrtkernel::{KernelError, KernelResult};
use http::Method;
use std::sync::{Arc, Mutex};

mod common;
use common::{get, test_tracing};

type Log = Arc<Mutex<Vec<String>>>;

/// Records its label on the way in and on the way out.
struct Recorder {
    label: &'static str,
    log: Log,
}

impl Middleware for Recorder {
    fn handle(&self, req: &Request, next: Next<'_>) -> KernelResult<Response> {
        self.log.lock().unwrap().push(format!("{}:before", self.label));
        let res = next.run(req);
        self.log.lock().unwrap().push(format!("{}:after", self.label));
        res
    }
}

fn recording_kernel(log: &Log) -> HttpKernel {
    let mut kernel = HttpKernel::default();
    kernel.add_global_middleware(Recorder {
        label: "global1",
        log: Arc::clone(log),
    });
    kernel.add_global_middleware(Recorder {
        label: "global2",
        log: Arc::clone(log),
    });
    kernel.register_middleware(
        "route",
        Recorder {
            label: "route",
            log: Arc::clone(log),
        },
    );
    let handler_log = Arc::clone(log);
    kernel
        .get(
            "/ordered",
            RouteTarget::from_fn(move || {
                handler_log.lock().unwrap().push("handler".to_string());
                "done"
            }),
        )
        .unwrap()
        .middleware("route");
    kernel
}

#[test]
fn test_global_runs_before_route_middleware() {
    let _tracing = test_tracing();
    let log: Log = Arc::default();
    let kernel = recording_kernel(&log);

    let res = kernel.handle(get("/ordered"));
    assert_eq!(res.status(), 200);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "global1:before",
            "global2:before",
            "route:before",
            "handler",
            "route:after",
            "global2:after",
            "global1:after",
        ]
    );
}

#[test]
fn test_short_circuit_skips_downstream_but_after_middleware_runs() {
    let log: Log = Arc::default();
    let mut kernel = HttpKernel::default();
    kernel.register_middleware(
        "maintenance",
        from_fn(|_req, _next| Ok(Response::error(503, "Down for maintenance"))),
    );
    kernel.register_middleware(
        "inner",
        Recorder {
            label: "inner",
            log: Arc::clone(&log),
        },
    );
    let handler_log = Arc::clone(&log);
    kernel
        .get(
            "/status",
            RouteTarget::from_fn(move || {
                handler_log.lock().unwrap().push("handler".to_string());
                "up"
            }),
        )
        .unwrap()
        .middleware("maintenance")
        .middleware("inner");
    kernel.add_after_middleware(after_fn(|_req, res| {
        Some(res.clone().with_header("x-after", "seen"))
    }));

    let res = kernel.handle(get("/status"));
    assert_eq!(res.status(), 503);
    assert_eq!(res.header("x-after"), Some("seen"));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_after_middleware_folds_in_registration_order() {
    let mut kernel = HttpKernel::default();
    kernel
        .get("/", RouteTarget::from_fn(|| Response::text(200, "a")))
        .unwrap();
    kernel.add_after_middleware(after_fn(|_req, res| {
        let body = res.text_body().unwrap_or_default();
        Some(res.clone().with_body(format!("{body}b")))
    }));
    kernel.add_after_middleware(after_fn(|_req, _res| None));
    kernel.add_after_middleware(after_fn(|_req, res| {
        let body = res.text_body().unwrap_or_default();
        Some(res.clone().with_body(format!("{body}c")))
    }));

    let res = kernel.handle(get("/"));
    assert_eq!(res.text_body().as_deref(), Some("abc"));
}

#[test]
fn test_named_middleware_receives_bound_arguments() {
    let mut kernel = HttpKernel::default();
    kernel.register_middleware(
        "role",
        named_fn(|req, next, args| {
            let role = req.header("x-role").unwrap_or_default();
            if args.iter().any(|a| a == role) {
                next.run(req)
            } else {
                Err(KernelError::forbidden())
            }
        }),
    );
    kernel
        .get("/admin", RouteTarget::from_fn(|| "welcome"))
        .unwrap()
        .middleware("role:admin,owner");

    let denied = kernel.handle(get("/admin"));
    assert_eq!(denied.status(), 403);

    let allowed = kernel.handle(
        Request::builder(Method::GET, "/admin")
            .header("x-role", "owner")
            .build(),
    );
    assert_eq!(allowed.status(), 200);
}

#[test]
fn test_role_all_guard_requires_every_listed_role() {
    let mut kernel = HttpKernel::default();
    kernel.register_middleware(
        "role_all",
        named_fn(|req, next, args| {
            let held: Vec<&str> = req
                .header("x-roles")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .collect();
            if args.iter().all(|a| held.contains(&a.as_str())) {
                next.run(req)
            } else {
                Err(KernelError::forbidden())
            }
        }),
    );
    kernel
        .get("/publish", RouteTarget::from_fn(|| "published"))
        .unwrap()
        .middleware("role_all:admin|editor");

    let with_roles = |roles: &str| {
        Request::builder(Method::GET, "/publish")
            .header("x-roles", roles)
            .build()
    };
    assert_eq!(kernel.handle(with_roles("editor")).status(), 403);
    assert_eq!(kernel.handle(with_roles("editor, admin")).status(), 200);
}

#[test]
fn test_middleware_can_pass_a_derived_request() {
    let mut kernel = HttpKernel::default();
    kernel.add_global_middleware(from_fn(|req, next| {
        let tagged = Request::builder(req.method().clone(), req.path())
            .header("x-tag", "from-middleware")
            .build()
            .with_route_params(req.route_params().clone());
        next.run(&tagged)
    }));
    kernel
        .get(
            "/tag",
            RouteTarget::from_fn(|req: Request| req.header("x-tag").unwrap_or("none").to_string()),
        )
        .unwrap();

    let res = kernel.handle(get("/tag"));
    assert_eq!(res.text_body().as_deref(), Some("from-middleware"));
}

#[test]
fn test_unregistered_named_middleware_is_configuration_error() {
    let mut kernel = HttpKernel::default();
    kernel
        .get("/x", RouteTarget::from_fn(|| "x"))
        .unwrap()
        .middleware("missing");
    let res = kernel.handle(get("/x"));
    assert_eq!(res.status(), 500);

    let mm = MiddlewareManager::new();
    let Err(err) = mm.resolve_route_middleware(&[MiddlewareDecl::parse("missing")], None) else {
        panic!("an unregistered name must not resolve");
    };
    assert!(matches!(err, KernelError::Configuration(ref m) if m.contains("missing")));
}

#[test]
fn test_declaration_parsing() {
    match MiddlewareDecl::parse("throttle:60, 1") {
        MiddlewareDecl::Named { name, args } => {
            assert_eq!(name, "throttle");
            assert_eq!(args, vec!["60", "1"]);
        }
        other => panic!("unexpected {other:?}"),
    }
    match MiddlewareDecl::parse("role_all:admin|editor") {
        MiddlewareDecl::Named { name, args } => {
            assert_eq!(name, "role_all");
            assert_eq!(args, vec!["admin", "editor"]);
        }
        other => panic!("unexpected {other:?}"),
    }
    match MiddlewareDecl::parse("auth") {
        MiddlewareDecl::Named { name, args } => {
            assert_eq!(name, "auth");
            assert!(args.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_last_named_registration_wins() {
    let mut kernel = HttpKernel::default();
    kernel.register_middleware("gate", from_fn(|_req, _next| Ok(Response::text(200, "first"))));
    kernel.register_middleware("gate", from_fn(|_req, _next| Ok(Response::text(200, "second"))));
    kernel
        .get("/g", RouteTarget::from_fn(|| "handler"))
        .unwrap()
        .middleware("gate");
    assert_eq!(kernel.handle(get("/g")).text_body().as_deref(), Some("second"));
}

#[test]
fn test_inline_declaration_and_tracing_middleware() {
    let _tracing = test_tracing();
    let mut kernel = HttpKernel::default();
    kernel.add_global_middleware(TracingMiddleware);
    kernel
        .get("/inline", RouteTarget::from_fn(|| "handler"))
        .unwrap()
        .middleware(MiddlewareDecl::inline(
            from_fn(|req, next| {
                let res = next.run(req)?;
                Ok(res.with_header("x-inline", "1"))
            })
            .named("inline-stamp"),
        ));
    let res = kernel.handle(get("/inline"));
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("x-inline"), Some("1"));
}
