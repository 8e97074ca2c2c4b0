use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use http::Method;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::access_log::{AccessInfo, AccessLogger};
use super::builder::RouteBuilder;
use super::handler::{Controller, HandlerContext, RouteTarget};
use crate::container::Resolver;
use crate::context::RequestContext;
use crate::error::{KernelError, KernelResult};
use crate::error_handler::{ErrorHandler, Stage};
use crate::ids::{ContextId, RequestId};
use crate::middleware::{AfterMiddleware, Middleware, MiddlewareManager, NamedMiddleware, Next};
use crate::router::{Route, RouteOptions, Router};
use crate::runtime_config::{ExecutionModel, KernelConfig};
use crate::server::{Request, RequestBody, Response};
use crate::validator::{self, ValidationTarget};

/// The dispatch kernel: `handle(Request) -> Response`.
///
/// Registration methods take `&mut self` and must all run before the kernel
/// is shared; after that, `handle` only reads the route table and the
/// interceptor registries and may be called from any number of coroutines.
pub struct HttpKernel {
    config: KernelConfig,
    router: Router,
    middleware: MiddlewareManager,
    error_handler: ErrorHandler,
    context: Arc<RequestContext>,
    resolver: Option<Arc<dyn Resolver>>,
    access_logger: Option<Arc<dyn AccessLogger>>,
    accepting: AtomicBool,
}

impl Default for HttpKernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl HttpKernel {
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        let error_handler = ErrorHandler::new(config.debug);
        Self {
            config,
            router: Router::new(),
            middleware: MiddlewareManager::new(),
            error_handler,
            context: RequestContext::global(),
            resolver: None,
            access_logger: None,
            accepting: AtomicBool::new(true),
        }
    }

    /// Publish into `context` instead of the process-wide table that
    /// [`current_request`](crate::context::current_request) reads.
    #[must_use]
    pub fn with_context(mut self, context: Arc<RequestContext>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    #[must_use]
    pub fn middleware(&self) -> &MiddlewareManager {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareManager {
        &mut self.middleware
    }

    pub fn error_handler_mut(&mut self) -> &mut ErrorHandler {
        &mut self.error_handler
    }

    pub fn set_resolver(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolver = Some(resolver);
    }

    pub fn set_access_logger(&mut self, logger: Arc<dyn AccessLogger>) {
        self.access_logger = Some(logger);
    }

    /// While `false`, every request fails with 503 through the error path.
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
        info!(accepting, "Kernel admission changed");
    }

    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn add_global_middleware(&mut self, mw: impl Middleware + 'static) {
        self.middleware.add_global_middleware(Arc::new(mw));
    }

    pub fn add_after_middleware(&mut self, mw: impl AfterMiddleware + 'static) {
        self.middleware.add_after_middleware(Arc::new(mw));
    }

    pub fn register_middleware(&mut self, name: &str, mw: impl NamedMiddleware + 'static) {
        self.middleware.register_named(name, Arc::new(mw));
    }

    /// Register a route and return a builder for its optional settings.
    ///
    /// # Errors
    ///
    /// [`KernelError::Configuration`] when the path template is malformed.
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        target: RouteTarget,
    ) -> KernelResult<RouteBuilder<'_>> {
        let id = self
            .router
            .add_route(method, path, target, RouteOptions::default())?;
        Ok(RouteBuilder::new(&mut self.router, id))
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn get(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::GET, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn post(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::POST, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn put(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::PUT, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn patch(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::PATCH, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn delete(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::DELETE, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn options(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::OPTIONS, path, target)
    }

    /// # Errors
    ///
    /// See [`HttpKernel::route`].
    pub fn head(&mut self, path: &str, target: RouteTarget) -> KernelResult<RouteBuilder<'_>> {
        self.route(Method::HEAD, path, target)
    }

    /// Register the routes added by `f` under `prefix`. Groups nest.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns; the prefix is popped either way.
    pub fn group<F>(&mut self, prefix: &str, f: F) -> KernelResult<()>
    where
        F: FnOnce(&mut Self) -> KernelResult<()>,
    {
        self.router.push_prefix(prefix);
        let result = f(self);
        self.router.pop_prefix();
        result
    }

    /// Reverse lookup by route name.
    ///
    /// # Errors
    ///
    /// [`KernelError::UrlGeneration`] for unknown names or missing parameters.
    pub fn url_for<P, K, V>(
        &self,
        name: &str,
        params: P,
        query: Option<&[(&str, &str)]>,
    ) -> KernelResult<String>
    where
        P: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        Ok(self.router.url_for(name, params, query)?)
    }

    /// Run one exchange through the pipeline. Never fails: every error,
    /// including a panic, becomes a response.
    pub fn handle(&self, req: Request) -> Response {
        let start = Instant::now();
        let ctx = match self.config.execution_model {
            ExecutionModel::Process => ContextId::GLOBAL,
            ExecutionModel::Cooperative => ContextId::allocate(),
        };
        let _binding = ctx.bind();
        let request_id = RequestId::reuse_or_new(req.header(&self.config.request_id_header));
        let req = Arc::new(req);
        let stage = Cell::new(Stage::Routing);

        debug!(
            request_id = %request_id,
            context = %ctx,
            method = %req.method(),
            path = %req.path(),
            "Dispatching request"
        );

        if let Some(resolver) = &self.resolver {
            resolver.begin_scope(ctx);
        }
        self.context.set(ctx, Arc::clone(&req));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&req, ctx, &stage)));
        let response = match outcome {
            Ok(Ok(res)) => res,
            Ok(Err(err)) => self.render_error(&err, &req, ctx, stage.get()),
            Err(payload) => {
                let err = KernelError::internal(anyhow!(
                    "Handler panicked: {}",
                    panic_message(payload.as_ref())
                ));
                self.render_error(&err, &req, ctx, stage.get())
            }
        };

        self.context.clear(ctx);
        if let Some(resolver) = &self.resolver {
            resolver.end_scope(ctx);
        }

        let response = response.with_header(&self.config.request_id_header, request_id.clone());
        if let Some(logger) = &self.access_logger {
            let info = AccessInfo {
                request_id,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            logger.log(&req, &response, &info);
        }
        response
    }

    /// Error responses see the request as last published, route params included.
    fn render_error(
        &self,
        err: &KernelError,
        req: &Arc<Request>,
        ctx: ContextId,
        stage: Stage,
    ) -> Response {
        let current = self.context.get(ctx).unwrap_or_else(|| Arc::clone(req));
        self.error_handler.handle(err, &current, stage)
    }

    fn dispatch(&self, req: &Request, ctx: ContextId, stage: &Cell<Stage>) -> KernelResult<Response> {
        if !self.is_accepting() {
            return Err(KernelError::ServerNotRunning(
                "Server is not accepting requests".to_string(),
            ));
        }

        let host = req.host();
        let outcome = self
            .router
            .match_route(req.method(), req.path(), host.as_deref());
        let Some(found) = outcome.matched else {
            return Err(if outcome.allowed_methods.is_empty() {
                KernelError::RouteNotFound {
                    method: req.method().clone(),
                    path: req.path().to_string(),
                }
            } else {
                KernelError::MethodNotAllowed {
                    method: req.method().clone(),
                    path: req.path().to_string(),
                    allowed: outcome.allowed_methods,
                }
            });
        };
        let route = found.route;
        let routed = Arc::new(req.with_route_params(found.params));
        self.context.set(ctx, Arc::clone(&routed));

        if let Some(rules) = &route.validation {
            stage.set(Stage::Validation);
            let data = validation_data(&routed, route.validation_target);
            validator::validate(&data, rules)?;
        }

        stage.set(Stage::Middleware);
        let classes = |class: &str| self.resolve_middleware_class(ctx, class);
        let mut chain: Vec<Arc<dyn Middleware>> = self.middleware.global().to_vec();
        chain.extend(
            self.middleware
                .resolve_route_middleware(&route.middleware, Some(&classes))?,
        );

        let endpoint = |r: &Request| {
            stage.set(Stage::Handler);
            let out = self.invoke(route, r, ctx);
            if out.is_ok() {
                stage.set(Stage::Middleware);
            }
            out
        };
        let res = Next::new(&chain, &endpoint).run(&routed)?;

        stage.set(Stage::AfterMiddleware);
        Ok(self.middleware.apply_after(&routed, res))
    }

    fn invoke(&self, route: &Route, req: &Request, ctx: ContextId) -> KernelResult<Response> {
        match &route.target {
            RouteTarget::Handler(handler) => {
                let cx = HandlerContext::new(
                    ctx,
                    self.resolver.as_deref(),
                    route.template.param_names(),
                );
                handler.call(req, &cx)
            }
            RouteTarget::Controller { class, method } => {
                let resolver = self.resolver.as_ref().ok_or_else(|| {
                    KernelError::Configuration(format!(
                        "Controller target '{class}#{method}' needs a dependency resolver"
                    ))
                })?;
                let service = resolver.resolve(ctx, class)?;
                let controller = service
                    .downcast_ref::<Arc<dyn Controller>>()
                    .ok_or_else(|| {
                        KernelError::Configuration(format!("Service '{class}' is not a controller"))
                    })?;
                controller.call(method, req).unwrap_or_else(|| {
                    warn!(class = %class, method = %method, "Controller action not found");
                    Err(KernelError::Configuration(format!(
                        "Controller '{class}' has no action '{method}'"
                    )))
                })
            }
        }
    }

    fn resolve_middleware_class(&self, ctx: ContextId, class: &str) -> KernelResult<Arc<dyn Middleware>> {
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            KernelError::Configuration(format!(
                "Middleware class '{class}' needs a dependency resolver"
            ))
        })?;
        let service = resolver.resolve(ctx, class)?;
        service
            .downcast_ref::<Arc<dyn Middleware>>()
            .map(Arc::clone)
            .ok_or_else(|| KernelError::Configuration(format!("Service '{class}' is not a middleware")))
    }
}

/// The map a route's rules are evaluated against.
fn validation_data(req: &Request, target: ValidationTarget) -> Map<String, Value> {
    match target {
        ValidationTarget::Body => match req.body() {
            RequestBody::Json(Value::Object(map)) => map.clone(),
            RequestBody::Raw(bytes) if is_form(req) => url::form_urlencoded::parse(bytes)
                .into_owned()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
            // Undecodable JSON validates as an empty map, so `required` rules report it.
            RequestBody::Raw(bytes) if is_json(req) => {
                serde_json::from_slice::<Map<String, Value>>(bytes).unwrap_or_default()
            }
            _ => Map::new(),
        },
        ValidationTarget::Query => req
            .query()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect(),
        ValidationTarget::Params => req
            .route_params()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect(),
    }
}

fn is_form(req: &Request) -> bool {
    req.header("content-type")
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn is_json(req: &Request) -> bool {
    req.header("content-type").is_some_and(|ct| {
        let mime = ct.split(';').next().unwrap_or_default().trim();
        mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
