use std::any::{type_name, Any};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::container::{downcast_service, Resolver};
use crate::error::{KernelError, KernelResult};
use crate::ids::ContextId;
use crate::server::{Request, RequestBody, Response};

/// What an extractor can see besides the request itself.
pub struct HandlerContext<'a> {
    context_id: ContextId,
    resolver: Option<&'a dyn Resolver>,
    param_names: &'a [Arc<str>],
    param_cursor: Cell<usize>,
}

impl<'a> HandlerContext<'a> {
    #[must_use]
    pub fn new(
        context_id: ContextId,
        resolver: Option<&'a dyn Resolver>,
        param_names: &'a [Arc<str>],
    ) -> Self {
        Self {
            context_id,
            resolver,
            param_names,
            param_cursor: Cell::new(0),
        }
    }

    #[must_use]
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    #[must_use]
    pub fn resolver(&self) -> Option<&'a dyn Resolver> {
        self.resolver
    }

    /// Name of the next route parameter for a positional [`Param`].
    fn next_param_name(&self) -> Option<&'a Arc<str>> {
        let idx = self.param_cursor.get();
        self.param_cursor.set(idx + 1);
        self.param_names.get(idx)
    }
}

/// Builds one handler argument from the request.
pub trait FromRequest: Sized {
    /// # Errors
    ///
    /// Any failure aborts the request through the error handler.
    fn from_request(req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Self>;
}

impl FromRequest for Request {
    fn from_request(req: &Request, _cx: &HandlerContext<'_>) -> KernelResult<Self> {
        Ok(req.clone())
    }
}

/// All route parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(pub HashMap<String, String>);

impl FromRequest for Params {
    fn from_request(req: &Request, _cx: &HandlerContext<'_>) -> KernelResult<Self> {
        Ok(Params(req.route_params_map()))
    }
}

/// All query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(pub HashMap<String, String>);

impl FromRequest for Query {
    fn from_request(req: &Request, _cx: &HandlerContext<'_>) -> KernelResult<Self> {
        Ok(Query(req.query_map()))
    }
}

/// Request body decoded with serde; also a JSON reply when returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> FromRequest for Json<T> {
    fn from_request(req: &Request, _cx: &HandlerContext<'_>) -> KernelResult<Self> {
        let decoded = match req.body() {
            RequestBody::Json(value) => T::deserialize(value),
            RequestBody::Raw(bytes) => serde_json::from_slice(bytes),
            RequestBody::Empty => T::deserialize(&Value::Null),
        };
        decoded
            .map(Json)
            .map_err(|e| KernelError::http(400, format!("Invalid JSON body: {e}")))
    }
}

/// A service from the dependency resolver, looked up by type name.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: Any + Send + Sync> FromRequest for Inject<T> {
    fn from_request(_req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Self> {
        let name = type_name::<T>();
        let resolver = cx.resolver().ok_or_else(|| {
            KernelError::Configuration(format!("Cannot inject {name}: no resolver configured"))
        })?;
        let service = resolver.resolve(cx.context_id(), name)?;
        downcast_service(service, name).map(Inject)
    }
}

/// One route parameter parsed with `FromStr`.
///
/// `Param` arguments bind to the route's parameters in template order: the
/// first `Param` gets the first `{name}`, and so on. An omitted optional
/// parameter yields `T::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param<T>(pub T);

impl<T: FromStr + Default> FromRequest for Param<T> {
    fn from_request(req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Self> {
        let name = cx.next_param_name().ok_or_else(|| {
            KernelError::Configuration(
                "Handler declares more Param arguments than the route has parameters".to_string(),
            )
        })?;
        match req.route_param(name) {
            None => Ok(Param(T::default())),
            Some(raw) => raw.parse::<T>().map(Param).map_err(|_| {
                KernelError::http(400, format!("Invalid value for route parameter '{name}'"))
            }),
        }
    }
}

/// Converts a handler's return value into a response.
pub trait IntoReply {
    /// # Errors
    ///
    /// [`KernelError::UnsupportedResponse`] for values with no response form,
    /// or the error carried by a `Result`.
    fn into_reply(self) -> KernelResult<Response>;
}

impl IntoReply for Response {
    fn into_reply(self) -> KernelResult<Response> {
        Ok(self)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> KernelResult<Response> {
        match self {
            Value::Array(_) | Value::Object(_) => Ok(Response::json(200, &self)),
            Value::String(s) => Ok(Response::text(200, s)),
            Value::Null => Ok(Response::empty()),
            Value::Bool(_) => Err(KernelError::UnsupportedResponse("boolean".to_string())),
            Value::Number(_) => Err(KernelError::UnsupportedResponse("number".to_string())),
        }
    }
}

impl IntoReply for String {
    fn into_reply(self) -> KernelResult<Response> {
        Ok(Response::text(200, self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> KernelResult<Response> {
        Ok(Response::text(200, self))
    }
}

impl IntoReply for () {
    fn into_reply(self) -> KernelResult<Response> {
        Ok(Response::empty())
    }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> KernelResult<Response> {
        let value = serde_json::to_value(&self.0)?;
        Ok(Response::json(200, &value))
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<KernelError>,
{
    fn into_reply(self) -> KernelResult<Response> {
        self.map_err(Into::into)?.into_reply()
    }
}

/// A route handler with its arguments extracted from the request.
///
/// Implemented for closures of up to four [`FromRequest`] arguments whose
/// return type implements [`IntoReply`]. `Args` only disambiguates the impls.
pub trait Handler<Args>: Send + Sync + 'static {
    /// # Errors
    ///
    /// Extraction failures and errors returned by the handler.
    fn call(&self, req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Response>;
}

impl<F, R> Handler<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn call(&self, _req: &Request, _cx: &HandlerContext<'_>) -> KernelResult<Response> {
        (self)().into_reply()
    }
}

macro_rules! impl_handler {
    ($($arg:ident),+) => {
        impl<F, R, $($arg),+> Handler<($($arg,)+)> for F
        where
            F: Fn($($arg),+) -> R + Send + Sync + 'static,
            R: IntoReply,
            $($arg: FromRequest,)+
        {
            #[allow(non_snake_case)]
            fn call(&self, req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Response> {
                $(let $arg = $arg::from_request(req, cx)?;)+
                (self)($($arg),+).into_reply()
            }
        }
    };
}

impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);

/// Object-safe form of [`Handler`], stored in routes.
pub trait ErasedHandler: Send + Sync {
    /// # Errors
    ///
    /// See [`Handler::call`].
    fn call(&self, req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Response>;
}

struct HandlerFn<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Args> ErasedHandler for HandlerFn<H, Args>
where
    H: Handler<Args>,
    Args: 'static,
{
    fn call(&self, req: &Request, cx: &HandlerContext<'_>) -> KernelResult<Response> {
        self.handler.call(req, cx)
    }
}

/// Class-reference target: one object exposing several named actions.
pub trait Controller: Send + Sync {
    /// Run action `method`. `None` means the controller has no such action,
    /// which the kernel reports as a configuration error.
    fn call(&self, method: &str, req: &Request) -> Option<KernelResult<Response>>;
}

/// What a route dispatches to.
#[derive(Clone)]
pub enum RouteTarget {
    Handler(Arc<dyn ErasedHandler>),
    /// Resolved through the dependency resolver at dispatch time.
    Controller { class: String, method: String },
}

impl RouteTarget {
    pub fn from_fn<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
        Args: 'static,
    {
        RouteTarget::Handler(Arc::new(HandlerFn {
            handler,
            _args: PhantomData,
        }))
    }

    /// Parse `"Class#method"`.
    ///
    /// # Errors
    ///
    /// [`KernelError::Configuration`] when either half is missing.
    pub fn controller(target: &str) -> KernelResult<Self> {
        match target.split_once('#') {
            Some((class, method)) if !class.trim().is_empty() && !method.trim().is_empty() => {
                Ok(RouteTarget::Controller {
                    class: class.trim().to_string(),
                    method: method.trim().to_string(),
                })
            }
            _ => Err(KernelError::Configuration(format!(
                "Invalid controller target '{target}', expected 'Class#method'"
            ))),
        }
    }
}

impl fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Handler(_) => f.write_str("Handler(..)"),
            RouteTarget::Controller { class, method } => write!(f, "Controller({class}#{method})"),
        }
    }
}
