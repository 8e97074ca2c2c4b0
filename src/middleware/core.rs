use std::fmt;
use std::sync::Arc;

use crate::error::KernelResult;
use crate::server::{Request, Response};

/// Terminal step of a chain: the route's handler invocation.
pub type Endpoint<'a> = &'a (dyn Fn(&Request) -> KernelResult<Response> + 'a);

/// Continuation handed to each interceptor.
///
/// Calling [`Next::run`] passes control to the next interceptor, or to the
/// handler once the chain is exhausted. An interceptor short-circuits simply
/// by returning a response without calling `run`.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: Endpoint<'a>,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(chain: &'a [Arc<dyn Middleware>], endpoint: Endpoint<'a>) -> Self {
        Self { chain, endpoint }
    }

    /// Continue with `req`, which may be the received request or a derived one.
    pub fn run(self, req: &Request) -> KernelResult<Response> {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(
                req,
                Next {
                    chain: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(req),
        }
    }

    /// Interceptors still queued after this point (handler excluded).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Canonical interceptor shape: `(request, next) -> response`.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &Request, next: Next<'_>) -> KernelResult<Response>;

    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Interceptor registered under a name and invoked with bound arguments,
/// e.g. `role:admin` → `args == ["admin"]`.
pub trait NamedMiddleware: Send + Sync {
    fn handle(&self, req: &Request, next: Next<'_>, args: &[String]) -> KernelResult<Response>;
}

/// Any plain interceptor can be registered by name; arguments are ignored.
impl<M: Middleware> NamedMiddleware for M {
    fn handle(&self, req: &Request, next: Next<'_>, _args: &[String]) -> KernelResult<Response> {
        Middleware::handle(self, req, next)
    }
}

/// Post-response interceptor. Returning `Some` replaces the response,
/// `None` keeps the current one unchanged.
pub trait AfterMiddleware: Send + Sync {
    fn after(&self, req: &Request, res: &Response) -> Option<Response>;
}

/// Closure-backed [`Middleware`], built with [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
    name: String,
}

/// Wrap a closure `(req, next) -> KernelResult<Response>` as an interceptor.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&Request, Next<'_>) -> KernelResult<Response> + Send + Sync + 'static,
{
    FnMiddleware {
        f,
        name: "inline".to_string(),
    }
}

impl<F> FnMiddleware<F> {
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&Request, Next<'_>) -> KernelResult<Response> + Send + Sync,
{
    fn handle(&self, req: &Request, next: Next<'_>) -> KernelResult<Response> {
        (self.f)(req, next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Closure-backed [`NamedMiddleware`], built with [`named_fn`].
pub struct FnNamedMiddleware<F> {
    f: F,
}

/// Wrap a closure `(req, next, args)` as a named interceptor.
pub fn named_fn<F>(f: F) -> FnNamedMiddleware<F>
where
    F: Fn(&Request, Next<'_>, &[String]) -> KernelResult<Response> + Send + Sync + 'static,
{
    FnNamedMiddleware { f }
}

impl<F> NamedMiddleware for FnNamedMiddleware<F>
where
    F: Fn(&Request, Next<'_>, &[String]) -> KernelResult<Response> + Send + Sync,
{
    fn handle(&self, req: &Request, next: Next<'_>, args: &[String]) -> KernelResult<Response> {
        (self.f)(req, next, args)
    }
}

/// Closure-backed [`AfterMiddleware`], built with [`after_fn`].
pub struct FnAfterMiddleware<F> {
    f: F,
}

pub fn after_fn<F>(f: F) -> FnAfterMiddleware<F>
where
    F: Fn(&Request, &Response) -> Option<Response> + Send + Sync + 'static,
{
    FnAfterMiddleware { f }
}

impl<F> AfterMiddleware for FnAfterMiddleware<F>
where
    F: Fn(&Request, &Response) -> Option<Response> + Send + Sync,
{
    fn after(&self, req: &Request, res: &Response) -> Option<Response> {
        (self.f)(req, res)
    }
}

/// A named interceptor with its arguments threaded into every call.
pub struct BoundMiddleware {
    name: String,
    inner: Arc<dyn NamedMiddleware>,
    args: Vec<String>,
}

impl BoundMiddleware {
    #[must_use]
    pub fn new(name: &str, inner: Arc<dyn NamedMiddleware>, args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            inner,
            args,
        }
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Middleware for BoundMiddleware {
    fn handle(&self, req: &Request, next: Next<'_>) -> KernelResult<Response> {
        self.inner.handle(req, next, &self.args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// How a route declares one of its interceptors.
#[derive(Clone)]
pub enum MiddlewareDecl {
    /// Looked up in the named registry at dispatch time.
    Named { name: String, args: Vec<String> },
    /// Used as-is.
    Inline(Arc<dyn Middleware>),
    /// Resolved through the dependency resolver by service name.
    Class(String),
}

impl MiddlewareDecl {
    /// Parse `name` or `name:arg1,arg2`. Arguments may also be separated
    /// with `|`, as in `role_all:admin|editor`.
    #[must_use]
    pub fn parse(decl: &str) -> Self {
        let decl = decl.trim();
        match decl.split_once(':') {
            Some((name, args)) => MiddlewareDecl::Named {
                name: name.trim().to_string(),
                args: args
                    .split([',', '|'])
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect(),
            },
            None => MiddlewareDecl::Named {
                name: decl.to_string(),
                args: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn inline(mw: impl Middleware + 'static) -> Self {
        MiddlewareDecl::Inline(Arc::new(mw))
    }

    #[must_use]
    pub fn class(service: &str) -> Self {
        MiddlewareDecl::Class(service.to_string())
    }
}

impl From<&str> for MiddlewareDecl {
    fn from(decl: &str) -> Self {
        MiddlewareDecl::parse(decl)
    }
}

impl From<String> for MiddlewareDecl {
    fn from(decl: String) -> Self {
        MiddlewareDecl::parse(&decl)
    }
}

impl fmt::Debug for MiddlewareDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareDecl::Named { name, args } => f
                .debug_struct("Named")
                .field("name", name)
                .field("args", args)
                .finish(),
            MiddlewareDecl::Inline(mw) => f.debug_tuple("Inline").field(&mw.name()).finish(),
            MiddlewareDecl::Class(class) => f.debug_tuple("Class").field(class).finish(),
        }
    }
}
