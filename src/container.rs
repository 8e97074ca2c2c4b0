//! # Dependency Resolver
//!
//! The kernel needs only a narrow capability from dependency injection:
//! open and close a per-request scope, and produce an instance for a service
//! name. [`Resolver`] is that capability; [`Container`] is a small default
//! implementation.
//!
//! Request-scoped bindings are keyed by [`ContextId`], like the request
//! context, so interleaved requests on one worker never see each other's
//! transient services.
//!
//! ```rust
//! use brrtkernel::container::{Container, Resolver};
//! use brrtkernel::ids::ContextId;
//! use std::sync::Arc;
//!
//! struct Mailer { from: &'static str }
//!
//! let container = Container::new();
//! container.singleton(Mailer { from: "noreply@example.com" });
//!
//! let ctx = ContextId::allocate();
//! container.begin_scope(ctx);
//! container.bind_scoped(ctx, "tenant", Arc::new(String::from("acme")));
//! let mailer = container.get::<Mailer>(ctx).unwrap();
//! assert_eq!(mailer.from, "noreply@example.com");
//! container.end_scope(ctx);
//! assert!(container.resolve(ctx, "tenant").is_err());
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error};

use crate::error::{KernelError, KernelResult};
use crate::ids::ContextId;
use crate::kernel::Controller;
use crate::middleware::Middleware;

/// Type-erased service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Builds a singleton on first resolution.
pub type Factory = Arc<dyn Fn() -> Service + Send + Sync>;

/// Capability the kernel uses for handler injection, controller targets and
/// interceptor classes.
pub trait Resolver: Send + Sync {
    /// Open fresh transient bindings for `ctx`.
    fn begin_scope(&self, ctx: ContextId);

    /// Drop every transient binding of `ctx`. Called on every exit path.
    fn end_scope(&self, ctx: ContextId);

    /// # Errors
    ///
    /// [`KernelError::Configuration`] when nothing is bound under `name`.
    fn resolve(&self, ctx: ContextId, name: &str) -> KernelResult<Service>;
}

/// Default resolver: singletons by name plus per-context scoped bindings.
#[derive(Default)]
pub struct Container {
    singletons: DashMap<String, Service>,
    factories: DashMap<String, Factory>,
    scoped: DashMap<ContextId, HashMap<String, Service>>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under an explicit name.
    pub fn instance(&self, name: &str, service: Service) {
        debug!(service = %name, "Service registered");
        self.singletons.insert(name.to_string(), service);
    }

    /// Register `value` under its type name; retrieve with [`Container::get`].
    pub fn singleton<T: Any + Send + Sync>(&self, value: T) {
        self.instance(type_name::<T>(), Arc::new(value));
    }

    /// Register a lazily-built singleton. Racing first resolutions may each
    /// run the factory; the first stored instance wins.
    pub fn factory<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Service + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Register a class-reference route target.
    pub fn controller(&self, name: &str, controller: Arc<dyn Controller>) {
        self.instance(name, Arc::new(controller));
    }

    /// Register an interceptor resolvable by [`MiddlewareDecl::Class`](crate::middleware::MiddlewareDecl::Class).
    pub fn middleware(&self, name: &str, middleware: Arc<dyn Middleware>) {
        self.instance(name, Arc::new(middleware));
    }

    /// Bind a transient service visible only to `ctx`; shadows singletons.
    pub fn bind_scoped(&self, ctx: ContextId, name: &str, service: Service) {
        self.scoped
            .entry(ctx)
            .or_default()
            .insert(name.to_string(), service);
    }

    /// Typed lookup by type name.
    ///
    /// # Errors
    ///
    /// [`KernelError::Configuration`] when unbound or bound to another type.
    pub fn get<T: Any + Send + Sync>(&self, ctx: ContextId) -> KernelResult<Arc<T>> {
        downcast_service(self.resolve(ctx, type_name::<T>())?, type_name::<T>())
    }

    /// Contexts with an open scope.
    #[must_use]
    pub fn active_scopes(&self) -> usize {
        self.scoped.len()
    }
}

/// Recover a concrete type from a resolved service.
///
/// # Errors
///
/// [`KernelError::Configuration`] when `service` holds another type.
pub fn downcast_service<T: Any + Send + Sync>(service: Service, name: &str) -> KernelResult<Arc<T>> {
    service.downcast::<T>().map_err(|_| {
        KernelError::Configuration(format!(
            "Service '{name}' is not of type {}",
            type_name::<T>()
        ))
    })
}

impl Resolver for Container {
    fn begin_scope(&self, ctx: ContextId) {
        self.scoped.insert(ctx, HashMap::new());
    }

    fn end_scope(&self, ctx: ContextId) {
        self.scoped.remove(&ctx);
    }

    fn resolve(&self, ctx: ContextId, name: &str) -> KernelResult<Service> {
        if let Some(scope) = self.scoped.get(&ctx) {
            if let Some(service) = scope.get(name) {
                return Ok(Arc::clone(service));
            }
        }
        if let Some(service) = self.singletons.get(name) {
            return Ok(Arc::clone(service.value()));
        }
        // Clone the factory out so it runs without holding a map guard; it may
        // resolve other services.
        let factory = self.factories.get(name).map(|f| Arc::clone(f.value()));
        if let Some(factory) = factory {
            let built = factory();
            let stored = self
                .singletons
                .entry(name.to_string())
                .or_insert(built)
                .value()
                .clone();
            return Ok(stored);
        }
        error!(service = %name, context = %ctx, "Service is not bound");
        Err(KernelError::Configuration(format!(
            "Service '{name}' is not bound"
        )))
    }
}
