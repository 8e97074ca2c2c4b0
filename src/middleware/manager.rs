use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::core::{AfterMiddleware, BoundMiddleware, MiddlewareDecl, NamedMiddleware};
use super::Middleware;
use crate::error::{KernelError, KernelResult};
use crate::server::{Request, Response};

/// Resolves `MiddlewareDecl::Class` entries to interceptor instances.
pub type ClassResolver<'a> = &'a dyn Fn(&str) -> KernelResult<Arc<dyn Middleware>>;

/// Holds the global and after interceptor lists plus the named registry.
///
/// All registration happens while the application is assembled; at dispatch
/// time the manager is only read, so it needs no locking.
#[derive(Default, Clone)]
pub struct MiddlewareManager {
    global: Vec<Arc<dyn Middleware>>,
    after: Vec<Arc<dyn AfterMiddleware>>,
    named: HashMap<String, Arc<dyn NamedMiddleware>>,
}

impl MiddlewareManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the global chain; runs before every route's own interceptors.
    pub fn add_global_middleware(&mut self, mw: Arc<dyn Middleware>) {
        debug!(
            middleware = %mw.name(),
            position = self.global.len(),
            "Global middleware added"
        );
        self.global.push(mw);
    }

    /// Append to the post-response list.
    pub fn add_after_middleware(&mut self, mw: Arc<dyn AfterMiddleware>) {
        self.after.push(mw);
    }

    /// Register `mw` under `name`. Names are unique; the last registration wins.
    pub fn register_named(&mut self, name: &str, mw: Arc<dyn NamedMiddleware>) {
        if self.named.insert(name.to_string(), mw).is_some() {
            warn!(name = %name, "Named middleware replaced");
        } else {
            info!(name = %name, total = self.named.len(), "Named middleware registered");
        }
    }

    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<Arc<dyn NamedMiddleware>> {
        self.named.get(name).map(Arc::clone)
    }

    #[must_use]
    pub fn global(&self) -> &[Arc<dyn Middleware>] {
        &self.global
    }

    #[must_use]
    pub fn after(&self) -> &[Arc<dyn AfterMiddleware>] {
        &self.after
    }

    /// Turn a route's declarations into an executable list, in declaration order.
    ///
    /// # Errors
    ///
    /// [`KernelError::Configuration`] when a named entry is not registered, or
    /// when a class entry cannot be resolved.
    pub fn resolve_route_middleware(
        &self,
        decls: &[MiddlewareDecl],
        classes: Option<ClassResolver<'_>>,
    ) -> KernelResult<Vec<Arc<dyn Middleware>>> {
        let mut resolved: Vec<Arc<dyn Middleware>> = Vec::with_capacity(decls.len());
        for decl in decls {
            match decl {
                MiddlewareDecl::Named { name, args } => {
                    let Some(inner) = self.named.get(name) else {
                        let known: Vec<&String> = self.named.keys().collect();
                        error!(
                            name = %name,
                            registered = ?known,
                            "Route references unregistered middleware"
                        );
                        return Err(KernelError::Configuration(format!(
                            "Middleware '{name}' is not registered"
                        )));
                    };
                    resolved.push(Arc::new(BoundMiddleware::new(
                        name,
                        Arc::clone(inner),
                        args.clone(),
                    )));
                }
                MiddlewareDecl::Inline(mw) => resolved.push(Arc::clone(mw)),
                MiddlewareDecl::Class(class) => {
                    let resolve = classes.ok_or_else(|| {
                        KernelError::Configuration(format!(
                            "Middleware class '{class}' needs a dependency resolver"
                        ))
                    })?;
                    resolved.push(resolve(class)?);
                }
            }
        }
        Ok(resolved)
    }

    /// Fold the after list over `res`, in registration order.
    #[must_use]
    pub fn apply_after(&self, req: &Request, res: Response) -> Response {
        self.after.iter().fold(res, |current, mw| {
            mw.after(req, &current).unwrap_or(current)
        })
    }
}
