use tracing::warn;

use crate::error::KernelResult;
use crate::middleware::MiddlewareDecl;
use crate::router::{HostConstraint, RouteId, RouteUpdate, Router};
use crate::validator::{RuleSet, ValidationTarget};

/// Fluent settings for a freshly registered route.
///
/// Every call is applied immediately through [`Router::update_route`], so the
/// builder can be dropped at any point.
///
/// ```rust
/// use brrtkernel::kernel::{HttpKernel, RouteTarget};
/// use brrtkernel::validator::{RuleSet, ValidationTarget};
/// use serde_json::json;
///
/// let mut kernel = HttpKernel::default();
/// kernel
///     .post("/register", RouteTarget::from_fn(|| json!({"ok": true})))
///     .unwrap()
///     .name("register")
///     .validate(RuleSet::new().field("email", "required|email"), ValidationTarget::Body);
/// assert!(kernel.router().route_by_name("register").is_some());
/// ```
pub struct RouteBuilder<'k> {
    router: &'k mut Router,
    id: RouteId,
}

impl<'k> RouteBuilder<'k> {
    pub(crate) fn new(router: &'k mut Router, id: RouteId) -> Self {
        Self { router, id }
    }

    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn name(self, name: &str) -> Self {
        self.update(RouteUpdate {
            name: Some(name.to_string()),
            ..RouteUpdate::default()
        })
    }

    /// Append one interceptor declaration, e.g. `"auth"` or `"role:admin"`.
    pub fn middleware(self, decl: impl Into<MiddlewareDecl>) -> Self {
        let mut chain = self
            .router
            .route(self.id)
            .map(|r| r.middleware.clone())
            .unwrap_or_default();
        chain.push(decl.into());
        self.update(RouteUpdate {
            middleware: Some(chain),
            ..RouteUpdate::default()
        })
    }

    pub fn validate(self, rules: RuleSet, target: ValidationTarget) -> Self {
        self.update(RouteUpdate {
            validation: Some((rules, target)),
            ..RouteUpdate::default()
        })
    }

    pub fn host(self, host: HostConstraint) -> Self {
        self.update(RouteUpdate {
            host: Some(host),
            ..RouteUpdate::default()
        })
    }

    /// Parse and attach a host constraint (`api.example.com` or `/^.+\.example\.com$/`).
    ///
    /// # Errors
    ///
    /// [`KernelError::Configuration`](crate::error::KernelError::Configuration)
    /// when a pattern does not compile.
    pub fn host_str(self, host: &str) -> KernelResult<Self> {
        let constraint = HostConstraint::parse(host)?;
        Ok(self.host(constraint))
    }

    fn update(self, update: RouteUpdate) -> Self {
        if let Err(err) = self.router.update_route(self.id, update) {
            warn!(route_id = self.id.0, error = %err, "Route update rejected");
        }
        self
    }
}
