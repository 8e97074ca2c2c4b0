use http::Method;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::host::HostConstraint;
use super::template::PathTemplate;
use super::RouteError;
use crate::kernel::RouteTarget;
use crate::middleware::MiddlewareDecl;
use crate::server::ParamVec;
use crate::validator::{RuleSet, ValidationTarget};

/// Stable arena index of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub usize);

/// A compiled route: method, full path, matcher, target and its gates.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    /// Full path after prefix composition.
    pub path: String,
    pub template: PathTemplate,
    pub target: RouteTarget,
    pub middleware: Vec<MiddlewareDecl>,
    pub validation: Option<RuleSet>,
    pub validation_target: ValidationTarget,
    pub name: Option<String>,
    pub host: Option<HostConstraint>,
}

/// Optional registration fields for [`Router::add_route`].
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub middleware: Vec<MiddlewareDecl>,
    pub validation: Option<RuleSet>,
    pub validation_target: ValidationTarget,
    pub name: Option<String>,
    pub host: Option<HostConstraint>,
}

/// Partial update applied by [`Router::update_route`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct RouteUpdate {
    pub middleware: Option<Vec<MiddlewareDecl>>,
    pub validation: Option<(RuleSet, ValidationTarget)>,
    pub name: Option<String>,
    pub host: Option<HostConstraint>,
}

/// A full (path + method) match.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub id: RouteId,
    pub route: &'a Route,
    /// Percent-decoded parameters; omitted optional parameters are absent.
    pub params: ParamVec,
}

/// Outcome of [`Router::match_route`].
///
/// `allowed_methods` accumulates the methods of every host-eligible route whose
/// path matched under a different method; the kernel uses it to tell a 405
/// from a 404 when `matched` is `None`.
#[derive(Debug, Clone)]
pub struct MatchOutcome<'a> {
    pub matched: Option<RouteMatch<'a>>,
    pub allowed_methods: Vec<Method>,
}

/// Route table with reverse lookup and group prefixes.
///
/// Routes live in an arena addressed by [`RouteId`]; registration order is the
/// tie-break (first full match wins). The table is mutated only while the
/// application is being assembled and is read-only once serving begins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    names: HashMap<String, RouteId>,
    prefixes: Vec<String>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. `path` is composed with the active group prefix.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidTemplate`] when the path template is malformed.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        target: RouteTarget,
        options: RouteOptions,
    ) -> Result<RouteId, RouteError> {
        let full_path = self.full_path(path);
        let template = PathTemplate::compile(&full_path)?;
        let id = RouteId(self.routes.len());

        if let Some(name) = &options.name {
            self.index_name(name, id);
        }

        debug!(
            route_id = id.0,
            method = %method,
            path = %full_path,
            pattern = %template.pattern(),
            name = ?options.name,
            "Route registered"
        );

        self.routes.push(Route {
            method,
            path: full_path,
            template,
            target,
            middleware: options.middleware,
            validation: options.validation,
            validation_target: options.validation_target,
            name: options.name,
            host: options.host,
        });
        Ok(id)
    }

    /// Merge `update` into the stored route in place.
    ///
    /// Renaming re-points the reverse-lookup index and drops the old name.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnknownRoute`] when `id` was never handed out.
    pub fn update_route(&mut self, id: RouteId, update: RouteUpdate) -> Result<(), RouteError> {
        let route = self
            .routes
            .get_mut(id.0)
            .ok_or(RouteError::UnknownRoute(id.0))?;

        if let Some(mw) = update.middleware {
            route.middleware = mw;
        }
        if let Some((rules, target)) = update.validation {
            route.validation = Some(rules);
            route.validation_target = target;
        }
        if let Some(host) = update.host {
            route.host = Some(host);
        }
        if let Some(new_name) = update.name {
            let old = route.name.replace(new_name.clone());
            if let Some(old) = old {
                if self.names.get(&old) == Some(&id) {
                    self.names.remove(&old);
                }
            }
            self.index_name(&new_name, id);
        }
        Ok(())
    }

    fn index_name(&mut self, name: &str, id: RouteId) {
        if let Some(prev) = self.names.insert(name.to_string(), id) {
            if prev != id {
                warn!(
                    name = %name,
                    previous_route = prev.0,
                    route_id = id.0,
                    "Route name reused - reverse lookup now points at the newer route"
                );
            }
        }
    }

    /// Resolve `(method, path, host)`.
    ///
    /// Routes are scanned in registration order. A host-ineligible route is
    /// skipped outright; a path match under another method is recorded in
    /// `allowed_methods` and scanning continues; the first path+method match
    /// returns immediately.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str, host: Option<&str>) -> MatchOutcome<'_> {
        let match_start = Instant::now();
        let path = normalize_request_path(path);
        let mut allowed_methods: Vec<Method> = Vec::new();

        for (idx, route) in self.routes.iter().enumerate() {
            if let Some(constraint) = &route.host {
                if !constraint.matches(host) {
                    continue;
                }
            }
            let Some(params) = route.template.captures(path) else {
                continue;
            };
            if route.method != *method {
                if !allowed_methods.contains(&route.method) {
                    allowed_methods.push(route.method.clone());
                }
                continue;
            }

            let duration = match_start.elapsed();
            if duration > Duration::from_millis(1) {
                warn!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.path,
                    duration_us = duration.as_micros(),
                    "Slow route matching detected"
                );
            } else {
                debug!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.path,
                    path_params = ?params,
                    duration_us = duration.as_micros(),
                    "Route matched"
                );
            }
            return MatchOutcome {
                matched: Some(RouteMatch {
                    id: RouteId(idx),
                    route,
                    params,
                }),
                allowed_methods,
            };
        }

        debug!(
            method = %method,
            path = %path,
            allowed_methods = ?allowed_methods,
            duration_us = match_start.elapsed().as_micros(),
            "No route matched"
        );
        MatchOutcome {
            matched: None,
            allowed_methods,
        }
    }

    /// Reverse lookup: build the path of the route called `name`.
    ///
    /// Required parameters must be supplied; an absent optional trailing
    /// parameter is omitted together with its separator. `query` pairs are
    /// appended form-encoded.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnknownName`] or [`RouteError::MissingParameter`].
    pub fn url_for<P, K, V>(
        &self,
        name: &str,
        params: P,
        query: Option<&[(&str, &str)]>,
    ) -> Result<String, RouteError>
    where
        P: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| RouteError::UnknownName(name.to_string()))?;
        let route = self
            .routes
            .get(id.0)
            .ok_or(RouteError::UnknownRoute(id.0))?;

        let params: HashMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.to_string()))
            .collect();
        let mut url = route.template.render(name, &params)?;

        if let Some(pairs) = query.filter(|q| !q.is_empty()) {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }

    pub fn push_prefix(&mut self, prefix: &str) {
        self.prefixes.push(prefix.to_string());
    }

    pub fn pop_prefix(&mut self) -> Option<String> {
        self.prefixes.pop()
    }

    /// Compose the active group prefixes with a route-relative path.
    /// The empty result collapses to `/`.
    #[must_use]
    pub fn full_path(&self, path: &str) -> String {
        let mut full = String::new();
        for part in self.prefixes.iter().map(String::as_str).chain(std::iter::once(path)) {
            let part = part.trim_matches('/');
            if !part.is_empty() {
                full.push('/');
                full.push_str(part);
            }
        }
        if full.is_empty() {
            full.push('/');
        }
        full
    }

    #[must_use]
    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.0)
    }

    #[must_use]
    pub fn route_by_name(&self, name: &str) -> Option<&Route> {
        self.names.get(name).and_then(|id| self.routes.get(id.0))
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Log the routing table, one event per route.
    pub fn dump_routes(&self) {
        info!(routes_count = self.routes.len(), "Routing table loaded");
        for (idx, route) in self.routes.iter().enumerate() {
            info!(
                route_id = idx,
                method = %route.method,
                path = %route.path,
                name = ?route.name,
                middleware = route.middleware.len(),
                "Route"
            );
        }
    }
}

/// `/users/` is matched as `/users`; the root stays `/`.
fn normalize_request_path(path: &str) -> &str {
    if path.len() > 1 {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    } else if path.is_empty() {
        "/"
    } else {
        path
    }
}
