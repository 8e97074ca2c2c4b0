use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of path/query parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum number of headers/cookies before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated name/value storage for route and query parameters.
///
/// Names use `Arc<str>`: parameter names come from the compiled route table,
/// so cloning them is an atomic increment rather than a string copy.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header / cookie storage.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Parsed request body as handed over by the runtime driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Raw(Vec<u8>),
}

impl RequestBody {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Raw(b) => b.is_empty(),
            RequestBody::Json(_) => false,
        }
    }
}

/// Inbound request descriptor.
///
/// Immutable once built; the only derivation is [`Request::with_route_params`],
/// which yields a new value carrying the parameters extracted by the router.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: ParamVec,
    headers: HeaderVec,
    cookies: HeaderVec,
    body: RequestBody,
    route_params: ParamVec,
    server: HashMap<String, String>,
}

impl Request {
    /// Start building a request. `uri` may carry a query string.
    #[must_use]
    pub fn builder(method: Method, uri: &str) -> RequestBuilder {
        RequestBuilder::new(method, uri)
    }

    /// Shorthand for a bodiless request with no headers.
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        RequestBuilder::new(method, uri).build()
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &ParamVec {
        &self.query
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn cookies(&self) -> &HeaderVec {
        &self.cookies
    }

    #[must_use]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    #[must_use]
    pub fn route_params(&self) -> &ParamVec {
        &self.route_params
    }

    #[must_use]
    pub fn server(&self) -> &HashMap<String, String> {
        &self.server
    }

    /// Get a route parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// the last occurrence is returned.
    #[inline]
    #[must_use]
    pub fn route_param(&self, name: &str) -> Option<&str> {
        lookup(&self.route_params, name)
    }

    /// Get a query parameter by name (last occurrence wins for `?a=1&a=2`).
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        lookup(&self.cookies, name)
    }

    #[must_use]
    pub fn server_var(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    /// The `host` header without any `:port` suffix, lower-cased.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        let raw = self.header("host")?.trim();
        if raw.is_empty() {
            return None;
        }
        // Bracketed IPv6 literals keep their colons.
        let host = if let Some(rest) = raw.strip_prefix('[') {
            rest.split(']').next().unwrap_or(rest)
        } else {
            raw.split(':').next().unwrap_or(raw)
        };
        Some(host.to_ascii_lowercase())
    }

    /// Route parameters as an owned map.
    /// Note: This allocates - use `route_param()` in hot paths instead
    #[must_use]
    pub fn route_params_map(&self) -> HashMap<String, String> {
        to_map(&self.route_params)
    }

    /// Note: This allocates - use `query_param()` in hot paths instead
    #[must_use]
    pub fn query_map(&self) -> HashMap<String, String> {
        to_map(&self.query)
    }

    /// Derive a copy carrying the parameters extracted by the router.
    #[must_use]
    pub fn with_route_params(&self, params: ParamVec) -> Self {
        let mut next = self.clone();
        next.route_params = params;
        next
    }
}

fn lookup<'a>(pairs: &'a [(Arc<str>, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rfind(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v.as_str())
}

fn to_map(pairs: &[(Arc<str>, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Builder used by runtime drivers (and tests) to assemble a [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: ParamVec,
    headers: HeaderVec,
    cookies: Option<HeaderVec>,
    body: RequestBody,
    server: HashMap<String, String>,
}

impl RequestBuilder {
    fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p, parse_query_string(q)),
            None => (uri, ParamVec::new()),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderVec::new(),
            cookies: None,
            body: RequestBody::Empty,
            server: HashMap::new(),
        }
    }

    /// Header names are stored lower-cased.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: &str, value: impl Into<String>) -> Self {
        self.cookies
            .get_or_insert_with(HeaderVec::new)
            .push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn raw_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Raw(body.into());
        self
    }

    #[must_use]
    pub fn server_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.server.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Request {
        let cookies = match self.cookies {
            Some(c) => c,
            None => parse_cookies(&self.headers),
        };
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            cookies,
            body: self.body,
            route_params: ParamVec::new(),
            server: self.server,
        }
    }
}

/// Normalise a raw method token (`"get"`, `"Post"`) to an upper-case [`Method`].
#[must_use]
pub fn parse_method(raw: &str) -> Option<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }
    Method::from_bytes(upper.as_bytes()).ok()
}

/// Derive the cookie map from a `cookie` header.
#[must_use]
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        .flat_map(|(_, c)| c.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// Parse a raw query string (without the leading `?`), URL-decoding names and values.
#[must_use]
pub fn parse_query_string(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}
