//! Path template compilation.
//!
//! `/users/{id}/posts/{post?}` compiles to the anchored pattern
//! `^/users/([^/]+)/posts(?:/([^/]+))?$`: a trailing optional parameter makes
//! its preceding separator and its value optional as one unit.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use super::RouteError;
use crate::server::ParamVec;

/// One token of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, matched exactly (slashes included).
    Static(String),
    /// `{name}` or, when `optional`, `{name?}`.
    Param { name: Arc<str>, optional: bool },
}

/// A compiled path template: segment list plus anchored matcher.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

impl PathTemplate {
    /// Compile `path` into segments and a matcher.
    ///
    /// # Errors
    ///
    /// Rejects unclosed or empty braces, duplicate parameter names, and an
    /// optional parameter anywhere but the final `/{name?}` position.
    pub fn compile(path: &str) -> Result<Self, RouteError> {
        let segments = tokenize(path)?;

        let mut param_names: Vec<Arc<str>> = Vec::new();
        for (idx, seg) in segments.iter().enumerate() {
            if let Segment::Param { name, optional } = seg {
                if param_names.iter().any(|n| n == name) {
                    return Err(invalid(path, format!("duplicate parameter '{name}'")));
                }
                if *optional {
                    let is_last = idx + 1 == segments.len();
                    let after_slash = matches!(
                        idx.checked_sub(1).and_then(|i| segments.get(i)),
                        Some(Segment::Static(s)) if s.ends_with('/')
                    );
                    if !is_last || !after_slash {
                        return Err(invalid(
                            path,
                            format!("optional parameter '{name}' must be the trailing segment"),
                        ));
                    }
                }
                param_names.push(Arc::clone(name));
            }
        }

        let pattern = build_pattern(&segments);
        let regex = Regex::new(&pattern)
            .map_err(|e| invalid(path, format!("pattern did not compile: {e}")))?;

        Ok(Self {
            source: path.to_string(),
            segments,
            regex,
            param_names,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Match `path` and extract percent-decoded parameters.
    ///
    /// An omitted optional parameter is absent from the result, not empty.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(val) = caps.get(i + 1) {
                let raw = val.as_str();
                let decoded = urlencoding::decode(raw)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                params.push((Arc::clone(name), decoded));
            }
        }
        Some(params)
    }

    /// Rebuild a literal path from parameter values.
    ///
    /// # Errors
    ///
    /// [`RouteError::MissingParameter`] when a required parameter has no value.
    pub fn render(&self, route_name: &str, params: &HashMap<String, String>) -> Result<String, RouteError> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for seg in &self.segments {
            match seg {
                Segment::Static(text) => out.push_str(text),
                Segment::Param { name, optional } => match params.get(name.as_ref()) {
                    Some(value) => out.push_str(&urlencoding::encode(value)),
                    None if *optional => {
                        // Drop the separator that belonged to the omitted value.
                        if out.len() > 1 && out.ends_with('/') {
                            out.pop();
                        }
                    }
                    None => {
                        return Err(RouteError::MissingParameter {
                            route: route_name.to_string(),
                            param: name.to_string(),
                        })
                    }
                },
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

fn invalid(path: &str, reason: String) -> RouteError {
    RouteError::InvalidTemplate {
        path: path.to_string(),
        reason,
    }
}

fn tokenize(path: &str) -> Result<Vec<Segment>, RouteError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(invalid(path, "unclosed '{'".to_string()));
                }
                let (name, optional) = match inner.strip_suffix('?') {
                    Some(n) => (n.trim(), true),
                    None => (inner.trim(), false),
                };
                if name.is_empty() || name.contains(['/', '{']) {
                    return Err(invalid(path, format!("invalid parameter name '{inner}'")));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Static(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Param {
                    name: Arc::from(name),
                    optional,
                });
            }
            '}' => return Err(invalid(path, "unmatched '}'".to_string())),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Static(literal));
    }
    Ok(segments)
}

fn build_pattern(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "^/$".to_string();
    }
    let mut pattern = String::with_capacity(64);
    pattern.push('^');
    let last = segments.len() - 1;
    for (idx, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Static(text) => {
                // The separator before a trailing optional parameter is emitted with it.
                let text: &str = match segments.get(idx + 1) {
                    Some(Segment::Param { optional: true, .. }) => {
                        text.strip_suffix('/').unwrap_or(text.as_str())
                    }
                    _ => text.as_str(),
                };
                pattern.push_str(&regex::escape(text));
            }
            Segment::Param { optional: false, .. } => pattern.push_str("([^/]+)"),
            Segment::Param { optional: true, .. } => {
                pattern.push_str("(?:/([^/]+))?");
                // `/{page?}` alone must still accept the bare root.
                if idx == last && pattern == "^(?:/([^/]+))?" {
                    pattern.push_str("/?");
                }
            }
        }
    }
    pattern.push('$');
    pattern
}
