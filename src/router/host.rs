//! Host constraints.
//!
//! - No constraint matches every host.
//! - Exact names and name lists compare case-insensitively.
//! - A constraint written as `/.../` is a regular expression tested against
//!   the host name (case-insensitive).
//!
//! The request host is always compared without its port.

use regex::{Regex, RegexBuilder};

use super::RouteError;

#[derive(Debug, Clone)]
pub enum HostConstraint {
    Exact(String),
    OneOf(Vec<String>),
    Pattern(Regex),
}

impl HostConstraint {
    /// Parse a single constraint string.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidHostPattern`] when a `/.../` pattern does not compile.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let inner = &raw[1..raw.len() - 1];
            let regex = RegexBuilder::new(inner)
                .case_insensitive(true)
                .build()
                .map_err(|e| RouteError::InvalidHostPattern {
                    pattern: raw.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok(HostConstraint::Pattern(regex));
        }
        Ok(HostConstraint::Exact(raw.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn one_of<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        HostConstraint::OneOf(
            hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Whether a request for `host` (already port-stripped) is eligible.
    /// A request without a host never satisfies a constraint.
    #[must_use]
    pub fn matches(&self, host: Option<&str>) -> bool {
        let Some(host) = host else {
            return false;
        };
        match self {
            HostConstraint::Exact(expected) => expected.eq_ignore_ascii_case(host),
            HostConstraint::OneOf(list) => list.iter().any(|h| h.eq_ignore_ascii_case(host)),
            HostConstraint::Pattern(re) => re.is_match(host),
        }
    }
}
