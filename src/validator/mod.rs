//! # Validator Module
//!
//! Declarative input validation with pipe-delimited rule expressions such as
//! `"required|email"` or `"integer|between:1,100"`.
//!
//! Routes attach a [`RuleSet`] and a [`ValidationTarget`]; the kernel runs
//! the rules before the handler and turns failures into a 422 response whose
//! `errors` object maps each failing field to one message.
//!
//! ## Rules
//!
//! | Rule | Meaning |
//! |------|---------|
//! | `required` | present and non-empty |
//! | `optional` | skip remaining rules when empty |
//! | `nullable` | skip remaining rules when `null` |
//! | `string`, `integer`, `number`, `numeric`, `boolean`, `array` | type checks |
//! | `email`, `url`, `uuid`, `date`, `alpha`, `alpha_num` | format checks |
//! | `min:n`, `max:n`, `length:n`, `between:a,b` | size bounds |
//! | `in:a,b,c` | membership |
//! | `regex:pattern` | anchored full match; must be the last rule |
//!
//! Size rules measure numbers by value, strings by character count and arrays
//! by item count. A string is measured as a number only when the field also
//! declares `integer`, `number` or `numeric` and the string parses.

mod core;
mod rules;

use serde::Deserialize;
use thiserror::Error;

pub use self::core::{validate, Validator};
pub use self::rules::{measure, parse_rules, Rule, Size};

use crate::error::KernelError;

/// Which part of the request a route's rules read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationTarget {
    #[default]
    Body,
    Query,
    Params,
}

/// Ordered `field → rule expression` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<(String, String)>,
}

impl RuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the expression for `field`.
    #[must_use]
    pub fn field(mut self, field: &str, expr: &str) -> Self {
        match self.rules.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = expr.to_string(),
            None => self.rules.push((field.to_string(), expr.to_string())),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(f, e)| (f.as_str(), e.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(RuleSet::new(), |set, (f, e)| set.field(f.as_ref(), e.as_ref()))
    }
}

/// A rule expression that cannot be evaluated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationRuleError {
    #[error("unknown validation rule '{0}'")]
    UnknownRule(String),
    #[error("invalid argument '{argument}' for rule '{rule}'")]
    InvalidArgument { rule: String, argument: String },
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl From<ValidationRuleError> for KernelError {
    fn from(err: ValidationRuleError) -> Self {
        KernelError::Configuration(err.to_string())
    }
}
