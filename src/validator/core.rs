use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::rules::{parse_rules, Rule};
use super::{RuleSet, ValidationRuleError};
use crate::error::{KernelError, KernelResult};

/// Evaluates rule expressions against one input map and collects the first
/// failure message per field.
///
/// ```rust
/// use brrtkernel::validator::Validator;
/// use serde_json::json;
///
/// let data = json!({"email": "not-an-email", "age": "17"});
/// let mut v = Validator::new(data.as_object().unwrap());
/// v.field("email", "required|email").unwrap();
/// v.field("age", "integer|min:18").unwrap();
/// v.field("nickname", "string|max:10").unwrap();
///
/// assert!(!v.is_valid());
/// assert_eq!(v.errors()["age"], "The age field must be at least 18.");
/// assert!(!v.errors().contains_key("nickname"));
/// ```
pub struct Validator<'a> {
    data: &'a Map<String, Value>,
    errors: BTreeMap<String, String>,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(data: &'a Map<String, Value>) -> Self {
        Self {
            data,
            errors: BTreeMap::new(),
        }
    }

    /// Check `field` against the pipe-delimited `expr`.
    ///
    /// Rules run left to right and stop at the first failure, which becomes the
    /// field's message. A field absent from the data is skipped unless the
    /// expression contains `required`; `optional` also skips empty values and
    /// `nullable` skips `null`.
    ///
    /// # Errors
    ///
    /// A malformed expression. This is a configuration fault, not a
    /// validation failure.
    pub fn field(&mut self, field: &str, expr: &str) -> Result<&mut Self, ValidationRuleError> {
        let rules = parse_rules(expr)?;
        if let Some(message) = evaluate(field, self.data.get(field), &rules) {
            debug!(field = %field, message = %message, "Validation rule failed");
            self.errors.entry(field.to_string()).or_insert(message);
        }
        Ok(self)
    }

    /// Apply every entry of `rules` in order.
    ///
    /// # Errors
    ///
    /// The first malformed expression.
    pub fn apply(&mut self, rules: &RuleSet) -> Result<&mut Self, ValidationRuleError> {
        for (field, expr) in rules.iter() {
            self.field(field, expr)?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }

    /// Convert the collected outcome into a kernel result.
    ///
    /// # Errors
    ///
    /// [`KernelError::ValidationFailed`] carrying every field message.
    pub fn validate(self) -> KernelResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(KernelError::ValidationFailed {
                errors: self.errors,
            })
        }
    }
}

/// Validate `data` against `rules` in one call.
///
/// # Errors
///
/// [`KernelError::Configuration`] for malformed rules, otherwise
/// [`KernelError::ValidationFailed`] when any field fails.
pub fn validate(data: &Map<String, Value>, rules: &RuleSet) -> KernelResult<()> {
    let mut validator = Validator::new(data);
    validator.apply(rules)?;
    validator.validate()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn evaluate(field: &str, value: Option<&Value>, rules: &[Rule]) -> Option<String> {
    let required = rules.iter().any(|r| matches!(r, Rule::Required));
    let optional = rules.iter().any(|r| matches!(r, Rule::Optional));
    let nullable = rules.iter().any(|r| matches!(r, Rule::Nullable));
    let numeric_hint = rules.iter().any(Rule::is_numeric_type);

    let Some(value) = value else {
        return required.then(|| format!("The {field} field is required."));
    };
    if required && is_empty(value) {
        return Some(format!("The {field} field is required."));
    }
    if optional && is_empty(value) {
        return None;
    }
    if nullable && value.is_null() {
        return None;
    }

    rules
        .iter()
        .find_map(|rule| rule.check(field, value, numeric_hint))
}
