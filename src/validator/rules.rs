//! Rule grammar and per-rule evaluation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::ValidationRuleError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email regex is valid")
});

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid regex is valid")
});

const BOOLEAN_TOKENS: [&str; 8] = ["true", "false", "1", "0", "yes", "no", "on", "off"];

/// One parsed rule of a field's rule expression.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Optional,
    Nullable,
    String,
    Integer,
    Number,
    Numeric,
    Boolean,
    Array,
    Email,
    Url,
    Alpha,
    AlphaNum,
    Uuid,
    Date,
    Min(f64),
    Max(f64),
    Length(f64),
    Between(f64, f64),
    In(Vec<String>),
    Regex(Regex),
}

/// Split a pipe-delimited expression into rules.
///
/// `regex:` consumes the remainder of the expression so patterns may contain
/// `|`; it therefore has to be the last rule of a field.
///
/// # Errors
///
/// Unknown rule names, malformed arguments and patterns that do not compile.
pub fn parse_rules(expr: &str) -> Result<Vec<Rule>, ValidationRuleError> {
    let mut rules = Vec::new();
    let mut rest = expr.trim();
    while !rest.is_empty() {
        if let Some(pattern) = rest.strip_prefix("regex:") {
            rules.push(Rule::Regex(compile_pattern(pattern)?));
            break;
        }
        let (token, tail) = match rest.split_once('|') {
            Some((t, r)) => (t.trim(), r.trim()),
            None => (rest, ""),
        };
        rest = tail;
        if !token.is_empty() {
            rules.push(parse_rule(token)?);
        }
    }
    Ok(rules)
}

fn parse_rule(token: &str) -> Result<Rule, ValidationRuleError> {
    let (name, arg) = match token.split_once(':') {
        Some((n, a)) => (n.trim(), Some(a.trim())),
        None => (token, None),
    };
    let rule = match name {
        "required" => Rule::Required,
        "optional" | "sometimes" => Rule::Optional,
        "nullable" => Rule::Nullable,
        "string" => Rule::String,
        "integer" | "int" => Rule::Integer,
        "number" | "float" => Rule::Number,
        "numeric" => Rule::Numeric,
        "boolean" | "bool" => Rule::Boolean,
        "array" => Rule::Array,
        "email" => Rule::Email,
        "url" => Rule::Url,
        "alpha" => Rule::Alpha,
        "alpha_num" => Rule::AlphaNum,
        "uuid" => Rule::Uuid,
        "date" => Rule::Date,
        "min" => Rule::Min(number_arg(name, arg)?),
        "max" => Rule::Max(number_arg(name, arg)?),
        "length" | "size" => Rule::Length(number_arg(name, arg)?),
        "between" => {
            let raw = arg.unwrap_or_default();
            let (lo, hi) = raw
                .split_once(',')
                .ok_or_else(|| bad_arg(name, raw))?;
            Rule::Between(number_arg(name, Some(lo.trim()))?, number_arg(name, Some(hi.trim()))?)
        }
        "in" => {
            let raw = arg.ok_or_else(|| bad_arg(name, ""))?;
            Rule::In(raw.split(',').map(|s| s.trim().to_string()).collect())
        }
        other => return Err(ValidationRuleError::UnknownRule(other.to_string())),
    };
    Ok(rule)
}

fn number_arg(rule: &str, arg: Option<&str>) -> Result<f64, ValidationRuleError> {
    let raw = arg.unwrap_or_default();
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| bad_arg(rule, raw))
}

fn bad_arg(rule: &str, arg: &str) -> ValidationRuleError {
    ValidationRuleError::InvalidArgument {
        rule: rule.to_string(),
        argument: arg.to_string(),
    }
}

/// Accepts `pattern` or `/pattern/`; always anchored for a full match.
fn compile_pattern(raw: &str) -> Result<Regex, ValidationRuleError> {
    let raw = raw.trim();
    let inner = if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    Regex::new(&format!("^(?:{inner})$")).map_err(|e| ValidationRuleError::InvalidPattern {
        pattern: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Magnitude used by the size rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Number(f64),
    Chars(usize),
    Items(usize),
}

impl Size {
    fn value(self) -> f64 {
        match self {
            Size::Number(n) => n,
            Size::Chars(n) | Size::Items(n) => n as f64,
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Size::Number(_) => "",
            Size::Chars(_) => " characters",
            Size::Items(_) => " items",
        }
    }
}

/// Measure a value. Strings count as numbers only when the field declared a
/// numeric type and the string parses.
#[must_use]
pub fn measure(value: &Value, numeric_hint: bool) -> Size {
    match value {
        Value::Number(n) => Size::Number(n.as_f64().unwrap_or_default()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if numeric_hint && n.is_finite() => Size::Number(n),
            _ => Size::Chars(s.chars().count()),
        },
        Value::Array(a) => Size::Items(a.len()),
        Value::Object(o) => Size::Items(o.len()),
        Value::Bool(b) => Size::Number(if *b { 1.0 } else { 0.0 }),
        Value::Null => Size::Chars(0),
    }
}

/// Render a value the way `in:` and `regex:` compare it.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Rule {
    /// Evaluate against a present value. `None` means the rule passed.
    #[must_use]
    pub fn check(&self, field: &str, value: &Value, numeric_hint: bool) -> Option<String> {
        let ok = match self {
            Rule::Required | Rule::Optional | Rule::Nullable => true,
            Rule::String => value.is_string(),
            Rule::Integer => is_integer(value),
            Rule::Number | Rule::Numeric => is_number(value),
            Rule::Boolean => is_boolean(value),
            Rule::Array => value.is_array() || value.is_object(),
            Rule::Email => value.as_str().is_some_and(|s| EMAIL_RE.is_match(s)),
            Rule::Url => value.as_str().is_some_and(is_url),
            Rule::Alpha => value
                .as_str()
                .is_some_and(|s| !s.is_empty() && s.chars().all(char::is_alphabetic)),
            Rule::AlphaNum => value
                .as_str()
                .is_some_and(|s| !s.is_empty() && s.chars().all(char::is_alphanumeric)),
            Rule::Uuid => value.as_str().is_some_and(|s| UUID_RE.is_match(s)),
            Rule::Date => value.as_str().is_some_and(is_date),
            Rule::Min(min) => {
                let size = measure(value, numeric_hint);
                if size.value() >= *min {
                    true
                } else {
                    return Some(match size {
                        Size::Items(_) => {
                            format!("The {field} field must have at least {} items.", fmt_num(*min))
                        }
                        _ => format!(
                            "The {field} field must be at least {}{}.",
                            fmt_num(*min),
                            size.unit()
                        ),
                    });
                }
            }
            Rule::Max(max) => {
                let size = measure(value, numeric_hint);
                if size.value() <= *max {
                    true
                } else {
                    return Some(match size {
                        Size::Items(_) => format!(
                            "The {field} field must not have more than {} items.",
                            fmt_num(*max)
                        ),
                        _ => format!(
                            "The {field} field must not be greater than {}{}.",
                            fmt_num(*max),
                            size.unit()
                        ),
                    });
                }
            }
            Rule::Length(len) => {
                let size = measure(value, numeric_hint);
                if (size.value() - *len).abs() < f64::EPSILON {
                    true
                } else {
                    return Some(format!(
                        "The {field} field must be {}{}.",
                        fmt_num(*len),
                        size.unit()
                    ));
                }
            }
            Rule::Between(lo, hi) => {
                let size = measure(value, numeric_hint);
                if size.value() >= *lo && size.value() <= *hi {
                    true
                } else {
                    return Some(format!(
                        "The {field} field must be between {} and {}{}.",
                        fmt_num(*lo),
                        fmt_num(*hi),
                        size.unit()
                    ));
                }
            }
            Rule::In(options) => {
                let s = stringify(value);
                if options.iter().any(|o| *o == s) {
                    true
                } else {
                    return Some(format!("The selected {field} is invalid."));
                }
            }
            Rule::Regex(re) => re.is_match(&stringify(value)),
        };
        if ok {
            None
        } else {
            Some(self.message(field))
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            Rule::Required => format!("The {field} field is required."),
            Rule::String => format!("The {field} field must be a string."),
            Rule::Integer => format!("The {field} field must be an integer."),
            Rule::Number | Rule::Numeric => format!("The {field} field must be a number."),
            Rule::Boolean => format!("The {field} field must be true or false."),
            Rule::Array => format!("The {field} field must be an array."),
            Rule::Email => format!("The {field} field must be a valid email address."),
            Rule::Url => format!("The {field} field must be a valid URL."),
            Rule::Alpha => format!("The {field} field must only contain letters."),
            Rule::AlphaNum => format!("The {field} field must only contain letters and numbers."),
            Rule::Uuid => format!("The {field} field must be a valid UUID."),
            Rule::Date => format!("The {field} field must be a valid date."),
            _ => format!("The {field} field format is invalid."),
        }
    }

    /// Whether this rule declares a numeric type for the field.
    #[must_use]
    pub fn is_numeric_type(&self) -> bool {
        matches!(self, Rule::Integer | Rule::Number | Rule::Numeric)
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_number(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0 | 1)),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            BOOLEAN_TOKENS.contains(&s.as_str())
        }
        _ => false,
    }
}

fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|u| u.has_host())
}

fn is_date(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(y), Some(m), Some(d), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return false;
    }
    let (Ok(y), Ok(m), Ok(d)) = (y.parse::<u32>(), m.parse::<u32>(), d.parse::<u32>()) else {
        return false;
    };
    let leap = (y % 4 == 0 && y % 100 != 0) || y % 400 == 0;
    let days = match m {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&d)
}
