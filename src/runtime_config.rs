//! # Runtime Configuration Module
//!
//! Kernel settings loaded from YAML or from environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `BRRTK_DEBUG` | `debug` | `false` |
//! | `BRRTK_EXECUTION_MODEL` | `execution_model` (`process` / `cooperative`) | `cooperative` |
//! | `BRRTK_REQUEST_ID_HEADER` | `request_id_header` | `x-request-id` |
//! | `BRRTK_STACK_SIZE` | `stack_size` (decimal or `0x` hex) | `0x10000` |
//!
//! ## Usage
//!
//! ```rust
//! use brrtkernel::runtime_config::{ExecutionModel, KernelConfig};
//!
//! let config = KernelConfig::from_yaml_str("debug: true\nexecution_model: process\n").unwrap();
//! assert!(config.debug);
//! assert_eq!(config.execution_model, ExecutionModel::Process);
//! assert_eq!(config.request_id_header, "x-request-id");
//! ```
//!
//! Stack size bounds the memory of each request coroutine:
//! total = stack_size × concurrent requests. Handlers with deep call chains
//! need more than the default.

use std::env;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// How requests are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionModel {
    /// One request per process; ambient state lives in the global slot.
    Process,
    /// Many requests interleaved on coroutines; each gets its own context id.
    #[default]
    Cooperative,
}

impl ExecutionModel {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "process" => Some(Self::Process),
            "cooperative" | "coroutine" => Some(Self::Cooperative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Attach diagnostic fields to error bodies.
    pub debug: bool,
    pub execution_model: ExecutionModel,
    /// Header read for a caller-supplied request id and stamped on responses.
    pub request_id_header: String,
    /// Coroutine stack size in bytes for [`CoroutineWorker`](crate::worker::CoroutineWorker).
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub stack_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            debug: false,
            execution_model: ExecutionModel::default(),
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl KernelConfig {
    /// Load configuration from environment variables. Unset or unparsable
    /// values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("BRRTK_DEBUG") {
            config.debug = parse_flag(&val);
        }
        if let Some(model) = env::var("BRRTK_EXECUTION_MODEL")
            .ok()
            .and_then(|v| ExecutionModel::parse(&v))
        {
            config.execution_model = model;
        }
        if let Ok(header) = env::var("BRRTK_REQUEST_ID_HEADER") {
            let header = header.trim().to_ascii_lowercase();
            if !header.is_empty() {
                config.request_id_header = header;
            }
        }
        if let Some(size) = env::var("BRRTK_STACK_SIZE")
            .ok()
            .and_then(|v| parse_stack_size(&v))
        {
            config.stack_size = size;
        }
        config
    }

    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml).context("invalid kernel config")?;
        config.request_id_header = config.request_id_header.to_ascii_lowercase();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Decimal or `0x`-prefixed hexadecimal.
#[must_use]
pub fn parse_stack_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn deserialize_stack_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(usize),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => parse_stack_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_size_formats() {
        assert_eq!(parse_stack_size("0x8000"), Some(0x8000));
        assert_eq!(parse_stack_size("32768"), Some(32768));
        assert_eq!(parse_stack_size("lots"), None);
    }

    #[test]
    fn test_yaml_defaults_and_hex() {
        let config = KernelConfig::from_yaml_str("stack_size: \"0x4000\"\nrequest_id_header: X-Trace-Id\n")
            .unwrap();
        assert_eq!(config.stack_size, 0x4000);
        assert_eq!(config.request_id_header, "x-trace-id");
        assert!(!config.debug);
        assert_eq!(config.execution_model, ExecutionModel::Cooperative);
    }

    #[test]
    fn test_yaml_rejects_unknown_model() {
        assert!(KernelConfig::from_yaml_str("execution_model: threads\n").is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debug: true\nexecution_model: process\nstack_size: 65536").unwrap();
        let config = KernelConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.execution_model, ExecutionModel::Process);
        assert_eq!(config.stack_size, 65536);

        assert!(KernelConfig::from_yaml_file("/definitely/not/here.yaml").is_err());
    }
}
