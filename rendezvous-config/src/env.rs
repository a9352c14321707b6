// Environment variable loading

use crate::{ConfigError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::env;

/// Reads settings from process environment variables sharing a prefix.
///
/// With prefix `RENDEZVOUS_ENDPOINT`, the variable
/// `RENDEZVOUS_ENDPOINT_TIMEOUT_MS` becomes the key `timeout_ms`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Loader for variables starting with `prefix_`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load every matching variable, keyed by its lower-cased name without the prefix
    pub fn load(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        for (key, value) in env::vars() {
            match self.prefix {
                Some(ref prefix) => {
                    if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                        let trimmed = rest.trim_start_matches('_');
                        if !trimmed.is_empty() {
                            vars.insert(trimmed.to_lowercase(), value);
                        }
                    }
                }
                None => {
                    vars.insert(key.to_lowercase(), value);
                }
            }
        }

        vars
    }

    /// Load matching variables as JSON values, numbers and booleans coerced
    pub fn load_values(&self) -> serde_json::Map<String, Value> {
        self.load()
            .into_iter()
            .map(|(key, raw)| (key, coerce_scalar(&raw)))
            .collect()
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Load and parse a variable; `Ok(None)` when it is not set
    pub fn load_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(self.full_key(key)) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: self.full_key(key),
                    message: e.to_string(),
                }),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::EnvError(e)),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Interpret a raw string as a JSON scalar where it looks like one.
pub(crate) fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Value::from(n);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
