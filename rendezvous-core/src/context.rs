//! Per-test exchange context.
//!
//! One context belongs to exactly one test execution. It carries the test's
//! variables and, per endpoint, the correlation key of the reply that test
//! is waiting for, so that a `send` and a later `receive` issued from
//! different steps of the same test find each other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::correlator::{CorrelationKey, CorrelationName};
use crate::error::ContextError;

/// Variables and active correlation keys of one test execution.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    id: Uuid,
    created_at: DateTime<Utc>,
    variables: HashMap<String, Value>,
    correlation_keys: HashMap<CorrelationName, CorrelationKey>,
}

impl ExchangeContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            variables: HashMap::new(),
            correlation_keys: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // --- variables ---------------------------------------------------------

    /// Set a variable, returning the previous value.
    pub fn set_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.variables.insert(name.into(), value.into())
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Deserialize a variable into `T`.
    pub fn variable_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, ContextError> {
        let value = self
            .variables
            .get(name)
            .ok_or_else(|| ContextError::UnknownVariable(name.to_string()))?;

        serde_json::from_value(value.clone()).map_err(|e| ContextError::InvalidVariable {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Replace every `${name}` placeholder with the variable's value.
    ///
    /// String variables are inserted verbatim, anything else as JSON text.
    /// An unterminated `${` is kept literally.
    pub fn replace_dynamic_content(&self, input: &str) -> Result<String, ContextError> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start + 2..].find('}') else {
                break;
            };

            output.push_str(&rest[..start]);
            let name = &rest[start + 2..start + 2 + len];
            match self.variables.get(name) {
                Some(Value::String(s)) => output.push_str(s),
                Some(other) => output.push_str(&other.to_string()),
                None => return Err(ContextError::UnknownVariable(name.to_string())),
            }
            rest = &rest[start + 3 + len..];
        }

        output.push_str(rest);
        Ok(output)
    }

    // --- correlation slots -------------------------------------------------

    /// Record the in-flight key for a slot, returning the key it replaces.
    pub fn save_correlation_key(
        &mut self,
        name: CorrelationName,
        key: CorrelationKey,
    ) -> Option<CorrelationKey> {
        self.correlation_keys.insert(name, key)
    }

    pub fn correlation_key(&self, name: &CorrelationName) -> Option<&CorrelationKey> {
        self.correlation_keys.get(name)
    }

    /// Clear a slot, returning its key.
    pub fn take_correlation_key(&mut self, name: &CorrelationName) -> Option<CorrelationKey> {
        self.correlation_keys.remove(name)
    }

    /// Every slot that still has a key.
    pub fn active_correlation_keys(
        &self,
    ) -> impl Iterator<Item = (&CorrelationName, &CorrelationKey)> {
        self.correlation_keys.iter()
    }
}

impl Default for ExchangeContext {
    fn default() -> Self {
        Self::new()
    }
}
