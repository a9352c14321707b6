//! Command contract: parameters, backend execution and deferred results.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExchangeContext;
use crate::error::ExecutionError;

/// Delimiter for list parameters given as a single string.
pub const LIST_DELIMITER: char = ';';

/// Hook run by `receive` with the command result, exactly once.
pub type ResultCallback<R> = Box<dyn FnOnce(&R, &mut ExchangeContext) + Send + Sync>;

/// A single command parameter.
#[derive(Clone)]
pub enum ParameterValue {
    String(String),
    Bool(bool),
    List(Vec<String>),
    Json(Value),
    /// Backend-specific value passed through untouched
    Object(Arc<dyn Any + Send + Sync>),
}

impl ParameterValue {
    /// Wrap a backend object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        ParameterValue::Object(Arc::new(value))
    }

    fn kind(&self) -> &'static str {
        match self {
            ParameterValue::String(_) => "string",
            ParameterValue::Bool(_) => "bool",
            ParameterValue::List(_) => "list",
            ParameterValue::Json(_) => "json",
            ParameterValue::Object(_) => "object",
        }
    }
}

impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(s) => f.debug_tuple("String").field(s).finish(),
            ParameterValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            ParameterValue::List(l) => f.debug_tuple("List").field(l).finish(),
            ParameterValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ParameterValue::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<Vec<String>> for ParameterValue {
    fn from(value: Vec<String>) -> Self {
        ParameterValue::List(value)
    }
}

impl From<Value> for ParameterValue {
    fn from(value: Value) -> Self {
        ParameterValue::Json(value)
    }
}

/// Named command parameters.
///
/// String access resolves `${variable}` placeholders against the exchange
/// context at execution time.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Option<ParameterValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// String value with placeholders resolved.
    pub fn string(
        &self,
        name: &str,
        context: &ExchangeContext,
    ) -> Result<Option<String>, ExecutionError> {
        let Some(value) = self.values.get(name) else {
            return Ok(None);
        };

        let raw = match value {
            ParameterValue::String(s) => s.clone(),
            ParameterValue::Bool(b) => b.to_string(),
            ParameterValue::List(items) => items.join(&LIST_DELIMITER.to_string()),
            ParameterValue::Json(Value::String(s)) => s.clone(),
            ParameterValue::Json(v) => v.to_string(),
            ParameterValue::Object(_) => return Err(wrong_kind(name, value, "a string")),
        };

        Ok(Some(context.replace_dynamic_content(&raw)?))
    }

    /// Like [`string`](Self::string) but the parameter must be present.
    pub fn required_string(
        &self,
        name: &str,
        context: &ExchangeContext,
    ) -> Result<String, ExecutionError> {
        self.string(name, context)?
            .ok_or_else(|| ExecutionError::MissingParameter(name.to_string()))
    }

    /// Boolean value; strings must read `true` or `false` after resolution.
    pub fn bool(
        &self,
        name: &str,
        context: &ExchangeContext,
    ) -> Result<Option<bool>, ExecutionError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParameterValue::Bool(b)) => Ok(Some(*b)),
            Some(ParameterValue::Json(Value::Bool(b))) => Ok(Some(*b)),
            Some(ParameterValue::String(_)) | Some(ParameterValue::Json(Value::String(_))) => {
                let resolved = self.required_string(name, context)?;
                match resolved.trim().to_lowercase().as_str() {
                    "true" => Ok(Some(true)),
                    "false" => Ok(Some(false)),
                    other => Err(ExecutionError::InvalidParameter {
                        name: name.to_string(),
                        message: format!("expected true or false, got '{}'", other),
                    }),
                }
            }
            Some(value) => Err(wrong_kind(name, value, "a bool")),
        }
    }

    /// List value; a string is split on `delimiter`, blank items dropped.
    pub fn list(
        &self,
        name: &str,
        delimiter: char,
        context: &ExchangeContext,
    ) -> Result<Option<Vec<String>>, ExecutionError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParameterValue::List(items)) => items
                .iter()
                .map(|item| context.replace_dynamic_content(item).map_err(Into::into))
                .collect::<Result<Vec<_>, ExecutionError>>()
                .map(Some),
            Some(ParameterValue::Json(Value::Array(items))) => Ok(Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Some(ParameterValue::String(_)) | Some(ParameterValue::Json(Value::String(_))) => {
                let resolved = self.required_string(name, context)?;
                Ok(Some(
                    resolved
                        .split(delimiter)
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect(),
                ))
            }
            Some(value) => Err(wrong_kind(name, value, "a list")),
        }
    }

    /// Backend object of type `T`.
    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name) {
            Some(ParameterValue::Object(obj)) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

fn wrong_kind(name: &str, value: &ParameterValue, expected: &str) -> ExecutionError {
    ExecutionError::InvalidParameter {
        name: name.to_string(),
        message: format!("{} parameter cannot be read as {}", value.kind(), expected),
    }
}

/// Parameters, write-once result and result callback shared by every command.
pub struct CommandState<R> {
    name: String,
    parameters: Parameters,
    result: Option<R>,
    result_callback: Option<ResultCallback<R>>,
}

impl<R> CommandState<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
            result: None,
            result_callback: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_result_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&R, &mut ExchangeContext) + Send + Sync + 'static,
    {
        self.result_callback = Some(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Attach the result. Fails if one is already set.
    pub fn set_result(&mut self, result: R) -> Result<(), ExecutionError> {
        if self.result.is_some() {
            return Err(ExecutionError::ResultAlreadySet(self.name.clone()));
        }
        self.result = Some(result);
        Ok(())
    }

    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<R> {
        self.result.take()
    }

    pub fn set_result_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&R, &mut ExchangeContext) + Send + Sync + 'static,
    {
        self.result_callback = Some(Box::new(callback));
    }

    pub fn has_result_callback(&self) -> bool {
        self.result_callback.is_some()
    }

    pub fn take_result_callback(&mut self) -> Option<ResultCallback<R>> {
        self.result_callback.take()
    }
}

impl<R: fmt::Debug> fmt::Debug for CommandState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("result", &self.result)
            .field("result_callback", &self.result_callback.is_some())
            .finish()
    }
}

/// A unit of backend work executed by an endpoint's producer side.
///
/// Implementations embed a [`CommandState`] and expose it through
/// [`state`](Command::state) / [`state_mut`](Command::state_mut).
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Handle to the system the command runs against
    type Backend: Send + Sync + ?Sized;

    /// Result attached by `execute`
    type Output: Send + Sync + 'static;

    fn state(&self) -> &CommandState<Self::Output>;

    fn state_mut(&mut self) -> &mut CommandState<Self::Output>;

    /// Run the backend call and attach its result.
    async fn execute(
        &mut self,
        backend: &Self::Backend,
        context: &mut ExchangeContext,
    ) -> Result<(), ExecutionError>;

    fn name(&self) -> &str {
        self.state().name()
    }

    fn parameters(&self) -> &Parameters {
        self.state().parameters()
    }

    fn result(&self) -> Option<&Self::Output> {
        self.state().result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Capability(&'static str);

    fn context() -> ExchangeContext {
        let mut context = ExchangeContext::new();
        context.set_variable("image", "busybox");
        context.set_variable("debug", "true");
        context
    }

    #[test]
    fn test_string_parameters_resolve_placeholders() {
        let params = Parameters::new()
            .with("image", "${image}:latest")
            .with("attach-stdout", true)
            .with("replicas", json!(3));
        let context = context();

        assert_eq!(
            params.string("image", &context).unwrap().as_deref(),
            Some("busybox:latest")
        );
        assert_eq!(params.string("attach-stdout", &context).unwrap().as_deref(), Some("true"));
        assert_eq!(params.string("replicas", &context).unwrap().as_deref(), Some("3"));
        assert_eq!(params.string("missing", &context).unwrap(), None);
        assert!(matches!(
            params.required_string("missing", &context),
            Err(ExecutionError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_bool_parameters() {
        let params = Parameters::new()
            .with("tty", true)
            .with("debug", "${debug}")
            .with("privileged", "maybe");
        let context = context();

        assert_eq!(params.bool("tty", &context).unwrap(), Some(true));
        assert_eq!(params.bool("debug", &context).unwrap(), Some(true));
        assert!(matches!(
            params.bool("privileged", &context),
            Err(ExecutionError::InvalidParameter { .. })
        ));
        assert_eq!(params.bool("missing", &context).unwrap(), None);
    }

    #[test]
    fn test_list_parameters_from_list_or_string() {
        let params = Parameters::new()
            .with("cmd", "sh; -c ;echo ${image};")
            .with("env", vec!["A=1".to_string(), "IMAGE=${image}".to_string()])
            .with("ports", "tcp:80,udp:53");
        let context = context();

        assert_eq!(
            params.list("cmd", LIST_DELIMITER, &context).unwrap().unwrap(),
            vec!["sh", "-c", "echo busybox"]
        );
        assert_eq!(
            params.list("env", LIST_DELIMITER, &context).unwrap().unwrap(),
            vec!["A=1", "IMAGE=busybox"]
        );
        assert_eq!(
            params.list("ports", ',', &context).unwrap().unwrap(),
            vec!["tcp:80", "udp:53"]
        );
    }

    #[test]
    fn test_object_parameters() {
        let params = Parameters::new()
            .with("capability-add", ParameterValue::object(Capability("NET_ADMIN")));
        let context = context();

        let cap = params.object::<Capability>("capability-add").unwrap();
        assert_eq!(*cap, Capability("NET_ADMIN"));
        assert!(params.object::<String>("capability-add").is_none());
        assert!(matches!(
            params.string("capability-add", &context),
            Err(ExecutionError::InvalidParameter { .. })
        ));
        assert_eq!(format!("{:?}", params.get("capability-add").unwrap()), "Object(..)");
    }

    #[test]
    fn test_result_is_write_once() {
        let mut state: CommandState<u32> = CommandState::new("pods:list");
        assert!(state.result().is_none());

        state.set_result(42).unwrap();
        assert!(matches!(state.set_result(7), Err(ExecutionError::ResultAlreadySet(_))));
        assert_eq!(state.result(), Some(&42));
    }

    #[test]
    fn test_result_callback_taken_once() {
        let mut state: CommandState<u32> =
            CommandState::new("pods:list").with_result_callback(|result, context| {
                context.set_variable("pod_count", *result);
            });

        assert!(state.has_result_callback());
        let callback = state.take_result_callback().unwrap();
        assert!(state.take_result_callback().is_none());

        let mut context = ExchangeContext::new();
        callback(&5, &mut context);
        assert_eq!(context.variable_as::<u32>("pod_count").unwrap(), 5);
    }
}
