// Mock backend, command and converter for endpoint tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rendezvous_core::message::headers;
use rendezvous_core::{
    Command, CommandState, EndpointConfig, EndpointError, EndpointResult, ExchangeContext,
    ExecutionError, Message, MessageConverter, ParameterValue,
};
use serde_json::Value;

/// Header naming the context variable that receives the command result.
pub const RESULT_VARIABLE_HEADER: &str = "rendezvous_result_variable";

/// One call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub parameters: BTreeMap<String, String>,
}

/// In-memory backend recording every command it executes.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, String>>,
    queued_failures: Mutex<VecDeque<String>>,
    latency: Mutex<Option<Duration>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `result` whenever `command` is executed.
    pub fn with_response(self, command: &str, result: Value) -> Self {
        self.responses.lock().insert(command.to_string(), result);
        self
    }

    /// Fail every execution of `command`.
    pub fn with_failure(self, command: &str, message: &str) -> Self {
        self.failures
            .lock()
            .insert(command.to_string(), message.to_string());
        self
    }

    /// Delay every execution by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Fail the next execution, whatever the command.
    pub fn fail_next(&self, message: &str) {
        self.queued_failures.lock().push_back(message.to_string());
    }

    /// Record a call and produce its canned result.
    ///
    /// Commands without a canned response echo their parameters back.
    pub async fn invoke(
        &self,
        command: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<Value, ExecutionError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.calls.lock().push(RecordedCall {
            command: command.to_string(),
            parameters: parameters.clone(),
        });

        if let Some(message) = self.queued_failures.lock().pop_front() {
            return Err(ExecutionError::backend(message));
        }
        if let Some(message) = self.failures.lock().get(command) {
            return Err(ExecutionError::backend(message));
        }

        Ok(self
            .responses
            .lock()
            .get(command)
            .cloned()
            .unwrap_or_else(|| serde_json::to_value(&parameters).unwrap_or(Value::Null)))
    }

    /// Get the number of calls
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Check if a command was executed
    pub fn was_called(&self, command: &str) -> bool {
        self.calls.lock().iter().any(|call| call.command == command)
    }

    /// Clear all recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

/// Command executed against [`MockBackend`], resolving every parameter first.
pub struct MockCommand {
    state: CommandState<Value>,
}

impl MockCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: CommandState::new(name),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.state.parameters_mut().insert(name, value);
        self
    }

    /// Store the result in `variable` when the reply is received.
    pub fn with_result_variable(mut self, variable: impl Into<String>) -> Self {
        let variable = variable.into();
        self.state.set_result_callback(move |result: &Value, context| {
            context.set_variable(variable, result.clone());
        });
        self
    }
}

#[async_trait]
impl Command for MockCommand {
    type Backend = MockBackend;
    type Output = Value;

    fn state(&self) -> &CommandState<Value> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState<Value> {
        &mut self.state
    }

    async fn execute(
        &mut self,
        backend: &MockBackend,
        context: &mut ExchangeContext,
    ) -> Result<(), ExecutionError> {
        let mut resolved = BTreeMap::new();
        for (name, _) in self.parameters().iter() {
            if let Some(value) = self.parameters().string(name, context)? {
                resolved.insert(name.to_string(), value);
            }
        }

        let result = backend.invoke(self.name(), resolved).await?;
        self.state.set_result(result)
    }
}

/// Builds a [`MockCommand`] from a message and echoes its result back.
///
/// The command name is read from the `rendezvous_command` header, the
/// parameters from the fields of an object payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockConverter;

impl MessageConverter<MockCommand> for MockConverter {
    fn convert_outbound(
        &self,
        message: &Message,
        _config: &EndpointConfig,
        _context: &mut ExchangeContext,
    ) -> EndpointResult<MockCommand> {
        let name = message.get_header(headers::COMMAND).ok_or_else(|| {
            EndpointError::Conversion(format!(
                "message {} has no '{}' header",
                message.id,
                headers::COMMAND
            ))
        })?;

        let mut command = MockCommand::new(name);
        match &message.payload {
            Value::Object(fields) => {
                for (field, value) in fields {
                    let value = match value {
                        Value::String(s) => ParameterValue::String(s.clone()),
                        Value::Bool(b) => ParameterValue::Bool(*b),
                        other => ParameterValue::Json(other.clone()),
                    };
                    command = command.with_parameter(field, value);
                }
            }
            Value::Null => {}
            other => {
                return Err(EndpointError::Conversion(format!(
                    "expected an object payload, got {}",
                    other
                )));
            }
        }

        if let Some(variable) = message.get_header(RESULT_VARIABLE_HEADER) {
            command = command.with_result_variable(variable);
        }
        Ok(command)
    }

    fn convert_inbound(
        &self,
        command: MockCommand,
        _config: &EndpointConfig,
        _context: &mut ExchangeContext,
    ) -> EndpointResult<Message> {
        let name = command.name().to_string();
        let mut state = command.state;
        let payload = state.take_result().unwrap_or(Value::Null);
        Ok(Message::new(payload).header(headers::COMMAND, name))
    }
}

/// Build an outbound message for `command` with `payload` as parameters.
pub fn command_message(command: &str, payload: Value) -> Message {
    Message::new(payload).header(headers::COMMAND, command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_backend_records_and_echoes() {
        let backend = MockBackend::new();
        let mut params = BTreeMap::new();
        params.insert("image".to_string(), "busybox".to_string());

        let result = backend.invoke("containers:create", params).await.unwrap();
        assert_eq!(result, json!({ "image": "busybox" }));
        assert_eq!(backend.call_count(), 1);
        assert!(backend.was_called("containers:create"));

        backend.clear_calls();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failures() {
        let backend = MockBackend::new()
            .with_failure("pods:delete", "forbidden")
            .with_response("pods:list", json!(["a", "b"]));

        assert!(backend.invoke("pods:delete", BTreeMap::new()).await.is_err());
        assert_eq!(
            backend.invoke("pods:list", BTreeMap::new()).await.unwrap(),
            json!(["a", "b"])
        );

        backend.fail_next("connection reset");
        let err = backend.invoke("pods:list", BTreeMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend call failed: connection reset");
        assert!(backend.invoke("pods:list", BTreeMap::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_command_resolves_parameters() {
        let backend = MockBackend::new();
        let mut context = ExchangeContext::new();
        context.set_variable("tag", "1.36");

        let mut command = MockCommand::new("images:pull")
            .with_parameter("image", "busybox:${tag}")
            .with_parameter("quiet", true);
        command.execute(&backend, &mut context).await.unwrap();

        assert_eq!(
            command.result(),
            Some(&json!({ "image": "busybox:1.36", "quiet": "true" }))
        );
    }

    #[test]
    fn test_converter_requires_command_header() {
        let mut context = ExchangeContext::new();
        let config = EndpointConfig::default();

        let err = MockConverter
            .convert_outbound(&Message::new(json!({})), &config, &mut context)
            .err()
            .unwrap();
        assert!(matches!(err, EndpointError::Conversion(_)));

        let command = MockConverter
            .convert_outbound(
                &command_message("images:pull", json!({ "image": "alpine" }))
                    .header(RESULT_VARIABLE_HEADER, "pulled"),
                &config,
                &mut context,
            )
            .unwrap();
        assert_eq!(command.name(), "images:pull");
        assert!(command.parameters().contains("image"));
        assert!(command.state().has_result_callback());
    }

    #[test]
    fn test_converter_rejects_scalar_payload() {
        let mut context = ExchangeContext::new();
        let result = MockConverter.convert_outbound(
            &command_message("images:pull", json!(42)),
            &EndpointConfig::default(),
            &mut context,
        );
        assert!(matches!(result, Err(EndpointError::Conversion(_))));
    }
}
