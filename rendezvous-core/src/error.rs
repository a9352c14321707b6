//! Error types for correlation and endpoint operations.

use std::time::Duration;

use rendezvous_config::ConfigError;
use thiserror::Error;

/// Result type for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Errors raised while reading or resolving exchange context variables.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A `${name}` placeholder referenced a variable that was never set
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A variable exists but does not have the requested shape
    #[error("Invalid variable {name}: {message}")]
    InvalidVariable { name: String, message: String },
}

/// Errors raised by [`Command::execute`](crate::command::Command::execute).
///
/// These surface synchronously at `send` and never enter the correlation store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The backend call itself failed
    #[error("Backend call failed: {0}")]
    Backend(String),

    /// A required command parameter is absent
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// A parameter is present but cannot be used as requested
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    /// The command result is write-once
    #[error("Result of command '{0}' was already set")]
    ResultAlreadySet(String),

    /// Placeholder resolution failed
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ExecutionError {
    /// Wrap any displayable backend failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        ExecutionError::Backend(err.to_string())
    }
}

/// Errors surfaced by endpoint `send`/`receive`.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Caller bug, e.g. receive without a prior send on the same context
    #[error("Usage error: {0}")]
    Usage(String),

    /// The bounded wait for a reply was exhausted
    #[error("Action timeout after {elapsed:?} while receiving reply on endpoint '{endpoint}'")]
    Timeout { endpoint: String, elapsed: Duration },

    /// The caller cancelled the wait before a reply arrived
    #[error("Receive on endpoint '{endpoint}' cancelled after {elapsed:?}")]
    Cancelled { endpoint: String, elapsed: Duration },

    /// Command execution failed during send
    #[error("Command execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// No correlation key could be derived from the message
    #[error("Correlation error: {0}")]
    Correlation(String),

    /// The message converter rejected the message or command
    #[error("Message conversion failed: {0}")]
    Conversion(String),

    /// Exchange context lookup failed
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Endpoint configuration is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EndpointError {
    /// Whether this is the expected "no reply in time" outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EndpointError::Timeout { .. })
    }
}
