//! Correlation keys and the strategies that derive them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EndpointError, EndpointResult};
use crate::message::{Message, headers};

/// Opaque key linking one `send` to exactly one later `receive`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Name of the exchange-context slot holding an endpoint's active key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationName(String);

impl CorrelationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives correlation names and keys.
///
/// Both operations must be pure: the same endpoint name or message always
/// yields the same result, independent of time or shared state.
pub trait Correlator: Send + Sync {
    /// Slot name for the endpoint's active key.
    fn correlation_key_name(&self, endpoint_name: &str) -> CorrelationName;

    /// Key for an outbound message.
    fn correlation_key(&self, message: &Message) -> EndpointResult<CorrelationKey>;
}

/// Correlates on the message id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCorrelator;

impl DefaultCorrelator {
    pub const KEY_NAME_PREFIX: &'static str = "rendezvous_message_correlator_";
}

impl Correlator for DefaultCorrelator {
    fn correlation_key_name(&self, endpoint_name: &str) -> CorrelationName {
        CorrelationName(format!("{}{}", Self::KEY_NAME_PREFIX, endpoint_name))
    }

    fn correlation_key(&self, message: &Message) -> EndpointResult<CorrelationKey> {
        Ok(CorrelationKey(format!("rendezvous_message_id = '{}'", message.id)))
    }
}

/// Correlates on the value of a message header.
#[derive(Debug, Clone)]
pub struct HeaderCorrelator {
    header: String,
}

impl HeaderCorrelator {
    pub const KEY_NAME_PREFIX: &'static str = "rendezvous_header_correlator_";

    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderCorrelator {
    fn default() -> Self {
        Self::new(headers::CORRELATION_ID)
    }
}

impl Correlator for HeaderCorrelator {
    fn correlation_key_name(&self, endpoint_name: &str) -> CorrelationName {
        CorrelationName(format!("{}{}", Self::KEY_NAME_PREFIX, endpoint_name))
    }

    fn correlation_key(&self, message: &Message) -> EndpointResult<CorrelationKey> {
        match message.get_header(&self.header) {
            Some(value) if !value.trim().is_empty() => Ok(CorrelationKey::new(value)),
            Some(_) => Err(EndpointError::Correlation(format!(
                "header '{}' of message {} is empty",
                self.header, message.id
            ))),
            None => Err(EndpointError::Correlation(format!(
                "message {} has no '{}' header",
                message.id, self.header
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_default_correlator_is_deterministic() {
        let correlator = DefaultCorrelator;
        let msg = Message::new(Value::Null).with_id("abc");

        let first = correlator.correlation_key(&msg).unwrap();
        let second = correlator.correlation_key(&msg.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "rendezvous_message_id = 'abc'");
    }

    #[test]
    fn test_key_names_are_per_endpoint() {
        let correlator = DefaultCorrelator;
        let docker = correlator.correlation_key_name("docker-client");
        let k8s = correlator.correlation_key_name("k8s-client");

        assert_ne!(docker, k8s);
        assert_eq!(docker.as_str(), "rendezvous_message_correlator_docker-client");
    }

    #[test]
    fn test_header_correlator() {
        let correlator = HeaderCorrelator::default();
        let msg = Message::new(Value::Null).with_correlation_id("req-7");

        assert_eq!(correlator.correlation_key(&msg).unwrap(), CorrelationKey::from("req-7"));
        assert_eq!(
            correlator.correlation_key_name("amqp").as_str(),
            "rendezvous_header_correlator_amqp"
        );
    }

    #[test]
    fn test_header_correlator_rejects_missing_or_empty() {
        let correlator = HeaderCorrelator::new("x-request-id");

        let missing = Message::new(Value::Null);
        assert!(matches!(
            correlator.correlation_key(&missing),
            Err(EndpointError::Correlation(_))
        ));

        let empty = Message::new(Value::Null).header("x-request-id", " ");
        assert!(matches!(
            correlator.correlation_key(&empty),
            Err(EndpointError::Correlation(_))
        ));
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = CorrelationKey::new("k1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"k1\"");
    }
}
