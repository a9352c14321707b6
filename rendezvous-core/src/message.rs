//! Domain messages exchanged through endpoints.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Well-known header names.
pub mod headers {
    /// Header carrying an explicit correlation id
    pub const CORRELATION_ID: &str = "rendezvous_correlation_id";
    /// Header naming the command a reply was produced by
    pub const COMMAND: &str = "rendezvous_command";
}

/// A message sent to or received from an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Message payload
    pub payload: Value,
    /// Message headers
    pub headers: HashMap<String, String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with the given payload.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload: payload.into(),
            headers: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a message from any serializable payload.
    pub fn from_serializable<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(payload)?))
    }

    /// Replace the generated ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the correlation id header.
    pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
        self.header(headers::CORRELATION_ID, id)
    }

    /// Get a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// The correlation id header, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get_header(headers::CORRELATION_ID)
    }

    /// Deserialize the payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct PodQuery {
        namespace: String,
        label: String,
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::new(json!({"command": "pods:list"}));
        assert!(!msg.id.is_empty());
        assert_eq!(msg.payload["command"], "pods:list");
        assert!(msg.headers.is_empty());
    }

    #[test]
    fn test_message_ids_are_unique() {
        assert_ne!(Message::new(Value::Null).id, Message::new(Value::Null).id);
    }

    #[test]
    fn test_headers_and_correlation_id() {
        let msg = Message::new(Value::Null)
            .with_id("msg-1")
            .header("namespace", "default")
            .with_correlation_id("corr-9");

        assert_eq!(msg.id, "msg-1");
        assert_eq!(msg.get_header("namespace"), Some("default"));
        assert_eq!(msg.correlation_id(), Some("corr-9"));
        assert_eq!(msg.get_header("missing"), None);
    }

    #[test]
    fn test_typed_payload() {
        let query = PodQuery {
            namespace: "test".to_string(),
            label: "app=web".to_string(),
        };

        let msg = Message::from_serializable(&query).unwrap();
        let back: PodQuery = msg.payload_as().unwrap();
        assert_eq!(back, query);
    }
}
