//! Request/reply correlation for test-automation endpoints.
//!
//! An endpoint's producer side executes a command against some backend
//! (a container engine, a cluster API, ...) and parks the executed command
//! under a correlation key. Its consumer side later looks the key up from
//! the same test's [`ExchangeContext`], waits a bounded time for the entry
//! and converts the command result into a reply [`Message`].
//!
//! - 🔑 Pluggable correlation strategies (message id or header)
//! - ⏳ Bounded, cancellable polling retrieval
//! - 🧵 Many tests share one endpoint without seeing each other's replies
//! - 🪝 Result callbacks that write into the test's variables
//!
//! ## Correlation Store
//!
//! ```
//! use rendezvous_core::{CorrelationKey, CorrelationStore};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = CorrelationStore::with_polling_interval(Duration::from_millis(10));
//! let key = CorrelationKey::from("k1");
//!
//! store.store(key.clone(), "reply");
//! assert_eq!(store.find(&key, Duration::from_millis(50)).await, Some("reply"));
//!
//! // Entries are handed out at most once.
//! assert_eq!(store.find(&key, Duration::from_millis(50)).await, None);
//! # }
//! ```
//!
//! ## Exchange Context
//!
//! ```
//! use rendezvous_core::ExchangeContext;
//!
//! let mut context = ExchangeContext::new();
//! context.set_variable("image", "busybox");
//!
//! assert_eq!(
//!     context.replace_dynamic_content("${image}:latest").unwrap(),
//!     "busybox:latest"
//! );
//! ```
//!
//! ## Endpoint Configuration
//!
//! ```
//! use rendezvous_core::EndpointConfig;
//! use std::time::Duration;
//!
//! let config = EndpointConfig::new()
//!     .with_timeout(Duration::from_secs(2))
//!     .with_polling_interval(Duration::from_millis(100));
//!
//! assert_eq!(config.timeout(), Duration::from_secs(2));
//! ```

pub mod command;
pub mod config;
pub mod context;
pub mod correlator;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod store;

pub use command::{
    Command, CommandState, LIST_DELIMITER, ParameterValue, Parameters, ResultCallback,
};
pub use config::EndpointConfig;
pub use context::ExchangeContext;
pub use correlator::{
    CorrelationKey, CorrelationName, Correlator, DefaultCorrelator, HeaderCorrelator,
};
pub use endpoint::{Endpoint, EndpointBuilder, MessageConverter, Producer, ReplyConsumer};
pub use error::{ContextError, EndpointError, EndpointResult, ExecutionError};
pub use message::Message;
pub use store::{CorrelationStore, DEFAULT_POLLING_INTERVAL, Lookup};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::command::{Command, CommandState, ParameterValue, Parameters};
    pub use crate::config::EndpointConfig;
    pub use crate::context::ExchangeContext;
    pub use crate::correlator::{CorrelationKey, Correlator, DefaultCorrelator, HeaderCorrelator};
    pub use crate::endpoint::{Endpoint, MessageConverter, Producer, ReplyConsumer};
    pub use crate::error::{EndpointError, EndpointResult, ExecutionError};
    pub use crate::message::Message;
    pub use crate::store::CorrelationStore;
}
