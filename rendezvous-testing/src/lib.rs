//! Testing utilities for Rendezvous endpoints.
//!
//! ## Features
//!
//! - 🎭 **MockBackend** - Records calls, canned results, injected failures
//! - 🧩 **MockCommand** - Resolves parameters and calls the mock backend
//! - 🔁 **MockConverter** - Builds commands from message headers and payloads
//! - 🏗️ **mock_endpoint** - A ready-made endpoint over a fresh backend
//!
//! ## Quick Start
//!
//! ```
//! use rendezvous_core::{ExchangeContext, Producer, ReplyConsumer};
//! use rendezvous_testing::*;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let (endpoint, backend) = mock_endpoint("docker-client").unwrap();
//! let mut context = ExchangeContext::new();
//!
//! endpoint
//!     .send(&command_message("images:pull", json!({ "image": "busybox" })), &mut context)
//!     .await
//!     .unwrap();
//! let reply = endpoint.receive(&mut context).await.unwrap();
//!
//! assert_eq!(reply.payload["image"], "busybox");
//! assert!(backend.was_called("images:pull"));
//! # });
//! ```

pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use rendezvous_core::{Endpoint, EndpointConfig, EndpointResult};

pub use mock::{
    MockBackend, MockCommand, MockConverter, RESULT_VARIABLE_HEADER, RecordedCall,
    command_message,
};

/// Endpoint with short timings suitable for tests.
pub fn test_config() -> EndpointConfig {
    EndpointConfig::new()
        .with_timeout(Duration::from_millis(500))
        .with_polling_interval(Duration::from_millis(10))
}

/// Build an endpoint over `backend` with `config`.
pub fn mock_endpoint_with(
    name: &str,
    config: EndpointConfig,
    backend: Arc<MockBackend>,
) -> EndpointResult<Endpoint<MockCommand>> {
    Endpoint::builder(name)
        .config(config)
        .converter(MockConverter)
        .backend(backend)
        .build()
}

/// Build an endpoint over a fresh [`MockBackend`] using [`test_config`].
pub fn mock_endpoint(
    name: &str,
) -> EndpointResult<(Endpoint<MockCommand>, Arc<MockBackend>)> {
    let backend = Arc::new(MockBackend::new());
    let endpoint = mock_endpoint_with(name, test_config(), backend.clone())?;
    Ok((endpoint, backend))
}
