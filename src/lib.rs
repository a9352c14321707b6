// Rendezvous - request/reply correlation for test-automation endpoints
//
// A producer executes a command against a backend and parks it under a
// correlation key; a consumer in the same test later waits a bounded time
// for that key and turns the command result into a reply message.

// Re-export core functionality
pub use rendezvous_core::*;

// Re-export logging
pub use rendezvous_log as log;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

// Re-export optional crates
#[cfg(feature = "config")]
pub use rendezvous_config;

#[cfg(feature = "testing")]
pub use rendezvous_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CancellationToken,
        Command,
        CommandState,
        CorrelationKey,
        CorrelationStore,
        Correlator,
        DefaultCorrelator,
        Endpoint,
        EndpointConfig,
        EndpointError,
        EndpointResult,
        ExchangeContext,
        ExecutionError,
        HeaderCorrelator,
        Message,
        MessageConverter,
        ParameterValue,
        Parameters,
        Producer,
        ReplyConsumer,
        async_trait,
    };
}
