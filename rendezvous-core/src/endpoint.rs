//! Endpoints: correlated `send` / `receive` over a command backend.
//!
//! `send` derives a correlation key, records it in the exchange context,
//! builds and executes a command, then parks the executed command in the
//! endpoint's [`CorrelationStore`]. `receive` looks the key back up, waits
//! for the command, runs its result callback and converts it into a reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rendezvous_config::Validate;
use rendezvous_log::{debug, error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::config::EndpointConfig;
use crate::context::ExchangeContext;
use crate::correlator::{
    CorrelationKey, CorrelationName, Correlator, DefaultCorrelator, HeaderCorrelator,
};
use crate::error::{EndpointError, EndpointResult};
use crate::message::Message;
use crate::store::{CorrelationStore, Lookup};

/// Converts between domain messages and commands.
///
/// Supplied by the backend integration; the endpoint never inspects the
/// message payload or the command result itself.
pub trait MessageConverter<C: Command>: Send + Sync {
    /// Build the command to execute for an outbound message.
    fn convert_outbound(
        &self,
        message: &Message,
        config: &EndpointConfig,
        context: &mut ExchangeContext,
    ) -> EndpointResult<C>;

    /// Turn an executed command into the reply message.
    fn convert_inbound(
        &self,
        command: C,
        config: &EndpointConfig,
        context: &mut ExchangeContext,
    ) -> EndpointResult<Message>;
}

/// Sending side of an endpoint.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Send a message, returning the correlation key of its reply.
    async fn send(
        &self,
        message: &Message,
        context: &mut ExchangeContext,
    ) -> EndpointResult<CorrelationKey>;
}

/// Receiving side of an endpoint, resolving replies by correlation key.
#[async_trait]
pub trait ReplyConsumer: Send + Sync {
    /// Receive the reply to this context's last send, with the default timeout.
    async fn receive(&self, context: &mut ExchangeContext) -> EndpointResult<Message>;

    /// Receive the reply to this context's last send.
    async fn receive_timeout(
        &self,
        context: &mut ExchangeContext,
        timeout: Duration,
    ) -> EndpointResult<Message>;

    /// Receive the reply stored under `selector`, with the default timeout.
    async fn receive_selected(
        &self,
        selector: &CorrelationKey,
        context: &mut ExchangeContext,
    ) -> EndpointResult<Message>;

    /// Receive the reply stored under `selector`.
    async fn receive_selected_timeout(
        &self,
        selector: &CorrelationKey,
        context: &mut ExchangeContext,
        timeout: Duration,
    ) -> EndpointResult<Message>;
}

/// A named endpoint executing commands of type `C`.
pub struct Endpoint<C: Command> {
    name: String,
    config: EndpointConfig,
    correlator: Arc<dyn Correlator>,
    converter: Arc<dyn MessageConverter<C>>,
    backend: Arc<C::Backend>,
    store: Arc<CorrelationStore<C>>,
}

impl<C: Command> Clone for Endpoint<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            correlator: self.correlator.clone(),
            converter: self.converter.clone(),
            backend: self.backend.clone(),
            store: self.store.clone(),
        }
    }
}

impl<C: Command> Endpoint<C> {
    pub fn builder(name: impl Into<String>) -> EndpointBuilder<C> {
        EndpointBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn backend(&self) -> &C::Backend {
        self.backend.as_ref()
    }

    /// The store shared by this endpoint's producer and consumer side.
    pub fn store(&self) -> &Arc<CorrelationStore<C>> {
        &self.store
    }

    /// The producer view of this endpoint.
    pub fn create_producer(&self) -> &dyn Producer {
        self
    }

    /// The consumer view of this endpoint.
    pub fn create_consumer(&self) -> &dyn ReplyConsumer {
        self
    }

    /// Key of the reply this context is currently waiting for.
    pub fn active_key<'a>(&self, context: &'a ExchangeContext) -> Option<&'a CorrelationKey> {
        let name = self.correlator.correlation_key_name(&self.name);
        context.correlation_key(&name)
    }

    /// Forget the context's in-flight exchange and evict its stored command.
    ///
    /// Call on test teardown when a reply was sent but never received.
    /// Returns whether a pending command was evicted.
    pub fn release(&self, context: &mut ExchangeContext) -> bool {
        let name = self.correlator.correlation_key_name(&self.name);
        let Some(key) = context.take_correlation_key(&name) else {
            return false;
        };

        let evicted = self.store.remove(&key).is_some();
        if evicted {
            debug!(
                "Released unreceived reply '{}' on endpoint '{}'",
                key, self.name
            );
        }
        evicted
    }

    /// Like [`ReplyConsumer::receive_timeout`] but aborted when `cancel` fires.
    pub async fn receive_cancellable(
        &self,
        context: &mut ExchangeContext,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> EndpointResult<Message> {
        let key = self.require_active_key(context)?;
        self.await_reply(&key, context, timeout, cancel).await
    }

    fn require_active_key(&self, context: &ExchangeContext) -> EndpointResult<CorrelationKey> {
        let name = self.correlator.correlation_key_name(&self.name);
        context.correlation_key(&name).cloned().ok_or_else(|| {
            EndpointError::Usage(format!(
                "no message was sent on endpoint '{}' in this context (missing correlation key '{}')",
                self.name, name
            ))
        })
    }

    async fn await_reply(
        &self,
        key: &CorrelationKey,
        context: &mut ExchangeContext,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> EndpointResult<Message> {
        let started = Instant::now();
        debug!(
            "Waiting up to {:?} for reply '{}' on endpoint '{}'",
            timeout, key, self.name
        );

        match self.store.find_with_cancel(key, timeout, cancel).await {
            Lookup::Found(command) => self.resolve(command, context),
            Lookup::TimedOut => {
                let elapsed = started.elapsed();
                warn!(
                    "No reply '{}' on endpoint '{}' after {:?}",
                    key, self.name, elapsed
                );
                Err(EndpointError::Timeout {
                    endpoint: self.name.clone(),
                    elapsed,
                })
            }
            Lookup::Cancelled => Err(EndpointError::Cancelled {
                endpoint: self.name.clone(),
                elapsed: started.elapsed(),
            }),
        }
    }

    fn resolve(&self, mut command: C, context: &mut ExchangeContext) -> EndpointResult<Message> {
        if let Some(callback) = command.state_mut().take_result_callback() {
            match command.result() {
                Some(result) => callback(result, context),
                None => warn!(
                    "Command '{}' on endpoint '{}' has a result callback but no result",
                    command.name(),
                    self.name
                ),
            }
        }

        info!(
            "Received reply of command '{}' on endpoint '{}'",
            command.name(),
            self.name
        );
        self.converter.convert_inbound(command, &self.config, context)
    }
}

#[async_trait]
impl<C: Command> Producer for Endpoint<C> {
    async fn send(
        &self,
        message: &Message,
        context: &mut ExchangeContext,
    ) -> EndpointResult<CorrelationKey> {
        let name = self.correlator.correlation_key_name(&self.name);
        let key = self.correlator.correlation_key(message)?;
        let previous = context.save_correlation_key(name.clone(), key.clone());

        let mut command = match self.converter.convert_outbound(message, &self.config, context) {
            Ok(command) => command,
            Err(e) => {
                restore_slot(context, name, previous);
                return Err(e);
            }
        };

        debug!(
            "Executing command '{}' on endpoint '{}'",
            command.name(),
            self.name
        );

        if let Err(e) = command.execute(self.backend.as_ref(), context).await {
            error!(
                "Command '{}' failed on endpoint '{}': {}",
                command.name(),
                self.name,
                e
            );
            restore_slot(context, name, previous);
            return Err(e.into());
        }

        info!(
            "Command '{}' was executed on endpoint '{}'",
            command.name(),
            self.name
        );

        // The context tracks one exchange per endpoint; an unreceived
        // reply it no longer points at could never be evicted.
        if let Some(displaced) = previous.filter(|previous| *previous != key) {
            if self.store.remove(&displaced).is_some() {
                warn!(
                    "Dropped unreceived reply '{}' on endpoint '{}', superseded by '{}'",
                    displaced, self.name, key
                );
            }
        }

        self.store.store(key.clone(), command);
        Ok(key)
    }
}

#[async_trait]
impl<C: Command> ReplyConsumer for Endpoint<C> {
    async fn receive(&self, context: &mut ExchangeContext) -> EndpointResult<Message> {
        self.receive_timeout(context, self.config.timeout()).await
    }

    async fn receive_timeout(
        &self,
        context: &mut ExchangeContext,
        timeout: Duration,
    ) -> EndpointResult<Message> {
        let key = self.require_active_key(context)?;
        self.receive_selected_timeout(&key, context, timeout).await
    }

    async fn receive_selected(
        &self,
        selector: &CorrelationKey,
        context: &mut ExchangeContext,
    ) -> EndpointResult<Message> {
        self.receive_selected_timeout(selector, context, self.config.timeout())
            .await
    }

    async fn receive_selected_timeout(
        &self,
        selector: &CorrelationKey,
        context: &mut ExchangeContext,
        timeout: Duration,
    ) -> EndpointResult<Message> {
        self.await_reply(selector, context, timeout, &CancellationToken::new())
            .await
    }
}

/// Put back the slot a failed send overwrote.
fn restore_slot(
    context: &mut ExchangeContext,
    name: CorrelationName,
    previous: Option<CorrelationKey>,
) {
    match previous {
        Some(previous) => {
            context.save_correlation_key(name, previous);
        }
        None => {
            context.take_correlation_key(&name);
        }
    }
}

/// Builder for [`Endpoint`].
pub struct EndpointBuilder<C: Command> {
    name: String,
    config: EndpointConfig,
    correlator: Option<Arc<dyn Correlator>>,
    converter: Option<Arc<dyn MessageConverter<C>>>,
    backend: Option<Arc<C::Backend>>,
    store: Option<Arc<CorrelationStore<C>>>,
}

impl<C: Command> EndpointBuilder<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: EndpointConfig::default(),
            correlator: None,
            converter: None,
            backend: None,
            store: None,
        }
    }

    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    pub fn correlator(mut self, correlator: impl Correlator + 'static) -> Self {
        self.correlator = Some(Arc::new(correlator));
        self
    }

    pub fn converter(mut self, converter: impl MessageConverter<C> + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn backend(mut self, backend: Arc<C::Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use an existing store, e.g. to pair a producer with a separate consumer endpoint.
    pub fn with_store(mut self, store: Arc<CorrelationStore<C>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and assemble the endpoint.
    ///
    /// Without an explicit correlator, a configured `correlation_header`
    /// selects [`HeaderCorrelator`], otherwise [`DefaultCorrelator`] is used.
    pub fn build(self) -> EndpointResult<Endpoint<C>> {
        self.config.validate()?;

        let converter = self.converter.ok_or_else(|| {
            EndpointError::Usage(format!("endpoint '{}' has no message converter", self.name))
        })?;
        let backend = self.backend.ok_or_else(|| {
            EndpointError::Usage(format!("endpoint '{}' has no backend", self.name))
        })?;

        let configured_header = &self.config.correlation_header;
        let correlator: Arc<dyn Correlator> = match (self.correlator, configured_header) {
            (Some(correlator), _) => correlator,
            (None, Some(header)) => Arc::new(HeaderCorrelator::new(header.clone())),
            (None, None) => Arc::new(DefaultCorrelator),
        };

        let store = self.store.unwrap_or_else(|| {
            Arc::new(CorrelationStore::with_polling_interval(
                self.config.polling_interval(),
            ))
        });

        debug!(
            "Created endpoint '{}' (timeout {:?}, polling every {:?})",
            self.name,
            self.config.timeout(),
            store.polling_interval()
        );

        Ok(Endpoint {
            name: self.name,
            config: self.config,
            correlator,
            converter,
            backend,
            store,
        })
    }
}
