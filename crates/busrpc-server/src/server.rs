//! Declarative queue/handler registration.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use busrpc_json_rpc::{JsonRpcRequest, PayloadError};
use busrpc_transport::{
    BoxedBus, DeliveryHandler, HandleOptions, HandlerRegistration, QueueInfo, QueueOptions,
    TransportError,
};

use crate::handler::{
    rpc_validated_handler, validated_handler, InvalidMessageHandler, MessageHandler,
};

/// Subscriber-side registration surface
///
/// Owns the default exchange name and the list of queues awaiting a manual
/// subscription start. Both are instance state: construct one `BusServer`
/// per process (or per connection) and pass it around explicitly.
pub struct BusServer {
    bus: BoxedBus,
    default_exchange: String,
    // Queues declared without auto-subscribe, drained by
    // start_pending_subscriptions. Append-only and duplicate-insensitive.
    pending_subscriptions: Mutex<Vec<String>>,
}

impl BusServer {
    pub fn new(bus: BoxedBus, default_exchange: impl Into<String>) -> Self {
        Self {
            bus,
            default_exchange: default_exchange.into(),
            pending_subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn default_exchange(&self) -> &str {
        &self.default_exchange
    }

    /// Queues currently awaiting a manual subscription start
    pub fn pending_subscriptions(&self) -> Vec<String> {
        self.pending_subscriptions.lock().clone()
    }

    /// Declare a queue. Unless the options auto-subscribe it, the queue is
    /// remembered for [`BusServer::start_pending_subscriptions`] so handlers
    /// can be registered before the consumer starts.
    pub async fn add_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<QueueInfo, TransportError> {
        let auto_subscribe = options.subscribe;
        let info = self.bus.add_queue(name, options).await?;
        if !auto_subscribe {
            let mut pending = self.pending_subscriptions.lock();
            if !pending.iter().any(|queue| queue == name) {
                pending.push(name.to_string());
            }
        }
        Ok(info)
    }

    /// Bind a queue to the default (or given) exchange for the routing keys.
    pub async fn bind_queue(
        &self,
        queue: &str,
        routing_keys: &[String],
        exchange: Option<&str>,
    ) -> Result<(), TransportError> {
        let exchange = exchange.unwrap_or(&self.default_exchange);
        self.bus.bind_queue(exchange, queue, routing_keys).await
    }

    /// Install the fallback handler for messages no queue is bound to
    /// take.
    pub async fn on_unrouted(
        &self,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), TransportError> {
        self.bus.set_unrouted_handler(handler).await
    }

    /// Register a raw delivery handler on a queue.
    pub async fn add_handler(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
        options: HandleOptions,
    ) -> Result<HandlerRegistration, TransportError> {
        self.bus.add_handler(queue, options, handler).await
    }

    /// Declare a queue named after the routing key, bind it, and register
    /// the handler on it.
    pub async fn add_high_level_handler(
        &self,
        key: &str,
        handler: Arc<dyn DeliveryHandler>,
        exchange: Option<&str>,
    ) -> Result<HandlerRegistration, TransportError> {
        self.add_queue(key, QueueOptions::default()).await?;
        self.bind_queue(key, &[key.to_string()], exchange).await?;
        debug!(key, "registered high-level handler");
        self.add_handler(key, handler, HandleOptions::default())
            .await
    }

    /// High-level registration with raw-payload validation.
    ///
    /// Messages that pass `validator` reach `handler` with the typed
    /// payload; everything else goes to `invalid`, and only there.
    pub async fn add_validate_handler<T, V>(
        &self,
        key: &str,
        handler: Arc<dyn MessageHandler<T>>,
        validator: V,
        invalid: Arc<dyn InvalidMessageHandler>,
        exchange: Option<&str>,
    ) -> Result<HandlerRegistration, TransportError>
    where
        T: Send + Sync + 'static,
        V: Fn(&Value) -> Result<T, PayloadError> + Send + Sync + 'static,
    {
        let wrapper = Arc::new(validated_handler(validator, handler, invalid));
        self.add_high_level_handler(key, wrapper, exchange).await
    }

    /// High-level registration with JSON-RPC request validation.
    ///
    /// The invalid handler fires when the body is not a valid request
    /// envelope or when `params_validator` rejects the params.
    pub async fn add_rpc_validate_handler<T, V>(
        &self,
        key: &str,
        handler: Arc<dyn MessageHandler<JsonRpcRequest<T>>>,
        params_validator: V,
        invalid: Arc<dyn InvalidMessageHandler>,
        exchange: Option<&str>,
    ) -> Result<HandlerRegistration, TransportError>
    where
        T: Send + Sync + 'static,
        V: Fn(&Value) -> Result<T, PayloadError> + Send + Sync + 'static,
    {
        let wrapper = Arc::new(rpc_validated_handler(params_validator, handler, invalid));
        self.add_high_level_handler(key, wrapper, exchange).await
    }

    /// Start a consumer on every queue registered for manual subscription.
    pub async fn start_pending_subscriptions(&self) -> Result<(), TransportError> {
        let pending: Vec<String> = std::mem::take(&mut *self.pending_subscriptions.lock());
        info!(queues = pending.len(), "starting pending subscriptions");
        for queue in pending {
            self.bus.start_subscription(&queue).await?;
        }
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.bus.shutdown().await
    }
}
