use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::TransportError;
use crate::message::Delivery;
use crate::options::{HandleOptions, PublishOptions, QueueOptions};
use crate::registration::HandlerRegistration;
use crate::subscription::ReplySubscription;

/// Consumer callback for deliveries from one queue
///
/// Handlers are infallible by contract: anything that can go wrong with a
/// message (validation, business failure) must be settled inside the
/// handler, otherwise the dispatch loop would be the one paying for it.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery);
}

/// Adapter turning a closure into a [`DeliveryHandler`]
pub struct FnDeliveryHandler<F>
where
    F: Fn(Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FnDeliveryHandler<F>
where
    F: Fn(Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> DeliveryHandler for FnDeliveryHandler<F>
where
    F: Fn(Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, delivery: Delivery) {
        (self.handler_fn)(delivery).await
    }
}

/// Result of declaring a queue
#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub name: String,
    /// Messages waiting for a subscription to start
    pub backlog: usize,
}

/// The capabilities this layer consumes from the message bus
///
/// Implementations own connection lifecycle, topology and delivery
/// mechanics; the client and server crates only call through this trait.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Publish a message; resolves once the bus accepts responsibility for
    /// delivery.
    async fn publish(&self, exchange: &str, options: PublishOptions) -> Result<(), TransportError>;

    /// Publish a batch of messages; resolves once the bus accepts all of
    /// them.
    async fn publish_bulk(
        &self,
        exchange: &str,
        batch: Vec<PublishOptions>,
    ) -> Result<(), TransportError>;

    /// Install the fallback handler for messages whose routing key has no
    /// bound queue. One per bus; installing again replaces the previous
    /// handler.
    async fn set_unrouted_handler(
        &self,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), TransportError>;

    /// Publish a message tagged with a fresh correlation id and open a
    /// reply subscription for it.
    async fn request(
        &self,
        exchange: &str,
        options: PublishOptions,
    ) -> Result<ReplySubscription, TransportError>;

    /// Declare a queue; reuses an existing queue with the same name.
    async fn add_queue(&self, name: &str, options: QueueOptions) -> Result<QueueInfo, TransportError>;

    /// Bind a queue to an exchange for the given routing keys.
    async fn bind_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<(), TransportError>;

    /// Register a handler for deliveries from a queue. Registration should
    /// happen before the subscription starts.
    async fn add_handler(
        &self,
        queue: &str,
        options: HandleOptions,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<HandlerRegistration, TransportError>;

    /// Start consuming a queue that was declared without auto-subscribe.
    async fn start_subscription(&self, queue: &str) -> Result<(), TransportError>;

    /// Tear down the bus; pending subscriptions and handlers are released.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Type alias for a shared transport
pub type BoxedBus = Arc<dyn BusTransport>;
