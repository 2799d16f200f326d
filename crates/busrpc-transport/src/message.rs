use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// Operations a transport wires onto each delivered message
#[async_trait]
pub trait DeliveryOps: Send + Sync {
    async fn ack(&self) -> Result<(), TransportError>;
    async fn nack(&self) -> Result<(), TransportError>;
    async fn reject(&self) -> Result<(), TransportError>;
    async fn reply(&self, body: Value) -> Result<(), TransportError>;
}

/// A message delivered from a queue
///
/// Carries the decoded JSON body and the acknowledgement/reply operations
/// for this specific delivery. Cloning is cheap; the operations are shared.
#[derive(Clone)]
pub struct Delivery {
    pub body: Value,
    pub routing_key: String,
    pub correlation_id: Option<String>,
    ops: Arc<dyn DeliveryOps>,
}

impl Delivery {
    pub fn new(
        body: Value,
        routing_key: impl Into<String>,
        correlation_id: Option<String>,
        ops: Arc<dyn DeliveryOps>,
    ) -> Self {
        Self {
            body,
            routing_key: routing_key.into(),
            correlation_id,
            ops,
        }
    }

    /// Acknowledge the message
    pub async fn ack(&self) -> Result<(), TransportError> {
        self.ops.ack().await
    }

    /// Return the message to the queue
    pub async fn nack(&self) -> Result<(), TransportError> {
        self.ops.nack().await
    }

    /// Discard the message without requeueing
    pub async fn reject(&self) -> Result<(), TransportError> {
        self.ops.reject().await
    }

    /// Send a reply to the requester, correlated by the transport
    pub async fn reply(&self, body: Value) -> Result<(), TransportError> {
        self.ops.reply(body).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("body", &self.body)
            .field("routing_key", &self.routing_key)
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}
