use std::time::Duration;

use serde_json::Value;

/// Content type stamped on every published message body
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Options for a single publish or request call
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub routing_key: String,
    pub body: Value,
    /// Queued messages survive a broker restart when true
    pub persistent: bool,
    /// How long the transport may wait for the broker to accept the message
    pub timeout: Option<Duration>,
    pub content_type: String,
}

impl PublishOptions {
    pub fn new(routing_key: impl Into<String>, body: Value) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            persistent: true,
            timeout: None,
            content_type: CONTENT_TYPE_JSON.to_string(),
        }
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Queue declaration options
///
/// `subscribe` is false by default so handlers can be registered before the
/// consumer starts; such queues are subscribed later in one explicit pass.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Max number of unacked messages allowed for a consumer
    pub limit: u32,
    /// Max number of ready messages the queue can hold
    pub queue_limit: u32,
    /// Delete when the consumer count drops to zero
    pub auto_delete: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Ack, nack and reject take effect immediately instead of batching
    pub no_batch: bool,
    /// Limit the queue to the current connection
    pub exclusive: bool,
    /// Auto-start the subscription at declaration time
    pub subscribe: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            queue_limit: 10_000,
            auto_delete: false,
            durable: true,
            no_batch: true,
            exclusive: false,
            subscribe: false,
        }
    }
}

/// Options for registering a message handler on a queue
#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Nack a message whose handler panicked instead of losing it
    pub auto_nack: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self { auto_nack: true }
    }
}
