//! The correlated request client.

use serde_json::Value;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;

use busrpc_json_rpc::{validate_response, JsonRpcSuccess, PayloadError};
use busrpc_transport::{BoxedBus, Delivery, PublishOptions, TransportError};

use crate::config::{ClientConfig, RequestOverrides};
use crate::error::{ClientError, ClientResult};

/// A raw reply validated against a caller-supplied payload check
#[derive(Debug)]
pub struct ValidatedReply<T> {
    pub payload: T,
    pub message: Delivery,
}

/// A reply validated as a JSON-RPC success envelope
#[derive(Debug)]
pub struct RpcReply<T> {
    pub response: JsonRpcSuccess<T>,
    pub message: Delivery,
}

/// Issues correlated requests through the bus's request/response primitive
///
/// The client owns the contract around that primitive: one reply
/// subscription per in-flight call, released whether the call settles by
/// success, timeout or error.
pub struct RpcClient {
    bus: BoxedBus,
    config: ClientConfig,
}

impl RpcClient {
    pub fn new(bus: BoxedBus, config: ClientConfig) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fire-and-forget publish to the default (or overridden) exchange.
    pub async fn publish(
        &self,
        body: Value,
        routing_key: &str,
        overrides: RequestOverrides,
    ) -> ClientResult<()> {
        let exchange = overrides
            .exchange
            .as_deref()
            .unwrap_or(&self.config.default_exchange);
        let options = PublishOptions::new(routing_key, body)
            .persistent(overrides.persistent.unwrap_or(self.config.persistent));

        self.bus.publish(exchange, options).await?;
        Ok(())
    }

    /// Publish a batch in one call; each message carries its own routing
    /// key. The overrides apply to every message in the batch.
    pub async fn publish_bulk(
        &self,
        messages: Vec<(String, Value)>,
        overrides: RequestOverrides,
    ) -> ClientResult<()> {
        let exchange = overrides
            .exchange
            .as_deref()
            .unwrap_or(&self.config.default_exchange);
        let persistent = overrides.persistent.unwrap_or(self.config.persistent);
        let batch = messages
            .into_iter()
            .map(|(routing_key, body)| PublishOptions::new(routing_key, body).persistent(persistent))
            .collect();

        self.bus.publish_bulk(exchange, batch).await?;
        Ok(())
    }

    /// Issue a request and collect replies in arrival order.
    ///
    /// Collection stops at the effective reply limit or when the timeout
    /// window closes, whichever comes first. A window that closes with no
    /// reply at all is a [`ClientError::Timeout`]; a reply channel that
    /// closes before anything arrived settles the same way, at the window.
    /// Replies collected before an expiring window are returned. The reply
    /// subscription is dropped on every path, so replies arriving after the
    /// call settles go nowhere.
    pub async fn request(
        &self,
        body: Value,
        routing_key: &str,
        overrides: RequestOverrides,
    ) -> ClientResult<Vec<Delivery>> {
        let exchange = overrides
            .exchange
            .as_deref()
            .unwrap_or(&self.config.default_exchange);
        let reply_timeout = overrides.reply_timeout.unwrap_or(self.config.reply_timeout);
        let reply_limit = overrides
            .reply_limit
            .unwrap_or(self.config.reply_limit)
            .max(1);

        let options = PublishOptions::new(routing_key, body)
            .persistent(overrides.persistent.unwrap_or(self.config.persistent));

        let mut subscription = self.bus.request(exchange, options).await?;
        debug!(
            routing_key,
            exchange,
            correlation_id = subscription.correlation_id(),
            reply_limit,
            "issued correlated request"
        );

        let deadline = Instant::now() + reply_timeout;
        // The limit is caller-supplied and may be "effectively unbounded".
        let mut replies: Vec<Delivery> = Vec::with_capacity(reply_limit.min(64));
        while replies.len() < reply_limit {
            match timeout_at(deadline, subscription.next()).await {
                Ok(Some(reply)) => replies.push(reply),
                // Transport closed the reply channel. With nothing
                // collected the call still waits out the window, so a dead
                // route settles like any unanswered request.
                Ok(None) => {
                    if replies.is_empty() {
                        sleep_until(deadline).await;
                        debug!(
                            routing_key,
                            correlation_id = subscription.correlation_id(),
                            "reply channel closed with no reply"
                        );
                        return Err(ClientError::Timeout {
                            elapsed: reply_timeout,
                        });
                    }
                    break;
                }
                Err(_) => {
                    if replies.is_empty() {
                        debug!(
                            routing_key,
                            correlation_id = subscription.correlation_id(),
                            "request timed out with no reply"
                        );
                        return Err(ClientError::Timeout {
                            elapsed: reply_timeout,
                        });
                    }
                    break;
                }
            }
        }

        debug!(
            routing_key,
            correlation_id = subscription.correlation_id(),
            replies = replies.len(),
            "request settled"
        );
        Ok(replies)
    }

    /// Issue a request and return the first reply.
    pub async fn request_one(
        &self,
        body: Value,
        routing_key: &str,
        overrides: RequestOverrides,
    ) -> ClientResult<Delivery> {
        let overrides = RequestOverrides {
            reply_limit: Some(1),
            ..overrides
        };
        let replies = self.request(body, routing_key, overrides).await?;
        replies
            .into_iter()
            .next()
            .ok_or(ClientError::Transport(TransportError::ReplyChannelClosed))
    }

    /// Request with raw-payload validation of the reply body.
    ///
    /// For counterparts that do not speak JSON-RPC: the reply body goes
    /// straight through `validator`, no envelope check.
    pub async fn high_level_request<T, F>(
        &self,
        body: Value,
        routing_key: &str,
        validator: F,
        overrides: RequestOverrides,
    ) -> ClientResult<ValidatedReply<T>>
    where
        F: Fn(&Value) -> Result<T, PayloadError>,
    {
        let message = self.request_one(body, routing_key, overrides).await?;
        let payload = validator(&message.body)?;
        Ok(ValidatedReply { payload, message })
    }

    /// Request expecting a JSON-RPC success reply.
    ///
    /// The reply body is validated as an envelope first, then its `result`
    /// member against `result_validator`. Callers can distinguish a timeout,
    /// an envelope or counterpart-signaled protocol error, and a result of
    /// the wrong shape.
    pub async fn high_level_rpc_request<T, F>(
        &self,
        body: Value,
        routing_key: &str,
        result_validator: F,
        overrides: RequestOverrides,
    ) -> ClientResult<RpcReply<T>>
    where
        F: Fn(&Value) -> Result<T, PayloadError>,
    {
        let message = self.request_one(body, routing_key, overrides).await?;
        let response = validate_response(&message.body, result_validator)?;
        Ok(RpcReply { response, message })
    }
}
