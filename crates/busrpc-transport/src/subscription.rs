use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::Delivery;

/// The reply side of one in-flight correlated request
///
/// Owned by exactly one request call. Replies arrive in delivery order.
/// Dropping the subscription cancels the token, which the transport treats
/// as "remove the reply subscription": late replies then have nowhere to
/// go and produce no side effects.
pub struct ReplySubscription {
    correlation_id: String,
    receiver: mpsc::Receiver<Delivery>,
    cancel: CancellationToken,
}

impl ReplySubscription {
    pub fn new(
        correlation_id: impl Into<String>,
        receiver: mpsc::Receiver<Delivery>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            receiver,
            cancel,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Next reply in arrival order; `None` once the transport closed the
    /// channel.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

impl Drop for ReplySubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
