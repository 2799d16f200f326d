use thiserror::Error;

/// Errors surfaced by a bus transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bus connection is closed")]
    Closed,

    #[error("queue '{0}' does not exist")]
    UnknownQueue(String),

    #[error("message has no reply address")]
    NoReplyAddress,

    #[error("reply subscription is closed")]
    ReplyChannelClosed,
}
