use std::time::Duration;

use busrpc_json_rpc::{PayloadError, RpcError, ValidateError};
use busrpc_transport::TransportError;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the correlated request client
///
/// The three validation causes stay distinct so callers can tell a broken
/// envelope from a counterpart-signaled failure from a wrong result shape,
/// and all of them from a transport timeout.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No reply arrived within the configured window
    #[error("no reply within {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The reply body does not conform to the JSON-RPC envelope
    #[error("envelope error: {0}")]
    Envelope(RpcError),

    /// The counterpart replied with a JSON-RPC error object
    #[error("protocol error: {0}")]
    Protocol(RpcError),

    /// The reply payload failed the caller-supplied shape check
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
}

impl From<ValidateError> for ClientError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Envelope(e) => ClientError::Envelope(e),
            ValidateError::Protocol(e) => ClientError::Protocol(e),
            ValidateError::Payload(e) => ClientError::Payload(e),
        }
    }
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol(_))
    }
}
