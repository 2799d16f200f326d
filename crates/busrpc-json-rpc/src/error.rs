use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Structured protocol error carrying the offending raw body
///
/// Distinct from a generic business error so callers can branch on "this is
/// an envelope/protocol problem with a reconstructible body". The message
/// aggregates every violation found in the body; the body is retained for
/// logging or replay.
#[derive(Debug, Clone)]
pub struct RpcError {
    pub message: String,
    pub body: Value,
}

impl RpcError {
    pub fn new(message: impl Into<String>, body: Value) -> Self {
        Self {
            message: message.into(),
            body,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RpcError {}

/// Rejection from a caller-supplied payload validator
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PayloadError {
    pub message: String,
}

impl PayloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Outcome of a failed envelope validation
///
/// The three variants keep the causes a caller must tell apart separate:
/// a structurally broken envelope, a well-formed failure reply from the
/// counterpart, and a payload that does not match the expected shape.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Structural nonconformance, with every violation aggregated
    #[error("envelope error: {0}")]
    Envelope(RpcError),

    /// The counterpart explicitly returned an `error` object
    #[error("protocol error: {0}")]
    Protocol(RpcError),

    /// The caller-supplied shape check rejected `result`/`params`
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
}

impl ValidateError {
    /// The raw body the error was raised for, when one was retained
    pub fn body(&self) -> Option<&Value> {
        match self {
            ValidateError::Envelope(err) | ValidateError::Protocol(err) => Some(&err.body),
            ValidateError::Payload(_) => None,
        }
    }

    pub fn is_envelope(&self) -> bool {
        matches!(self, ValidateError::Envelope(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ValidateError::Protocol(_))
    }

    pub fn is_payload(&self) -> bool {
        matches!(self, ValidateError::Payload(_))
    }
}
