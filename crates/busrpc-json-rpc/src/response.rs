use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcSuccess<R> {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub result: R,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl<R> JsonRpcSuccess<R> {
    pub fn new(id: Option<RequestId>, result: R) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            result,
            id,
        }
    }
}

/// The `error` member of a failure envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject<E = Value> {
    pub code: i64,
    pub message: String,
    // No `serde(default)` here: it would put a `Default` bound on `E`,
    // and a missing `Option` field deserializes as `None` anyway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<E>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(error_codes::INVALID_REQUEST, "Invalid Request", None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message, None)
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(
            error_codes::INTERNAL_ERROR,
            message.unwrap_or_else(|| "Internal error".to_string()),
            None,
        )
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        assert!(
            (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(code, message, data)
    }
}

/// A failure JSON-RPC response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcFailure<E = Value> {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub error: ErrorObject<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl<E> JsonRpcFailure<E> {
    pub fn new(id: Option<RequestId>, error: ErrorObject<E>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            error,
            id,
        }
    }
}
