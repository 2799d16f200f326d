use serde::{Deserialize, Serialize};

use crate::types::{JsonRpcVersion, RequestId};

/// A JSON-RPC request envelope
///
/// `P` is the caller's params type; for bodies whose shape is not known up
/// front, use `serde_json::Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    pub params: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl<P> JsonRpcRequest<P> {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: P) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Create a request without an id (a notification in JSON-RPC terms)
    pub fn notification(method: impl Into<String>, params: P) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id: None,
        }
    }
}
