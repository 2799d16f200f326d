//! # JSON-RPC 2.0 Envelopes for Bus Messaging
//!
//! Envelope types and validation for services that exchange JSON-RPC 2.0
//! requests and responses over an asynchronous message bus. This crate is
//! pure: it never touches the transport. It provides the envelope structs,
//! the structured [`RpcError`] carrying the offending raw body, and the
//! validation entry points that aggregate every violation found in a body
//! instead of failing on the first one.
//!
//! ## Features
//! - Typed request/success/failure envelopes with serde support
//! - Violation-aggregating request and response validation
//! - Caller-supplied payload validators, kept distinct from envelope errors

pub mod error;
pub mod request;
pub mod response;
pub mod types;
pub mod validate;

// Re-export main types
pub use error::{PayloadError, RpcError, ValidateError};
pub use request::JsonRpcRequest;
pub use response::{ErrorObject, JsonRpcFailure, JsonRpcSuccess};
pub use types::{JsonRpcVersion, RequestId};
pub use validate::{json_payload, validate_request, validate_response};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
