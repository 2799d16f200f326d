//! Correlated request/response client for busrpc.
//!
//! The bus is fire-and-forget; this crate layers correlation on top of it.
//! Each [`RpcClient::request`] call owns one reply subscription, applies a
//! timeout and a reply-count limit, and releases the subscription on every
//! settle path so late replies are inert. The high-level entry points run
//! envelope and payload validation on replies before the caller sees them,
//! with timeout, envelope/protocol and payload failures kept distinct.

pub mod client;
pub mod config;
pub mod error;

pub use client::{RpcClient, RpcReply, ValidatedReply};
pub use config::{ClientConfig, RequestOverrides};
pub use error::{ClientError, ClientResult};
