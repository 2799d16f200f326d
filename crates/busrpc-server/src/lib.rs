//! Subscriber-side message handling for busrpc.
//!
//! A malformed message must never crash a long-running subscriber or be
//! mis-attributed to an unrelated delivery. The [`ValidatedHandler`]
//! wrapper settles every inbound message exactly one way: validated and
//! dispatched to the business handler, or diverted to the invalid-message
//! callback. [`BusServer`] layers the declarative registration surface on
//! top (queue per routing key, bound to the instance's default exchange,
//! deferred subscription start).

pub mod handler;
pub mod server;

pub use handler::{
    rpc_validated_handler, validated_handler, FnInvalidMessageHandler, FnMessageHandler,
    InvalidMessageHandler, MessageHandler, ValidatedHandler,
};
pub use server::BusServer;
