//! Transport layer interfaces for busrpc.
//!
//! The broker itself (connection lifecycle, wire protocol, delivery
//! guarantees) lives behind the [`BusTransport`] trait; this crate only
//! defines the seam the client and server crates program against, plus
//! [`InMemoryBus`], a process-local direct exchange used by the test
//! suites and demos.

pub mod error;
pub mod memory;
pub mod message;
pub mod options;
pub mod registration;
pub mod subscription;
pub mod traits;

pub use error::TransportError;
pub use memory::{BusStats, InMemoryBus};
pub use message::{Delivery, DeliveryOps};
pub use options::{HandleOptions, PublishOptions, QueueOptions, CONTENT_TYPE_JSON};
pub use registration::HandlerRegistration;
pub use subscription::ReplySubscription;
pub use traits::{BoxedBus, BusTransport, DeliveryHandler, FnDeliveryHandler, QueueInfo};
