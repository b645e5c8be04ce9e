//! # Transactional Outbox
//!
//! Events are appended to the outbox in the same unit of work as the state
//! transition that produced them, then published asynchronously by the
//! processor. This is what keeps "state changed" and "event will eventually
//! be sent" atomic without a distributed transaction.

pub mod message;
pub mod processor;
pub mod store;

pub use message::OutboxMessage;
pub use processor::{DrainSummary, OutboxProcessor};
pub use store::{InMemoryOutboxStore, OutboxStore};
