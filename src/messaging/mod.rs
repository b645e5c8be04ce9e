//! # Messaging Layer
//!
//! Broker abstraction for the TaskFlow services: an in-process broker with
//! competing-consumer queues and the gateway that applies the shared delivery
//! policy (concurrency ceiling, bounded backoff redelivery, dead-lettering).

pub mod broker;
pub mod errors;
pub mod event_bus;

pub use broker::InMemoryBroker;
pub use errors::{MessagingError, MessagingResult};
pub use event_bus::{EventBusGateway, EventConsumer, RetryPolicy};
