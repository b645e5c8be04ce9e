//! # Notification Service
//!
//! Pure consumer of every lifecycle event kind, fanning each one out to two
//! logical channel families: subscribers of the task's user and subscribers
//! of the task itself.

pub mod consumers;
pub mod service;

pub use consumers::NotificationConsumer;
pub use service::{NotificationService, TaskNotification};
