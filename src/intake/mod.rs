//! # Task Intake Service
//!
//! Owns the user-visible [`Task`] aggregate and its state machine. Commands
//! write the task and its outbox row together; consumers advance the task
//! from the execution service's lifecycle events.

pub mod consumers;
pub mod service;
pub mod states;
pub mod store;
pub mod task;

pub use consumers::{TaskCompletedConsumer, TaskFailedConsumer, TaskStartedConsumer};
pub use service::{CreateTaskRequest, TaskIntakeService, MAX_USER_TASKS};
pub use states::TaskStatus;
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::Task;
