//! # TaskFlow Core
//!
//! Rust core for the TaskFlow distributed task-processing platform: three
//! cooperating services (task intake, execution, notification) that
//! communicate exclusively through durable asynchronous events over a broker.
//!
//! ## Overview
//!
//! The hard problem this crate solves is making a task progress through its
//! lifecycle exactly once end-to-end on top of an at-least-once transport,
//! process crashes and concurrent retries. Four mechanisms cooperate:
//!
//! - **Transactional outbox** ([`outbox`]): events are appended in the same
//!   unit of work as the state transition that produced them and published
//!   by a background processor.
//! - **Idempotency ledger** ([`idempotency`]): consumers deduplicate on
//!   (event id, consumer name) so redeliveries never re-apply side effects.
//! - **Delivery policy** ([`messaging`]): a per-consumer concurrency ceiling
//!   and bounded exponential-backoff redelivery, with competing consumers on
//!   deterministically named queues.
//! - **Cooperating state machines** ([`intake::Task`] and
//!   [`execution::ExecutionRecord`]): kept consistent purely through events,
//!   with a bounded retry loop and fine-grained progress reporting on the
//!   execution side.
//!
//! ## Module Organization
//!
//! - [`events`] - Lifecycle event contracts and Priority/TaskType values
//! - [`messaging`] - Broker abstraction and the event bus gateway
//! - [`outbox`] - Outbox store and background processor
//! - [`idempotency`] - Dedup ledger and the idempotent consumer wrapper
//! - [`intake`] - User-visible Task aggregate, commands and consumers
//! - [`execution`] - ExecutionRecord, handler registry, retry loop, progress
//! - [`notification`] - Realtime fan-out to user/task channels
//! - [`storage`] - Postgres implementations of the store traits
//! - [`system`] - Embedded wiring of all three services
//! - [`config`] - Environment-derived configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskflow_core::config::TaskFlowConfig;
//! use taskflow_core::intake::CreateTaskRequest;
//! use taskflow_core::system::TaskFlowSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = TaskFlowSystem::start(TaskFlowConfig::default())?;
//! let _outbox_loop = system.spawn_outbox_processor();
//!
//! let task = system
//!     .intake
//!     .create_task(CreateTaskRequest {
//!         user_id: "u1".to_string(),
//!         task_type: "Email".to_string(),
//!         priority: "High".to_string(),
//!         payload: Some(r#"{"recipient":"ops@example.com"}"#.to_string()),
//!         scheduled_at: None,
//!     })
//!     .await?;
//!
//! println!("accepted task {}", task.id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod idempotency;
pub mod intake;
pub mod logging;
pub mod messaging;
pub mod notification;
pub mod outbox;
pub mod storage;
pub mod system;

pub use config::TaskFlowConfig;
pub use error::{Result, TaskFlowError};
pub use events::{Priority, TaskLifecycleEvent, TaskType};
pub use system::TaskFlowSystem;
