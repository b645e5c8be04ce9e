//! # Task Execution Service
//!
//! Owns the [`ExecutionRecord`] aggregate, the bounded retry loop over
//! execution attempts, the task-type handler registry and the progress
//! channel. Consumes creation/cancellation events and emits the rest of the
//! lifecycle.

pub mod consumers;
pub mod handlers;
pub mod progress;
pub mod record;
pub mod service;
pub mod states;
pub mod store;

pub use consumers::{TaskCancelledConsumer, TaskCreatedConsumer};
pub use handlers::{
    DataProcessingTaskHandler, DefaultTaskHandler, EmailTaskHandler, ExecutionOutcome,
    HandlerRegistry, ReportTaskHandler, TaskTypeHandler,
};
pub use progress::{progress_channel, ProgressSink, ProgressUpdate};
pub use record::ExecutionRecord;
pub use service::{ProcessTaskSignal, TaskExecutionService};
pub use states::ExecutionStatus;
pub use store::{ExecutionStore, InMemoryExecutionStore};
