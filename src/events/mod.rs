// Event layer for the TaskFlow services.
//
// Every cross-service message is one of the lifecycle events defined in
// `contracts`, carrying its identity (event id), occurrence time and the
// correlation id that threads a causal chain across all three services.

pub mod contracts;
pub mod types;

pub use contracts::{
    TaskCancelled, TaskCompleted, TaskCreated, TaskFailed, TaskLifecycleEvent,
    TaskProgressUpdated, TaskStarted,
};
pub use types::{Priority, TaskType};
