//! # Intake-Side Event Consumers
//!
//! Advance the user-visible Task to match what the execution service reports.
//! Invalid transitions and unknown tasks are logged and dropped, never
//! re-raised: a task already in a terminal state silently ignores late or
//! duplicate lifecycle events. Store errors do propagate so the bus retry
//! policy can redeliver.

use crate::error::{Result, TaskFlowError};
use crate::events::TaskLifecycleEvent;
use crate::intake::store::TaskStore;
use crate::messaging::EventConsumer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TaskStartedConsumer {
    store: Arc<dyn TaskStore>,
}

impl TaskStartedConsumer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventConsumer for TaskStartedConsumer {
    fn name(&self) -> &str {
        "intake-task-started"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let started = match event {
            TaskLifecycleEvent::Started(started) => started,
            other => {
                warn!(event_type = other.event_type(), "Unexpected event kind, dropping");
                return Ok(());
            }
        };

        let Some(mut task) = self.store.get(started.task_id).await? else {
            warn!(task_id = %started.task_id, "Task not found, dropping started event");
            return Ok(());
        };

        match task.mark_running() {
            Ok(()) => {
                self.store.update(task).await?;
                info!(task_id = %started.task_id, "Task marked as running");
            }
            Err(TaskFlowError::InvalidTransition(reason)) => {
                warn!(task_id = %started.task_id, reason = %reason, "Dropping started event");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

pub struct TaskCompletedConsumer {
    store: Arc<dyn TaskStore>,
}

impl TaskCompletedConsumer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventConsumer for TaskCompletedConsumer {
    fn name(&self) -> &str {
        "intake-task-completed"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let completed = match event {
            TaskLifecycleEvent::Completed(completed) => completed,
            other => {
                warn!(event_type = other.event_type(), "Unexpected event kind, dropping");
                return Ok(());
            }
        };

        let Some(mut task) = self.store.get(completed.task_id).await? else {
            warn!(task_id = %completed.task_id, "Task not found, dropping completed event");
            return Ok(());
        };

        match task.mark_completed(completed.result_location.clone()) {
            Ok(()) => {
                self.store.update(task).await?;
                info!(
                    task_id = %completed.task_id,
                    result_location = completed.result_location.as_deref(),
                    "Task marked as completed"
                );
            }
            Err(TaskFlowError::InvalidTransition(reason)) => {
                warn!(task_id = %completed.task_id, reason = %reason, "Dropping completed event");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

pub struct TaskFailedConsumer {
    store: Arc<dyn TaskStore>,
}

impl TaskFailedConsumer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventConsumer for TaskFailedConsumer {
    fn name(&self) -> &str {
        "intake-task-failed"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let failed = match event {
            TaskLifecycleEvent::Failed(failed) => failed,
            other => {
                warn!(event_type = other.event_type(), "Unexpected event kind, dropping");
                return Ok(());
            }
        };

        let Some(mut task) = self.store.get(failed.task_id).await? else {
            warn!(task_id = %failed.task_id, "Task not found, dropping failed event");
            return Ok(());
        };

        match task.mark_failed() {
            Ok(()) => {
                self.store.update(task).await?;
                info!(
                    task_id = %failed.task_id,
                    error = %failed.error_message,
                    retry_count = failed.retry_count,
                    "Task marked as failed"
                );
            }
            Err(TaskFlowError::InvalidTransition(reason)) => {
                warn!(task_id = %failed.task_id, reason = %reason, "Dropping failed event");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}
