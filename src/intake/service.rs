//! # Task Intake Service
//!
//! Accepts, cancels and queries user-visible tasks. Every accepted command
//! pairs its state transition with an outbox row; the outbox processor, not
//! the command path, talks to the broker.

use crate::error::{Result, TaskFlowError};
use crate::events::{Priority, TaskCancelled, TaskCreated, TaskLifecycleEvent, TaskType};
use crate::intake::store::TaskStore;
use crate::intake::task::Task;
use crate::outbox::OutboxMessage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Per-user ceiling on concurrently held (non-cancelled) tasks
pub const MAX_USER_TASKS: usize = 100;

#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub user_id: String,
    pub task_type: String,
    pub priority: String,
    pub payload: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

pub struct TaskIntakeService {
    store: Arc<dyn TaskStore>,
    max_user_tasks: usize,
}

impl TaskIntakeService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            max_user_tasks: MAX_USER_TASKS,
        }
    }

    pub fn with_task_limit(store: Arc<dyn TaskStore>, max_user_tasks: usize) -> Self {
        Self {
            store,
            max_user_tasks,
        }
    }

    /// Accept a new task: quota check, permissive type/priority parse,
    /// Created -> Pending, and the `TaskCreated` outbox row in the same unit
    /// of work.
    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<Task> {
        let active = self.store.count_active(&request.user_id).await?;
        if active >= self.max_user_tasks {
            return Err(TaskFlowError::QuotaExceeded(format!(
                "user {} has reached the maximum task limit ({})",
                request.user_id, self.max_user_tasks
            )));
        }

        let task_type = TaskType::parse(&request.task_type);
        let priority = Priority::parse(&request.priority);

        let mut task = Task::new(
            request.user_id.clone(),
            task_type,
            priority,
            request.payload.clone(),
            request.scheduled_at,
        );
        task.mark_pending()?;

        let correlation_id = Uuid::new_v4().to_string();
        let event: TaskLifecycleEvent = TaskCreated::new(
            task.id,
            task.user_id.clone(),
            task_type.to_string(),
            priority.to_string(),
            task.payload.clone(),
            task.scheduled_at,
            correlation_id.clone(),
        )
        .into();
        let message = OutboxMessage::for_event(&event)?;

        self.store.insert_with_outbox(task.clone(), message).await?;

        info!(
            task_id = %task.id,
            user_id = %task.user_id,
            task_type = %task_type,
            priority = %priority,
            correlation_id = %correlation_id,
            "Task created"
        );
        Ok(task)
    }

    /// Cancel a task the caller owns. Rejections (not found, unauthorized,
    /// already terminal) are explicit failure results.
    pub async fn cancel_task(&self, task_id: Uuid, user_id: &str) -> Result<Task> {
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| TaskFlowError::NotFound(format!("task {task_id}")))?;

        if task.user_id != user_id {
            return Err(TaskFlowError::Unauthorized(
                "task belongs to a different user".to_string(),
            ));
        }

        task.cancel()?;

        let event: TaskLifecycleEvent = TaskCancelled::new(
            task.id,
            task.user_id.clone(),
            task.updated_at,
            Uuid::new_v4().to_string(),
        )
        .into();
        let message = OutboxMessage::for_event(&event)?;

        self.store.update_with_outbox(task.clone(), message).await?;

        info!(task_id = %task.id, user_id = %user_id, "Task cancelled");
        Ok(task)
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| TaskFlowError::NotFound(format!("task {task_id}")))
    }

    pub async fn get_user_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        self.store.get_by_user(user_id).await
    }
}
