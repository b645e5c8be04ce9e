//! # Task Model
//!
//! The canonical user-visible task aggregate. Only the intake service's own
//! transition methods mutate it; the execution side influences it purely
//! through consumed lifecycle events. Invalid transitions are rejected and
//! leave the task unchanged.

use crate::error::{Result, TaskFlowError};
use crate::events::{Priority, TaskType};
use crate::intake::states::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub payload: Option<String>,
    pub status: TaskStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub result_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        user_id: impl Into<String>,
        task_type: TaskType,
        priority: Priority,
        payload: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            task_type,
            priority,
            payload,
            status: TaskStatus::Created,
            scheduled_at,
            result_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Created -> Pending, as part of accepting the task
    pub fn mark_pending(&mut self) -> Result<()> {
        if self.status != TaskStatus::Created {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot mark task {} as pending from {}",
                self.id, self.status
            )));
        }
        self.status = TaskStatus::Pending;
        self.touch();
        Ok(())
    }

    /// Pending -> Running, driven by a consumed `TaskStarted` event
    pub fn mark_running(&mut self) -> Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot mark task {} as running from {}",
                self.id, self.status
            )));
        }
        self.status = TaskStatus::Running;
        self.touch();
        Ok(())
    }

    /// Running or Pending -> Completed. Pending is allowed because the
    /// completion event can overtake the started event on the wire.
    pub fn mark_completed(&mut self, result_location: Option<String>) -> Result<()> {
        if !matches!(self.status, TaskStatus::Running | TaskStatus::Pending) {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot mark task {} as completed from {}",
                self.id, self.status
            )));
        }
        self.status = TaskStatus::Completed;
        self.result_location = result_location;
        self.touch();
        Ok(())
    }

    /// Any state except Cancelled/Completed -> Failed
    pub fn mark_failed(&mut self) -> Result<()> {
        if matches!(self.status, TaskStatus::Cancelled | TaskStatus::Completed) {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot mark task {} as failed from {}",
                self.id, self.status
            )));
        }
        self.status = TaskStatus::Failed;
        self.touch();
        Ok(())
    }

    /// Any state except Completed/Cancelled -> Cancelled. Cancelled is
    /// terminal: there is no outgoing edge.
    pub fn cancel(&mut self) -> Result<()> {
        if self.status == TaskStatus::Cancelled {
            return Err(TaskFlowError::InvalidTransition(format!(
                "task {} is already cancelled",
                self.id
            )));
        }
        if self.status == TaskStatus::Completed {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot cancel completed task {}",
                self.id
            )));
        }
        self.status = TaskStatus::Cancelled;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
