//! # Lifecycle Event Contracts
//!
//! Immutable event shapes exchanged between the intake, execution and
//! notification services. Each event carries its own identity (`event_id`),
//! occurrence time and the correlation id of the causal chain it belongs to;
//! the serde tag on [`TaskLifecycleEvent`] is the wire discriminator used to
//! reconstruct the concrete kind on the consuming side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task was accepted by the intake service and awaits execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub task_type: String,
    pub priority: String,
    pub payload: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl TaskCreated {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        task_type: impl Into<String>,
        priority: impl Into<String>,
        payload: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            task_type: task_type.into(),
            priority: priority.into(),
            payload,
            scheduled_at,
        }
    }
}

/// An execution attempt began
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStarted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
}

impl TaskStarted {
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        started_at: DateTime<Utc>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            started_at,
        }
    }
}

/// A handler reported fine-grained progress for a running execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub progress_percent: i32,
    pub status_message: Option<String>,
}

impl TaskProgressUpdated {
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        progress_percent: i32,
        status_message: Option<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            progress_percent,
            status_message,
        }
    }
}

/// An execution attempt finished successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub result_location: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl TaskCompleted {
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        result_location: Option<String>,
        completed_at: DateTime<Utc>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            result_location,
            completed_at,
        }
    }
}

/// An execution attempt failed; `retry_count` is the attempt counter at the
/// moment of failure so consumers can distinguish retryable failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub error_message: String,
    pub error_details: Option<String>,
    pub retry_count: i32,
    pub failed_at: DateTime<Utc>,
}

impl TaskFailed {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        error_message: impl Into<String>,
        error_details: Option<String>,
        retry_count: i32,
        failed_at: DateTime<Utc>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            error_message: error_message.into(),
            error_details,
            retry_count,
            failed_at,
        }
    }
}

/// A task was cancelled before or during execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCancelled {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub cancelled_at: DateTime<Utc>,
}

impl TaskCancelled {
    pub fn new(
        task_id: Uuid,
        user_id: impl Into<String>,
        cancelled_at: DateTime<Utc>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            task_id,
            user_id: user_id.into(),
            cancelled_at,
        }
    }
}

/// All lifecycle event kinds, tagged for the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TaskLifecycleEvent {
    Created(TaskCreated),
    Started(TaskStarted),
    ProgressUpdated(TaskProgressUpdated),
    Completed(TaskCompleted),
    Failed(TaskFailed),
    Cancelled(TaskCancelled),
}

impl TaskLifecycleEvent {
    /// String discriminator, matching the serde wire tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Started(_) => "started",
            Self::ProgressUpdated(_) => "progress_updated",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            Self::Created(e) => e.event_id,
            Self::Started(e) => e.event_id,
            Self::ProgressUpdated(e) => e.event_id,
            Self::Completed(e) => e.event_id,
            Self::Failed(e) => e.event_id,
            Self::Cancelled(e) => e.event_id,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Created(e) => &e.correlation_id,
            Self::Started(e) => &e.correlation_id,
            Self::ProgressUpdated(e) => &e.correlation_id,
            Self::Completed(e) => &e.correlation_id,
            Self::Failed(e) => &e.correlation_id,
            Self::Cancelled(e) => &e.correlation_id,
        }
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Created(e) => e.task_id,
            Self::Started(e) => e.task_id,
            Self::ProgressUpdated(e) => e.task_id,
            Self::Completed(e) => e.task_id,
            Self::Failed(e) => e.task_id,
            Self::Cancelled(e) => e.task_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Created(e) => &e.user_id,
            Self::Started(e) => &e.user_id,
            Self::ProgressUpdated(e) => &e.user_id,
            Self::Completed(e) => &e.user_id,
            Self::Failed(e) => &e.user_id,
            Self::Cancelled(e) => &e.user_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Created(e) => e.occurred_at,
            Self::Started(e) => e.occurred_at,
            Self::ProgressUpdated(e) => e.occurred_at,
            Self::Completed(e) => e.occurred_at,
            Self::Failed(e) => e.occurred_at,
            Self::Cancelled(e) => e.occurred_at,
        }
    }
}

impl From<TaskCreated> for TaskLifecycleEvent {
    fn from(event: TaskCreated) -> Self {
        Self::Created(event)
    }
}

impl From<TaskStarted> for TaskLifecycleEvent {
    fn from(event: TaskStarted) -> Self {
        Self::Started(event)
    }
}

impl From<TaskProgressUpdated> for TaskLifecycleEvent {
    fn from(event: TaskProgressUpdated) -> Self {
        Self::ProgressUpdated(event)
    }
}

impl From<TaskCompleted> for TaskLifecycleEvent {
    fn from(event: TaskCompleted) -> Self {
        Self::Completed(event)
    }
}

impl From<TaskFailed> for TaskLifecycleEvent {
    fn from(event: TaskFailed) -> Self {
        Self::Failed(event)
    }
}

impl From<TaskCancelled> for TaskLifecycleEvent {
    fn from(event: TaskCancelled) -> Self {
        Self::Cancelled(event)
    }
}
