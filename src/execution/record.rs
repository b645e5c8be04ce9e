//! # Execution Record
//!
//! The execution-side aggregate tracking actual work attempts for one task.
//! Exactly one record exists per task id; it advances its own state machine
//! independently of the intake-side Task and the two stay consistent only
//! through the lifecycle events.

use crate::error::{Result, TaskFlowError};
use crate::execution::states::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub task_type: String,
    pub priority: String,
    pub payload: Option<String>,
    pub status: ExecutionStatus,
    pub progress_percent: i32,
    pub status_message: Option<String>,
    pub result_location: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub correlation_id: String,
}

impl ExecutionRecord {
    pub fn create(
        task_id: Uuid,
        user_id: impl Into<String>,
        task_type: impl Into<String>,
        priority: impl Into<String>,
        payload: Option<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            user_id: user_id.into(),
            task_type: task_type.into(),
            priority: priority.into(),
            payload,
            status: ExecutionStatus::Queued,
            progress_percent: 0,
            status_message: None,
            result_location: None,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            correlation_id: correlation_id.into(),
        }
    }

    /// Queued -> Running
    pub fn start(&mut self) -> Result<()> {
        if self.status != ExecutionStatus::Queued {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot start execution for task {} in {} status",
                self.task_id, self.status
            )));
        }
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress_percent = 0;
        Ok(())
    }

    /// Record a progress report; only valid while Running. The persisted
    /// percent is clamped to 0-100.
    pub fn update_progress(&mut self, percent: i32, message: Option<String>) -> Result<()> {
        if self.status != ExecutionStatus::Running {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot update progress for task {} in {} status",
                self.task_id, self.status
            )));
        }
        self.progress_percent = percent.clamp(0, 100);
        self.status_message = message;
        Ok(())
    }

    /// Running -> Completed, percent forced to 100
    pub fn complete(&mut self, result_location: Option<String>) -> Result<()> {
        if self.status != ExecutionStatus::Running {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot complete execution for task {} in {} status",
                self.task_id, self.status
            )));
        }
        self.status = ExecutionStatus::Completed;
        self.progress_percent = 100;
        self.result_location = result_location;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> Failed with the error recorded
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        if self.status != ExecutionStatus::Running {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot fail execution for task {} in {} status",
                self.task_id, self.status
            )));
        }
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// External cancellation; rejected only once the record completed
    pub fn cancel(&mut self) -> Result<()> {
        if self.status == ExecutionStatus::Completed {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot cancel completed execution for task {}",
                self.task_id
            )));
        }
        self.status = ExecutionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Whether another attempt may run: Failed and below the retry ceiling
    pub fn can_retry(&self, max_retries: i32) -> bool {
        self.status == ExecutionStatus::Failed && self.retry_count < max_retries
    }

    /// Failed -> Queued, clearing the transient fields of the spent attempt
    pub fn reset_for_retry(&mut self) -> Result<()> {
        if self.status != ExecutionStatus::Failed {
            return Err(TaskFlowError::InvalidTransition(format!(
                "cannot retry execution for task {} in {} status",
                self.task_id, self.status
            )));
        }
        self.status = ExecutionStatus::Queued;
        self.started_at = None;
        self.completed_at = None;
        self.error_message = None;
        self.progress_percent = 0;
        Ok(())
    }

    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ExecutionRecord {
        ExecutionRecord::create(Uuid::new_v4(), "u1", "Email", "High", None, "corr")
    }

    #[test]
    fn test_fresh_record_is_queued() {
        let record = record();
        assert_eq!(record.status, ExecutionStatus::Queued);
        assert_eq!(record.progress_percent, 0);
        assert_eq!(record.retry_count, 0);
        assert!(record.started_at.is_none());
    }

    #[test]
    fn test_happy_path_edges() {
        let mut record = record();
        record.start().unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.started_at.is_some());

        record.update_progress(40, Some("working".into())).unwrap();
        assert_eq!(record.progress_percent, 40);

        record.complete(Some("results/1.json".into())).unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.progress_percent, 100);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn test_start_requires_queued() {
        let mut record = record();
        record.start().unwrap();
        let before = record.clone();
        assert!(record.start().is_err());
        assert_eq!(record, before);
    }

    #[test]
    fn test_progress_is_clamped_and_requires_running() {
        let mut record = record();
        assert!(record.update_progress(10, None).is_err());

        record.start().unwrap();
        record.update_progress(150, None).unwrap();
        assert_eq!(record.progress_percent, 100);
        record.update_progress(-5, None).unwrap();
        assert_eq!(record.progress_percent, 0);
    }

    #[test]
    fn test_retry_cycle() {
        let mut record = record();
        record.start().unwrap();
        record.fail("first failure").unwrap();

        assert!(record.can_retry(3));
        record.reset_for_retry().unwrap();
        record.increment_retry();

        assert_eq!(record.status, ExecutionStatus::Queued);
        assert_eq!(record.retry_count, 1);
        assert!(record.started_at.is_none());
        assert!(record.error_message.is_none());
        assert_eq!(record.progress_percent, 0);
    }

    #[test]
    fn test_retry_ceiling_is_permanent() {
        let mut record = record();
        for _ in 0..3 {
            record.start().unwrap();
            record.fail("boom").unwrap();
            if record.can_retry(3) {
                record.reset_for_retry().unwrap();
                record.increment_retry();
            }
        }
        assert_eq!(record.retry_count, 3);
        assert_eq!(record.status, ExecutionStatus::Queued);
        record.start().unwrap();
        record.fail("final").unwrap();
        // At the ceiling the Failed state is terminal for the retry loop.
        assert!(!record.can_retry(3));
    }

    #[test]
    fn test_cancel_rejected_only_when_completed() {
        let mut record = record();
        record.cancel().unwrap();
        assert_eq!(record.status, ExecutionStatus::Cancelled);

        let mut record = ExecutionRecord::create(
            Uuid::new_v4(),
            "u1",
            "Email",
            "High",
            None,
            "corr",
        );
        record.start().unwrap();
        record.complete(None).unwrap();
        assert!(record.cancel().is_err());
    }

    #[test]
    fn test_reset_requires_failed() {
        let mut record = record();
        assert!(record.reset_for_retry().is_err());
        record.start().unwrap();
        assert!(record.reset_for_retry().is_err());
    }
}
