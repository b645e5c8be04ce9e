//! # Task Execution Service
//!
//! Drives an execution record through one attempt: create-or-reset, start,
//! dispatch to the type handler with a progress channel and a cooperative
//! cancellation token, then settle the outcome. Failures are recorded and
//! emitted, never thrown through the worker; a retryable failure waits for a
//! fresh creation-equivalent signal rather than an internal timer.

use crate::error::{Result, TaskFlowError};
use crate::events::{TaskCompleted, TaskFailed, TaskLifecycleEvent, TaskStarted};
use crate::execution::handlers::{ExecutionOutcome, HandlerRegistry};
use crate::execution::progress::{drain_progress, progress_channel};
use crate::execution::record::ExecutionRecord;
use crate::execution::store::ExecutionStore;
use crate::messaging::EventBusGateway;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fields of an incoming creation-equivalent signal
#[derive(Debug, Clone)]
pub struct ProcessTaskSignal {
    pub task_id: Uuid,
    pub user_id: String,
    pub task_type: String,
    pub priority: String,
    pub payload: Option<String>,
    pub correlation_id: String,
}

pub struct TaskExecutionService {
    store: Arc<dyn ExecutionStore>,
    registry: Arc<HandlerRegistry>,
    gateway: Arc<EventBusGateway>,
    max_retries: i32,
    in_flight: DashMap<Uuid, CancellationToken>,
}

impl TaskExecutionService {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        registry: Arc<HandlerRegistry>,
        gateway: Arc<EventBusGateway>,
        max_retries: i32,
    ) -> Self {
        Self {
            store,
            registry,
            gateway,
            max_retries,
            in_flight: DashMap::new(),
        }
    }

    /// Current record for a task, if the execution service has seen it
    pub async fn record_for_task(&self, task_id: Uuid) -> Result<Option<ExecutionRecord>> {
        self.store.get_by_task_id(task_id).await
    }

    /// Handle one creation-equivalent signal. Returns whether the attempt
    /// completed successfully; an already-processed task (terminal, or Failed
    /// at the retry ceiling) is rejected with a log line and `Ok(false)`.
    pub async fn process_task(&self, signal: ProcessTaskSignal) -> Result<bool> {
        let record = match self.store.get_by_task_id(signal.task_id).await? {
            Some(mut existing) => {
                if !existing.can_retry(self.max_retries) {
                    warn!(
                        task_id = %signal.task_id,
                        status = %existing.status,
                        retry_count = existing.retry_count,
                        "Task already processed and cannot retry"
                    );
                    return Ok(false);
                }
                existing.reset_for_retry()?;
                existing.increment_retry();
                self.store.update(existing.clone()).await?;
                existing
            }
            None => {
                let record = ExecutionRecord::create(
                    signal.task_id,
                    signal.user_id,
                    signal.task_type,
                    signal.priority,
                    signal.payload,
                    signal.correlation_id,
                );
                self.store.insert(record.clone()).await?;
                record
            }
        };

        self.execute_attempt(record).await
    }

    async fn execute_attempt(&self, mut record: ExecutionRecord) -> Result<bool> {
        let task_id = record.task_id;

        record.start()?;
        self.store.update(record.clone()).await?;

        let started: TaskLifecycleEvent = TaskStarted::new(
            task_id,
            record.user_id.clone(),
            record.started_at.unwrap_or_else(Utc::now),
            record.correlation_id.clone(),
        )
        .into();
        self.gateway
            .publish(&started)
            .map_err(TaskFlowError::from)?;

        let cancel = CancellationToken::new();
        self.in_flight.insert(task_id, cancel.clone());

        let (sink, rx) = progress_channel();
        let drain = tokio::spawn(drain_progress(
            task_id,
            record.user_id.clone(),
            record.correlation_id.clone(),
            self.store.clone(),
            self.gateway.clone(),
            rx,
        ));

        let handler = self.registry.resolve(&record.task_type);
        let outcome = handler.handle(&record, &sink, &cancel).await;

        // Close the channel and wait for queued reports to land before the
        // terminal transition, so the record never regresses below 100.
        drop(sink);
        if let Err(err) = drain.await {
            error!(task_id = %task_id, error = %err, "Progress drain task panicked");
        }

        self.in_flight.remove(&task_id);

        // Re-read: the drain task and external cancellation both write the
        // record concurrently with this attempt.
        let mut record = self
            .store
            .get_by_task_id(task_id)
            .await?
            .ok_or_else(|| TaskFlowError::StorageError(format!("execution record for task {task_id} vanished")))?;

        match outcome {
            Ok(ExecutionOutcome::Completed { result_location }) => {
                // External cancellation can land between the handler finishing
                // and this settlement; the guard rejection is final then.
                if let Err(TaskFlowError::InvalidTransition(reason)) =
                    record.complete(result_location.clone())
                {
                    warn!(task_id = %task_id, reason = %reason, "Dropping completion");
                    return Ok(false);
                }
                self.store.update(record.clone()).await?;

                let completed: TaskLifecycleEvent = TaskCompleted::new(
                    task_id,
                    record.user_id.clone(),
                    result_location,
                    record.completed_at.unwrap_or_else(Utc::now),
                    record.correlation_id.clone(),
                )
                .into();
                self.gateway
                    .publish(&completed)
                    .map_err(TaskFlowError::from)?;

                info!(task_id = %task_id, "Task completed successfully");
                Ok(true)
            }
            Ok(ExecutionOutcome::Cancelled) => {
                // No event: the cancellation originated outside and its own
                // event is already on the wire.
                match record.cancel() {
                    Ok(()) => self.store.update(record).await?,
                    Err(TaskFlowError::InvalidTransition(reason)) => {
                        warn!(task_id = %task_id, reason = %reason, "Skipping cancel transition")
                    }
                    Err(err) => return Err(err),
                }
                warn!(task_id = %task_id, "Task was cancelled");
                Ok(false)
            }
            Ok(ExecutionOutcome::Failed { error_message }) => {
                self.settle_failure(record, error_message, None).await
            }
            Err(err) => {
                let details = err.to_string();
                self.settle_failure(record, details.clone(), Some(details))
                    .await
            }
        }
    }

    async fn settle_failure(
        &self,
        mut record: ExecutionRecord,
        error_message: String,
        error_details: Option<String>,
    ) -> Result<bool> {
        if let Err(TaskFlowError::InvalidTransition(reason)) = record.fail(&error_message) {
            warn!(task_id = %record.task_id, reason = %reason, "Dropping failure transition");
            return Ok(false);
        }
        self.store.update(record.clone()).await?;

        let failed: TaskLifecycleEvent = TaskFailed::new(
            record.task_id,
            record.user_id.clone(),
            error_message.clone(),
            error_details,
            record.retry_count,
            record.completed_at.unwrap_or_else(Utc::now),
            record.correlation_id.clone(),
        )
        .into();
        self.gateway.publish(&failed).map_err(TaskFlowError::from)?;

        error!(
            task_id = %record.task_id,
            error = %error_message,
            retry_count = record.retry_count,
            "Task failed"
        );

        if record.can_retry(self.max_retries) {
            info!(
                task_id = %record.task_id,
                next_attempt = record.retry_count + 1,
                max_retries = self.max_retries,
                "Retry possible on the next creation signal"
            );
        }

        Ok(false)
    }

    /// External cancellation: stop the in-flight attempt if any and move the
    /// record to Cancelled. Rejection on an already-completed record is
    /// logged, not raised.
    pub async fn handle_task_cancelled(&self, task_id: Uuid) -> Result<()> {
        if let Some((_, token)) = self.in_flight.remove(&task_id) {
            token.cancel();
        }

        let Some(mut record) = self.store.get_by_task_id(task_id).await? else {
            warn!(task_id = %task_id, "No execution record to cancel");
            return Ok(());
        };

        match record.cancel() {
            Ok(()) => {
                self.store.update(record).await?;
                info!(task_id = %task_id, "Task execution cancelled");
            }
            Err(TaskFlowError::InvalidTransition(_)) => {
                warn!(task_id = %task_id, "Could not cancel task - already completed");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}
