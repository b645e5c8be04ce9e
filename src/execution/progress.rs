//! # Progress Channel
//!
//! Handlers report progress through an explicit channel; a dedicated drain
//! task performs the persistence and publish for each report in its own unit
//! of work, decoupling handler control flow from persistence latency.
//! Progress failures of any kind are logged and swallowed; they never abort
//! the main execution.

use crate::events::{TaskLifecycleEvent, TaskProgressUpdated};
use crate::execution::store::ExecutionStore;
use crate::messaging::EventBusGateway;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// One report from a handler, 0-100
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: i32,
    pub message: Option<String>,
}

/// Write end handed to task handlers
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressSink {
    /// Queue a report. A closed channel means the drain already stopped;
    /// the report is dropped silently because progress must never fail the
    /// handler.
    pub fn report(&self, percent: i32, message: impl Into<String>) {
        let update = ProgressUpdate {
            percent,
            message: Some(message.into()),
        };
        if self.tx.send(update).is_err() {
            warn!(percent = percent, "Progress sink closed, dropping report");
        }
    }
}

/// Create a sink plus the receiver its drain task consumes
pub fn progress_channel() -> (ProgressSink, mpsc::UnboundedReceiver<ProgressUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSink { tx }, rx)
}

/// Drain reports until every sink clone is dropped.
///
/// Each report independently re-reads the record (its own unit of work since
/// reports run concurrently with the main execution), persists the latest
/// percent/message and emits `TaskProgressUpdated` carrying the percent
/// exactly as reported.
pub(crate) async fn drain_progress(
    task_id: Uuid,
    user_id: String,
    correlation_id: String,
    store: Arc<dyn ExecutionStore>,
    gateway: Arc<EventBusGateway>,
    mut rx: mpsc::UnboundedReceiver<ProgressUpdate>,
) {
    while let Some(update) = rx.recv().await {
        if let Err(err) = apply_report(
            task_id,
            &user_id,
            &correlation_id,
            store.as_ref(),
            gateway.as_ref(),
            &update,
        )
        .await
        {
            error!(
                task_id = %task_id,
                percent = update.percent,
                error = %err,
                "Failed to apply progress report"
            );
        }
    }
    debug!(task_id = %task_id, "Progress drain finished");
}

async fn apply_report(
    task_id: Uuid,
    user_id: &str,
    correlation_id: &str,
    store: &dyn ExecutionStore,
    gateway: &EventBusGateway,
    update: &ProgressUpdate,
) -> crate::error::Result<()> {
    let Some(mut record) = store.get_by_task_id(task_id).await? else {
        warn!(task_id = %task_id, "Cannot update progress - record not found");
        return Ok(());
    };

    record.update_progress(update.percent, update.message.clone())?;
    store.update(record).await?;

    let event: TaskLifecycleEvent = TaskProgressUpdated::new(
        task_id,
        user_id,
        update.percent,
        update.message.clone(),
        correlation_id,
    )
    .into();
    gateway.publish(&event).map_err(crate::error::TaskFlowError::from)?;
    Ok(())
}
