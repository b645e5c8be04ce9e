//! # Task Type Handlers
//!
//! Dynamic dispatch from the record's task-type tag to an implementation of
//! the shared handler capability. Lookup is case-insensitive and total: an
//! unmatched tag falls back to the default generic handler, never an error.
//! Cancellation is cooperative, checked between steps.

use crate::error::Result;
use crate::execution::record::ExecutionRecord;
use crate::execution::progress::ProgressSink;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How one execution attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed { result_location: Option<String> },
    Failed { error_message: String },
    Cancelled,
}

impl ExecutionOutcome {
    pub fn completed(result_location: impl Into<String>) -> Self {
        Self::Completed {
            result_location: Some(result_location.into()),
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_message: error_message.into(),
        }
    }
}

/// A worker for one task type.
///
/// Handlers report progress through the sink and check the cancellation
/// token at their own checkpoints; on observing cancellation they unwind
/// without persisting work beyond the last completed step.
#[async_trait]
pub trait TaskTypeHandler: Send + Sync {
    fn task_type(&self) -> &str;

    async fn handle(
        &self,
        record: &ExecutionRecord,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome>;
}

/// Sleep one pacing interval, waking early on cancellation.
/// Returns true when the token fired.
async fn pace(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

/// Step pacing derived from the record priority; higher priority runs hotter
fn step_delay(priority: &str) -> Duration {
    match priority.to_lowercase().as_str() {
        "critical" => Duration::from_millis(20),
        "high" => Duration::from_millis(50),
        "medium" => Duration::from_millis(100),
        "low" => Duration::from_millis(200),
        _ => Duration::from_millis(100),
    }
}

/// Fallback handler used for every unmatched task type
pub struct DefaultTaskHandler;

#[async_trait]
impl TaskTypeHandler for DefaultTaskHandler {
    fn task_type(&self) -> &str {
        "Default"
    }

    async fn handle(
        &self,
        record: &ExecutionRecord,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        info!(task_id = %record.task_id, task_type = %record.task_type, "Using default handler");

        let steps = 5;
        let delay = step_delay(&record.priority);
        for step in 1..=steps {
            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }

            let percent = (step * 100) / steps;
            progress.report(percent, format!("Processing step {step}/{steps}"));

            if pace(delay, cancel).await {
                return Ok(ExecutionOutcome::Cancelled);
            }
        }

        let result_location = format!(
            "results/{}/{}.json",
            record.task_id,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        Ok(ExecutionOutcome::completed(result_location))
    }
}

/// Simulated email delivery; pulls the recipient out of the JSON payload
pub struct EmailTaskHandler;

#[async_trait]
impl TaskTypeHandler for EmailTaskHandler {
    fn task_type(&self) -> &str {
        "Email"
    }

    async fn handle(
        &self,
        record: &ExecutionRecord,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        info!(task_id = %record.task_id, "Processing email task");

        progress.report(20, "Parsing email data");
        if pace(Duration::from_millis(30), cancel).await {
            return Ok(ExecutionOutcome::Cancelled);
        }

        let recipient = record.payload.as_deref().and_then(|payload| {
            match serde_json::from_str::<serde_json::Value>(payload) {
                Ok(value) => value
                    .get("recipient")
                    .and_then(|r| r.as_str())
                    .map(str::to_string),
                Err(_) => {
                    warn!(task_id = %record.task_id, "Invalid payload format for email task");
                    None
                }
            }
        });

        progress.report(50, "Preparing email content");
        if pace(Duration::from_millis(40), cancel).await {
            return Ok(ExecutionOutcome::Cancelled);
        }

        progress.report(80, "Sending email");
        if pace(Duration::from_millis(50), cancel).await {
            return Ok(ExecutionOutcome::Cancelled);
        }

        info!(
            task_id = %record.task_id,
            recipient = recipient.as_deref().unwrap_or("default"),
            "Email sent"
        );
        Ok(ExecutionOutcome::completed(format!(
            "email://{}",
            recipient.as_deref().unwrap_or("sent")
        )))
    }
}

/// Simulated report generation
pub struct ReportTaskHandler;

#[async_trait]
impl TaskTypeHandler for ReportTaskHandler {
    fn task_type(&self) -> &str {
        "Report"
    }

    async fn handle(
        &self,
        record: &ExecutionRecord,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        info!(task_id = %record.task_id, "Generating report");

        let stages = [
            (10, "Initializing report generator"),
            (30, "Fetching data"),
            (60, "Processing statistics"),
            (80, "Generating report file"),
            (95, "Finalizing report"),
        ];
        for (percent, message) in stages {
            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }
            progress.report(percent, message);
            if pace(Duration::from_millis(40), cancel).await {
                return Ok(ExecutionOutcome::Cancelled);
            }
        }

        let file_name = format!("report_{}.txt", Utc::now().format("%Y%m%d%H%M%S"));
        let result_location = format!("files/reports/{}/{}", record.task_id, file_name);
        info!(task_id = %record.task_id, result_location = %result_location, "Report generated");
        Ok(ExecutionOutcome::completed(result_location))
    }
}

/// Simulated batch data processing with priority-scaled pacing
pub struct DataProcessingTaskHandler;

#[async_trait]
impl TaskTypeHandler for DataProcessingTaskHandler {
    fn task_type(&self) -> &str {
        "DataProcessing"
    }

    async fn handle(
        &self,
        record: &ExecutionRecord,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        info!(task_id = %record.task_id, "Processing data");

        let total_batches = 10;
        let delay = match record.priority.to_lowercase().as_str() {
            "critical" => Duration::from_millis(10),
            "high" => Duration::from_millis(20),
            "medium" => Duration::from_millis(40),
            "low" => Duration::from_millis(60),
            _ => Duration::from_millis(40),
        };

        for batch in 1..=total_batches {
            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }

            let percent = (batch * 100) / total_batches;
            progress.report(percent, format!("Processing batch {batch}/{total_batches}"));

            if pace(delay, cancel).await {
                return Ok(ExecutionOutcome::Cancelled);
            }
        }

        let result_location = format!(
            "data/{}/processed_{}.parquet",
            record.task_id,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        info!(task_id = %record.task_id, result_location = %result_location, "Data processing completed");
        Ok(ExecutionOutcome::completed(result_location))
    }
}

/// Case-insensitive task-type dispatch table with a total fallback
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskTypeHandler>>,
    default_handler: Arc<dyn TaskTypeHandler>,
}

impl HandlerRegistry {
    /// Registry with the built-in handlers and the generic fallback
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            default_handler: Arc::new(DefaultTaskHandler),
        };
        registry.register(Arc::new(EmailTaskHandler));
        registry.register(Arc::new(ReportTaskHandler));
        registry.register(Arc::new(DataProcessingTaskHandler));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn TaskTypeHandler>) {
        self.handlers
            .insert(handler.task_type().to_lowercase(), handler);
    }

    /// Never fails: unmatched tags resolve to the default handler
    pub fn resolve(&self, task_type: &str) -> Arc<dyn TaskTypeHandler> {
        self.handlers
            .get(&task_type.to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default_handler.clone())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
