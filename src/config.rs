use crate::error::{Result, TaskFlowError};

/// Runtime configuration shared by the TaskFlow services.
///
/// Values are source-agnostic: `Default` carries development settings and
/// `from_env` overlays `TASKFLOW_*` environment variables on top of it.
#[derive(Debug, Clone)]
pub struct TaskFlowConfig {
    /// Broker endpoint (AMQP-style URL; unused by the in-memory broker)
    pub broker_url: String,
    pub broker_username: String,
    pub broker_password: String,
    /// Maximum in-flight handler invocations per consumer registration
    pub concurrency_limit: usize,
    /// Base redelivery backoff; subsequent attempts double it (base, 2x, 4x)
    pub retry_interval_ms: u64,
    /// How often the outbox processor polls for unpublished rows
    pub outbox_poll_interval_ms: u64,
    /// Rows fetched per outbox poll
    pub outbox_batch_size: usize,
    /// Publish attempts per outbox row before it is left for an operator
    pub outbox_retry_limit: i32,
    /// Execution attempts per task beyond the first (MaxRetries)
    pub max_execution_retries: i32,
    /// Buffered notifications per realtime channel
    pub notification_channel_capacity: usize,
}

impl Default for TaskFlowConfig {
    fn default() -> Self {
        Self {
            broker_url: "amqp://localhost:5672/%2f".to_string(),
            broker_username: "guest".to_string(),
            broker_password: "guest".to_string(),
            concurrency_limit: 10,
            retry_interval_ms: 5000,
            outbox_poll_interval_ms: 5000,
            outbox_batch_size: 100,
            outbox_retry_limit: 5,
            max_execution_retries: 3,
            notification_channel_capacity: 256,
        }
    }
}

impl TaskFlowConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TASKFLOW_BROKER_URL") {
            config.broker_url = url;
        }

        if let Ok(username) = std::env::var("TASKFLOW_BROKER_USERNAME") {
            config.broker_username = username;
        }

        if let Ok(password) = std::env::var("TASKFLOW_BROKER_PASSWORD") {
            config.broker_password = password;
        }

        if let Ok(limit) = std::env::var("TASKFLOW_CONCURRENCY_LIMIT") {
            config.concurrency_limit = limit.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid concurrency_limit: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TASKFLOW_RETRY_INTERVAL_MS") {
            config.retry_interval_ms = interval.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid retry_interval_ms: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TASKFLOW_OUTBOX_POLL_INTERVAL_MS") {
            config.outbox_poll_interval_ms = interval.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid outbox_poll_interval_ms: {e}"))
            })?;
        }

        if let Ok(batch) = std::env::var("TASKFLOW_OUTBOX_BATCH_SIZE") {
            config.outbox_batch_size = batch.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid outbox_batch_size: {e}"))
            })?;
        }

        if let Ok(limit) = std::env::var("TASKFLOW_OUTBOX_RETRY_LIMIT") {
            config.outbox_retry_limit = limit.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid outbox_retry_limit: {e}"))
            })?;
        }

        if let Ok(retries) = std::env::var("TASKFLOW_MAX_EXECUTION_RETRIES") {
            config.max_execution_retries = retries.parse().map_err(|e| {
                TaskFlowError::ConfigurationError(format!("Invalid max_execution_retries: {e}"))
            })?;
        }

        Ok(config)
    }
}
