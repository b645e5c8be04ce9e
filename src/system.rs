//! # Embedded System Wiring
//!
//! Assembles the three services over the in-process broker with in-memory
//! stores: the wiring used by integration tests and embedded runs. Each
//! service keeps its own outbox/idempotency state; they share nothing but the
//! broker.

use crate::config::TaskFlowConfig;
use crate::error::Result;
use crate::execution::{
    HandlerRegistry, InMemoryExecutionStore, TaskCancelledConsumer, TaskCreatedConsumer,
    TaskExecutionService,
};
use crate::idempotency::{IdempotentConsumer, InMemoryIdempotencyLedger};
use crate::intake::{
    InMemoryTaskStore, TaskCompletedConsumer, TaskFailedConsumer, TaskIntakeService,
    TaskStartedConsumer,
};
use crate::messaging::{EventBusGateway, EventConsumer, InMemoryBroker};
use crate::notification::{NotificationConsumer, NotificationService};
use crate::outbox::{DrainSummary, InMemoryOutboxStore, OutboxProcessor};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Service names used for queue derivation
pub const INTAKE_SERVICE: &str = "task-intake";
pub const EXECUTION_SERVICE: &str = "task-execution";
pub const NOTIFICATION_SERVICE: &str = "notification";

pub struct TaskFlowSystem {
    pub config: TaskFlowConfig,
    pub broker: Arc<InMemoryBroker>,
    pub gateway: Arc<EventBusGateway>,
    pub intake: Arc<TaskIntakeService>,
    pub execution: Arc<TaskExecutionService>,
    pub notifications: Arc<NotificationService>,
    intake_outbox: Arc<InMemoryOutboxStore>,
    outbox_processor: Arc<OutboxProcessor>,
    shutdown: CancellationToken,
}

impl TaskFlowSystem {
    /// Wire every service and register all consumers on the bus
    pub fn start(config: TaskFlowConfig) -> Result<Self> {
        let broker = Arc::new(InMemoryBroker::new());
        let gateway = Arc::new(EventBusGateway::new(broker.clone(), &config));

        // Intake service: task store paired with its own outbox.
        let intake_outbox = Arc::new(InMemoryOutboxStore::new(config.outbox_retry_limit));
        let task_store = Arc::new(InMemoryTaskStore::new(intake_outbox.clone()));
        let intake = Arc::new(TaskIntakeService::new(task_store.clone()));
        let intake_ledger = Arc::new(InMemoryIdempotencyLedger::new());

        // Execution service.
        let execution_store = Arc::new(InMemoryExecutionStore::new());
        let execution = Arc::new(TaskExecutionService::new(
            execution_store,
            Arc::new(HandlerRegistry::new()),
            gateway.clone(),
            config.max_execution_retries,
        ));
        let execution_ledger = Arc::new(InMemoryIdempotencyLedger::new());

        // Notification service.
        let notifications = Arc::new(NotificationService::new(
            config.notification_channel_capacity,
        ));

        // Execution consumes creation/cancellation signals, deduplicated.
        let created: Arc<dyn EventConsumer> = Arc::new(IdempotentConsumer::new(
            Arc::new(TaskCreatedConsumer::new(execution.clone())),
            execution_ledger.clone(),
        ));
        gateway.subscribe(EXECUTION_SERVICE, "created", created)?;

        let cancelled: Arc<dyn EventConsumer> = Arc::new(IdempotentConsumer::new(
            Arc::new(TaskCancelledConsumer::new(execution.clone())),
            execution_ledger,
        ));
        gateway.subscribe(EXECUTION_SERVICE, "cancelled", cancelled)?;

        // Intake consumes execution outcomes, deduplicated.
        let started: Arc<dyn EventConsumer> = Arc::new(IdempotentConsumer::new(
            Arc::new(TaskStartedConsumer::new(task_store.clone())),
            intake_ledger.clone(),
        ));
        gateway.subscribe(INTAKE_SERVICE, "started", started)?;

        let completed: Arc<dyn EventConsumer> = Arc::new(IdempotentConsumer::new(
            Arc::new(TaskCompletedConsumer::new(task_store.clone())),
            intake_ledger.clone(),
        ));
        gateway.subscribe(INTAKE_SERVICE, "completed", completed)?;

        let failed: Arc<dyn EventConsumer> = Arc::new(IdempotentConsumer::new(
            Arc::new(TaskFailedConsumer::new(task_store)),
            intake_ledger,
        ));
        gateway.subscribe(INTAKE_SERVICE, "failed", failed)?;

        // Notification forwards every kind; it keeps no state to corrupt.
        let forwarder = Arc::new(NotificationConsumer::new(notifications.clone()));
        for kind in [
            "created",
            "started",
            "progress_updated",
            "completed",
            "failed",
            "cancelled",
        ] {
            gateway.subscribe(NOTIFICATION_SERVICE, kind, forwarder.clone())?;
        }

        let outbox_processor = Arc::new(OutboxProcessor::new(
            intake_outbox.clone(),
            gateway.clone(),
            Duration::from_millis(config.outbox_poll_interval_ms),
            config.outbox_batch_size,
        ));

        info!("TaskFlow system wired");
        Ok(Self {
            config,
            broker,
            gateway,
            intake,
            execution,
            notifications,
            intake_outbox,
            outbox_processor,
            shutdown: CancellationToken::new(),
        })
    }

    /// The intake service's outbox, exposed for inspection
    pub fn intake_outbox(&self) -> Arc<InMemoryOutboxStore> {
        self.intake_outbox.clone()
    }

    /// Drive one outbox poll synchronously
    pub async fn drain_outbox(&self) -> Result<DrainSummary> {
        self.outbox_processor.drain_once().await
    }

    /// Run the outbox poll loop in the background
    pub fn spawn_outbox_processor(&self) -> JoinHandle<()> {
        self.outbox_processor
            .clone()
            .spawn(self.shutdown.child_token())
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.gateway.shutdown();
    }
}
