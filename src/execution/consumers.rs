//! # Execution-Side Event Consumers
//!
//! Entry points from the broker into the execution service. Both are meant to
//! be wrapped in the idempotent consumer decorator at wiring time.

use crate::error::Result;
use crate::events::TaskLifecycleEvent;
use crate::execution::service::{ProcessTaskSignal, TaskExecutionService};
use crate::messaging::EventConsumer;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TaskCreatedConsumer {
    service: Arc<TaskExecutionService>,
}

impl TaskCreatedConsumer {
    pub fn new(service: Arc<TaskExecutionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventConsumer for TaskCreatedConsumer {
    fn name(&self) -> &str {
        "execution-task-created"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let created = match event {
            TaskLifecycleEvent::Created(created) => created,
            other => {
                warn!(event_type = other.event_type(), "Unexpected event kind, dropping");
                return Ok(());
            }
        };

        info!(
            task_id = %created.task_id,
            task_type = %created.task_type,
            correlation_id = %created.correlation_id,
            "Received task created event"
        );

        if let Some(scheduled_at) = created.scheduled_at {
            if scheduled_at > Utc::now() {
                info!(
                    task_id = %created.task_id,
                    scheduled_at = %scheduled_at,
                    "Task is scheduled for later, skipping immediate execution"
                );
                return Ok(());
            }
        }

        self.service
            .process_task(ProcessTaskSignal {
                task_id: created.task_id,
                user_id: created.user_id,
                task_type: created.task_type,
                priority: created.priority,
                payload: created.payload,
                correlation_id: created.correlation_id,
            })
            .await?;
        Ok(())
    }
}

pub struct TaskCancelledConsumer {
    service: Arc<TaskExecutionService>,
}

impl TaskCancelledConsumer {
    pub fn new(service: Arc<TaskExecutionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventConsumer for TaskCancelledConsumer {
    fn name(&self) -> &str {
        "execution-task-cancelled"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let cancelled = match event {
            TaskLifecycleEvent::Cancelled(cancelled) => cancelled,
            other => {
                warn!(event_type = other.event_type(), "Unexpected event kind, dropping");
                return Ok(());
            }
        };

        self.service.handle_task_cancelled(cancelled.task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskFlowConfig;
    use crate::events::TaskCreated;
    use crate::execution::handlers::HandlerRegistry;
    use crate::execution::states::ExecutionStatus;
    use crate::execution::store::{ExecutionStore, InMemoryExecutionStore};
    use crate::messaging::{EventBusGateway, InMemoryBroker};
    use uuid::Uuid;

    fn consumer() -> (Arc<InMemoryExecutionStore>, TaskCreatedConsumer) {
        let store = Arc::new(InMemoryExecutionStore::new());
        let gateway = Arc::new(EventBusGateway::new(
            Arc::new(InMemoryBroker::new()),
            &TaskFlowConfig::default(),
        ));
        let service = Arc::new(TaskExecutionService::new(
            store.clone(),
            Arc::new(HandlerRegistry::new()),
            gateway,
            3,
        ));
        (store, TaskCreatedConsumer::new(service))
    }

    #[tokio::test]
    async fn test_created_event_drives_an_execution() {
        let (store, consumer) = consumer();
        let task_id = Uuid::new_v4();

        consumer
            .consume(
                TaskCreated::new(task_id, "u1", "Email", "Critical", None, None, "corr").into(),
            )
            .await
            .unwrap();

        let record = store.get_by_task_id(task_id).await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_future_scheduled_task_is_skipped() {
        let (store, consumer) = consumer();
        let task_id = Uuid::new_v4();
        let scheduled_at = Utc::now() + chrono::Duration::hours(1);

        consumer
            .consume(
                TaskCreated::new(
                    task_id,
                    "u1",
                    "Email",
                    "Critical",
                    None,
                    Some(scheduled_at),
                    "corr",
                )
                .into(),
            )
            .await
            .unwrap();

        assert!(store.get_by_task_id(task_id).await.unwrap().is_none());
    }
}
