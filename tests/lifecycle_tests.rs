//! End-to-end lifecycle tests over the embedded system wiring: intake,
//! execution and notification services cooperating through the in-process
//! broker with the outbox in between.

use std::time::Duration;
use taskflow_core::config::TaskFlowConfig;
use taskflow_core::execution::ExecutionStatus;
use taskflow_core::intake::{CreateTaskRequest, TaskStatus};
use taskflow_core::outbox::OutboxStore;
use taskflow_core::system::TaskFlowSystem;
use taskflow_core::TaskFlowError;
use uuid::Uuid;

fn test_config() -> TaskFlowConfig {
    TaskFlowConfig {
        retry_interval_ms: 10,
        outbox_poll_interval_ms: 20,
        ..TaskFlowConfig::default()
    }
}

fn request(user_id: &str, task_type: &str, priority: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        user_id: user_id.to_string(),
        task_type: task_type.to_string(),
        priority: priority.to_string(),
        payload: None,
        scheduled_at: None,
    }
}

async fn wait_for_task_status(system: &TaskFlowSystem, task_id: Uuid, status: TaskStatus) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if let Ok(task) = system.intake.get_task(task_id).await {
            if task.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

async fn wait_for_record_status(
    system: &TaskFlowSystem,
    task_id: Uuid,
    status: ExecutionStatus,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if let Ok(Some(record)) = system.execution.record_for_task(task_id).await {
            if record.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn scenario_a_created_task_completes_end_to_end() -> anyhow::Result<()> {
    let system = TaskFlowSystem::start(test_config())?;

    let task = system
        .intake
        .create_task(request("u1", "Email", "High"))
        .await?;
    assert_eq!(task.status, TaskStatus::Pending);

    // Exactly one pending outbox row for the created event.
    let outbox = system.intake_outbox();
    let pending = outbox.get_unprocessed(10).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "created");
    assert!(pending[0].processed_at.is_none());

    // Draining publishes it and the execution side takes over.
    let summary = system.drain_outbox().await?;
    assert_eq!(summary.published, 1);

    assert!(
        wait_for_task_status(&system, task.id, TaskStatus::Completed).await,
        "task never reached Completed"
    );

    let finished_task = system.intake.get_task(task.id).await?;
    let record = system
        .execution
        .record_for_task(task.id)
        .await?
        .expect("execution record must exist");

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record
        .result_location
        .as_deref()
        .is_some_and(|l| !l.is_empty()));
    assert_eq!(finished_task.result_location, record.result_location);
    assert_eq!(record.progress_percent, 100);

    system.shutdown();
    Ok(())
}

#[tokio::test]
async fn scenario_c_cancel_running_task_but_not_completed() -> anyhow::Result<()> {
    let system = TaskFlowSystem::start(test_config())?;

    // Low priority stretches the default handler's pacing enough to observe
    // the Running state.
    let task = system
        .intake
        .create_task(request("u1", "Backup", "Low"))
        .await?;
    system.drain_outbox().await?;

    assert!(
        wait_for_task_status(&system, task.id, TaskStatus::Running).await,
        "task never reached Running"
    );

    let cancelled = system.intake.cancel_task(task.id, "u1").await?;
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    system.drain_outbox().await?;

    // The execution record follows, with no completion ever applied.
    assert!(
        wait_for_record_status(&system, task.id, ExecutionStatus::Cancelled).await,
        "execution record never cancelled"
    );
    assert_eq!(
        system.intake.get_task(task.id).await?.status,
        TaskStatus::Cancelled
    );

    // Cancelling an already-completed task is an explicit failure.
    let done = system
        .intake
        .create_task(request("u1", "Email", "Critical"))
        .await?;
    system.drain_outbox().await?;
    assert!(wait_for_task_status(&system, done.id, TaskStatus::Completed).await);

    let err = system.intake.cancel_task(done.id, "u1").await.unwrap_err();
    assert!(matches!(err, TaskFlowError::InvalidTransition(_)));
    assert_eq!(
        system.intake.get_task(done.id).await?.status,
        TaskStatus::Completed
    );

    system.shutdown();
    Ok(())
}

#[tokio::test]
async fn duplicate_created_delivery_executes_once() -> anyhow::Result<()> {
    let system = TaskFlowSystem::start(test_config())?;

    let mut notifications = system.notifications.subscribe_user("u1");

    let task = system
        .intake
        .create_task(request("u1", "Email", "Critical"))
        .await?;
    system.drain_outbox().await?;
    assert!(wait_for_task_status(&system, task.id, TaskStatus::Completed).await);

    // Redeliver the same created event straight through the gateway; the
    // execution-side ledger short-circuits it.
    let outbox = system.intake_outbox();
    assert!(outbox.get_unprocessed(10).await?.is_empty());
    let stored = outbox.all_messages().await;
    let created = stored
        .iter()
        .find(|m| m.event_type == "created")
        .expect("created row");
    system.gateway.publish(&created.decode()?)?;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let record = system
        .execution
        .record_for_task(task.id)
        .await?
        .expect("record");
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.status, ExecutionStatus::Completed);

    // Exactly one started notification ever went out.
    let mut started_count = 0;
    while let Ok(notification) = notifications.try_recv() {
        if notification.event_type == "started" {
            started_count += 1;
        }
    }
    assert_eq!(started_count, 1);

    system.shutdown();
    Ok(())
}

#[tokio::test]
async fn notification_subscribers_see_the_full_lifecycle() -> anyhow::Result<()> {
    let system = TaskFlowSystem::start(test_config())?;
    let mut notifications = system.notifications.subscribe_user("u9");

    let task = system
        .intake
        .create_task(request("u9", "DataProcessing", "Critical"))
        .await?;
    system.drain_outbox().await?;

    assert!(wait_for_task_status(&system, task.id, TaskStatus::Completed).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut kinds = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        assert_eq!(notification.task_id, task.id);
        kinds.push(notification.event_type);
    }

    assert!(kinds.contains(&"created".to_string()));
    assert!(kinds.contains(&"started".to_string()));
    assert!(kinds.contains(&"progress_updated".to_string()));
    assert!(kinds.contains(&"completed".to_string()));

    system.shutdown();
    Ok(())
}
