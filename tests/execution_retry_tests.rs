//! Execution-side retry loop and progress reporting, driven through direct
//! creation-equivalent signals with purpose-built handlers.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskflow_core::config::TaskFlowConfig;
use taskflow_core::error::Result;
use taskflow_core::events::TaskLifecycleEvent;
use taskflow_core::execution::{
    ExecutionOutcome, ExecutionRecord, ExecutionStatus, ExecutionStore, HandlerRegistry,
    InMemoryExecutionStore, ProcessTaskSignal, ProgressSink, TaskExecutionService,
    TaskTypeHandler,
};
use taskflow_core::messaging::{EventBusGateway, InMemoryBroker};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Fails every attempt with the same message
struct AlwaysFailingHandler;

#[async_trait]
impl TaskTypeHandler for AlwaysFailingHandler {
    fn task_type(&self) -> &str {
        "Email"
    }

    async fn handle(
        &self,
        _record: &ExecutionRecord,
        _progress: &ProgressSink,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        Ok(ExecutionOutcome::failed("simulated handler failure"))
    }
}

/// Reports 40 then 90, then completes
struct TwoReportHandler;

#[async_trait]
impl TaskTypeHandler for TwoReportHandler {
    fn task_type(&self) -> &str {
        "Email"
    }

    async fn handle(
        &self,
        _record: &ExecutionRecord,
        progress: &ProgressSink,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        progress.report(40, "parsing");
        tokio::time::sleep(Duration::from_millis(20)).await;
        progress.report(90, "finishing");
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(ExecutionOutcome::completed("results/fixed.json"))
    }
}

struct Fixture {
    store: Arc<InMemoryExecutionStore>,
    broker: Arc<InMemoryBroker>,
    service: TaskExecutionService,
}

fn fixture(handler: Arc<dyn TaskTypeHandler>) -> Fixture {
    let store = Arc::new(InMemoryExecutionStore::new());
    let broker = Arc::new(InMemoryBroker::new());
    for kind in ["started", "progress_updated", "completed", "failed"] {
        let queue = format!("observer-{kind}");
        broker.declare_queue(&queue);
        broker.bind(kind, &queue);
    }
    let gateway = Arc::new(EventBusGateway::new(
        broker.clone(),
        &TaskFlowConfig::default(),
    ));
    let mut registry = HandlerRegistry::new();
    registry.register(handler);
    let service = TaskExecutionService::new(store.clone(), Arc::new(registry), gateway, 3);
    Fixture {
        store,
        broker,
        service,
    }
}

fn signal(task_id: Uuid) -> ProcessTaskSignal {
    ProcessTaskSignal {
        task_id,
        user_id: "u1".to_string(),
        task_type: "Email".to_string(),
        priority: "Critical".to_string(),
        payload: None,
        correlation_id: "corr-retry".to_string(),
    }
}

async fn drain_queue(broker: &InMemoryBroker, queue: &str) -> Vec<TaskLifecycleEvent> {
    let mut events = Vec::new();
    while let Some(event) = broker.try_take(queue).await.unwrap() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn scenario_b_failures_retry_until_the_ceiling() {
    let fx = fixture(Arc::new(AlwaysFailingHandler));
    let task_id = Uuid::new_v4();

    // First attempt: fresh record, fails, retry still possible.
    assert!(!fx.service.process_task(signal(task_id)).await.unwrap());
    let record = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.retry_count, 0);
    assert!(record.can_retry(3));
    assert_eq!(
        record.error_message.as_deref(),
        Some("simulated handler failure")
    );

    // Each creation-equivalent signal resets to Queued and increments the
    // retry counter before failing again.
    for expected_retry in 1..=3 {
        assert!(!fx.service.process_task(signal(task_id)).await.unwrap());
        let record = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.retry_count, expected_retry);
    }

    // At the ceiling further signals are rejected as already processed.
    let before = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
    assert!(!before.can_retry(3));
    assert!(!fx.service.process_task(signal(task_id)).await.unwrap());
    let after = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
    assert_eq!(after, before);

    // One failed event per attempt, carrying the attempt's retry count.
    let failed_counts: Vec<i32> = drain_queue(&fx.broker, "observer-failed")
        .await
        .into_iter()
        .filter_map(|event| match event {
            TaskLifecycleEvent::Failed(failed) => Some(failed.retry_count),
            _ => None,
        })
        .collect();
    assert_eq!(failed_counts, vec![0, 1, 2, 3]);

    // Four attempts, four started events.
    assert_eq!(drain_queue(&fx.broker, "observer-started").await.len(), 4);
}

#[tokio::test]
async fn scenario_d_progress_reports_flow_through_in_order() {
    let fx = fixture(Arc::new(TwoReportHandler));
    let task_id = Uuid::new_v4();

    assert!(fx.service.process_task(signal(task_id)).await.unwrap());

    let record = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    // 100 comes from the completion transition, after 40 and 90 landed.
    assert_eq!(record.progress_percent, 100);
    assert_eq!(record.result_location.as_deref(), Some("results/fixed.json"));

    let percents: Vec<i32> = drain_queue(&fx.broker, "observer-progress_updated")
        .await
        .into_iter()
        .filter_map(|event| match event {
            TaskLifecycleEvent::ProgressUpdated(update) => Some(update.progress_percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![40, 90]);
}

#[tokio::test]
async fn retry_after_failure_can_succeed() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailOnceHandler {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl TaskTypeHandler for FailOnceHandler {
        fn task_type(&self) -> &str {
            "Email"
        }

        async fn handle(
            &self,
            _record: &ExecutionRecord,
            _progress: &ProgressSink,
            _cancel: &CancellationToken,
        ) -> Result<ExecutionOutcome> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(ExecutionOutcome::failed("transient"))
            } else {
                Ok(ExecutionOutcome::completed("results/retried.json"))
            }
        }
    }

    let fx = fixture(Arc::new(FailOnceHandler {
        attempts: AtomicUsize::new(0),
    }));
    let task_id = Uuid::new_v4();

    assert!(!fx.service.process_task(signal(task_id)).await.unwrap());
    assert!(fx.service.process_task(signal(task_id)).await.unwrap());

    let record = fx.store.get_by_task_id(task_id).await.unwrap().unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.retry_count, 1);
    assert!(record.error_message.is_none());
    assert_eq!(
        record.result_location.as_deref(),
        Some("results/retried.json")
    );
}
