use crate::error::Result;
use crate::events::TaskLifecycleEvent;
use crate::idempotency::ledger::IdempotencyLedger;
use crate::messaging::EventConsumer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Generic dedup decorator around a domain consumer.
///
/// Short-circuits when the ledger already holds the (event, consumer) pair;
/// otherwise runs the inner handler and marks the ledger only on success, so
/// a handler error propagates to the transport's retry policy with the ledger
/// untouched.
pub struct IdempotentConsumer {
    inner: Arc<dyn EventConsumer>,
    ledger: Arc<dyn IdempotencyLedger>,
}

impl IdempotentConsumer {
    pub fn new(inner: Arc<dyn EventConsumer>, ledger: Arc<dyn IdempotencyLedger>) -> Self {
        Self { inner, ledger }
    }
}

#[async_trait]
impl EventConsumer for IdempotentConsumer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        let event_id = event.event_id();
        let consumer_name = self.inner.name();

        if self.ledger.is_processed(event_id, consumer_name).await? {
            info!(
                event_id = %event_id,
                consumer = consumer_name,
                "Event already processed, skipping"
            );
            return Ok(());
        }

        self.inner.consume(event).await?;
        self.ledger.mark_processed(event_id, consumer_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFlowError;
    use crate::events::TaskStarted;
    use crate::idempotency::ledger::InMemoryIdempotencyLedger;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use uuid::Uuid;

    struct RecordingConsumer {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl RecordingConsumer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EventConsumer for RecordingConsumer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn consume(&self, _event: TaskLifecycleEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(TaskFlowError::StorageError("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn started_event() -> TaskLifecycleEvent {
        TaskStarted::new(Uuid::new_v4(), "u1", Utc::now(), "corr").into()
    }

    #[tokio::test]
    async fn test_duplicate_deliveries_run_the_handler_once() {
        let inner = Arc::new(RecordingConsumer::new());
        let ledger = Arc::new(InMemoryIdempotencyLedger::new());
        let wrapped = IdempotentConsumer::new(inner.clone(), ledger);

        let event = started_event();
        for _ in 0..5 {
            wrapped.consume(event.clone()).await.unwrap();
        }

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_ledger_unmarked() {
        let inner = Arc::new(RecordingConsumer::new());
        inner.fail.store(true, Ordering::SeqCst);
        let ledger = Arc::new(InMemoryIdempotencyLedger::new());
        let wrapped = IdempotentConsumer::new(inner.clone(), ledger.clone());

        let event = started_event();
        assert!(wrapped.consume(event.clone()).await.is_err());
        assert!(!ledger
            .is_processed(event.event_id(), "recording")
            .await
            .unwrap());

        // The redelivery after the transient failure succeeds and marks.
        inner.fail.store(false, Ordering::SeqCst);
        wrapped.consume(event.clone()).await.unwrap();
        assert!(ledger
            .is_processed(event.event_id(), "recording")
            .await
            .unwrap());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_events_each_run() {
        let inner = Arc::new(RecordingConsumer::new());
        let ledger = Arc::new(InMemoryIdempotencyLedger::new());
        let wrapped = IdempotentConsumer::new(inner.clone(), ledger);

        wrapped.consume(started_event()).await.unwrap();
        wrapped.consume(started_event()).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
