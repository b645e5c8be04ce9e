//! # Event Bus Gateway
//!
//! Wraps the broker with the delivery policy every consumer shares: a
//! per-consumer concurrency ceiling (admission control), bounded
//! exponential-backoff redelivery on handler failure, and deterministic queue
//! naming so that all instances of one service handling one event kind
//! compete on a single queue.

use crate::config::TaskFlowConfig;
use crate::events::TaskLifecycleEvent;
use crate::messaging::broker::InMemoryBroker;
use crate::messaging::errors::MessagingResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A domain-side handler for one event kind.
///
/// The returned error is what triggers the bus redelivery policy; handlers
/// that want an event dropped must swallow the condition themselves and
/// return `Ok`.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Stable consumer identity, also used as the idempotency ledger key
    fn name(&self) -> &str;

    async fn consume(&self, event: TaskLifecycleEvent) -> crate::error::Result<()>;
}

/// Fixed increasing redelivery backoff: base, 2x base, 4x base
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before redelivery attempt `attempt` (1-based); `None` once the
    /// policy is exhausted and the message belongs to the dead-letter queue.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match attempt {
            1 => Some(self.base),
            2 => Some(self.base * 2),
            3 => Some(self.base * 4),
            _ => None,
        }
    }
}

/// Broker facade used by every service to publish and subscribe
pub struct EventBusGateway {
    broker: Arc<InMemoryBroker>,
    concurrency_limit: usize,
    retry_policy: RetryPolicy,
    shutdown: CancellationToken,
    dispatchers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl EventBusGateway {
    pub fn new(broker: Arc<InMemoryBroker>, config: &TaskFlowConfig) -> Self {
        Self {
            broker,
            concurrency_limit: config.concurrency_limit,
            retry_policy: RetryPolicy::new(Duration::from_millis(config.retry_interval_ms)),
            shutdown: CancellationToken::new(),
            dispatchers: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Derive the shared queue name for a (service, event kind) pair.
    ///
    /// Lowercased and dash-separated so every instance of `service` consuming
    /// `event_type` lands on the same queue (competing consumers).
    pub fn endpoint_name(service: &str, event_type: &str) -> String {
        format!(
            "{}-{}",
            service.to_lowercase().replace([' ', '_'], "-"),
            event_type.replace('_', "-")
        )
    }

    /// Publish one event. Attempted for every call; delivery reliability
    /// beyond the broker handoff is the outbox's concern, not ours.
    pub fn publish(&self, event: &TaskLifecycleEvent) -> MessagingResult<usize> {
        self.broker.publish(event)
    }

    /// Register a competing consumer for one event kind.
    ///
    /// Spawns a dispatcher that pulls from the derived queue, bounds in-flight
    /// handler invocations with the configured ceiling and applies the
    /// redelivery policy per message.
    pub fn subscribe(
        &self,
        service: &str,
        event_type: &str,
        consumer: Arc<dyn EventConsumer>,
    ) -> MessagingResult<()> {
        let queue_name = Self::endpoint_name(service, event_type);
        self.broker.declare_queue(&queue_name);
        self.broker.bind(event_type, &queue_name);

        let receiver = self.broker.receiver(&queue_name)?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let broker = self.broker.clone();
        let retry_policy = self.retry_policy;
        let shutdown = self.shutdown.clone();

        info!(
            queue_name = %queue_name,
            consumer = consumer.name(),
            concurrency_limit = self.concurrency_limit,
            "Consumer registered"
        );

        let dispatcher_queue = queue_name.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = async { receiver.lock().await.recv().await } => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let permit = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                tokio::spawn(deliver(
                    consumer.clone(),
                    event,
                    retry_policy,
                    broker.clone(),
                    dispatcher_queue.clone(),
                    permit,
                ));
            }
            debug!(queue_name = %dispatcher_queue, "Dispatcher stopped");
        });

        self.dispatchers
            .lock()
            .map_err(|e| crate::messaging::errors::MessagingError::internal(e.to_string()))?
            .push(handle);
        Ok(())
    }

    /// Stop all dispatcher loops. In-flight handler invocations finish on
    /// their own; only message pickup stops.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn deliver(
    consumer: Arc<dyn EventConsumer>,
    event: TaskLifecycleEvent,
    retry_policy: RetryPolicy,
    broker: Arc<InMemoryBroker>,
    queue_name: String,
    _permit: OwnedSemaphorePermit,
) {
    let mut attempt: u32 = 0;
    loop {
        match consumer.consume(event.clone()).await {
            Ok(()) => {
                debug!(
                    consumer = consumer.name(),
                    event_id = %event.event_id(),
                    "Event handled"
                );
                return;
            }
            Err(err) => {
                attempt += 1;
                match retry_policy.delay_for(attempt) {
                    Some(delay) => {
                        warn!(
                            consumer = consumer.name(),
                            event_id = %event.event_id(),
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Handler failed, scheduling redelivery"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            consumer = consumer.name(),
                            event_id = %event.event_id(),
                            error = %err,
                            "Redelivery exhausted"
                        );
                        broker.dead_letter(&queue_name, event);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskStarted;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingConsumer {
        calls: AtomicUsize,
        failures_before_success: usize,
    }

    #[async_trait]
    impl EventConsumer for CountingConsumer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn consume(&self, _event: TaskLifecycleEvent) -> crate::error::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(crate::error::TaskFlowError::StorageError("transient".into()))
            } else {
                Ok(())
            }
        }
    }

    fn test_config() -> TaskFlowConfig {
        TaskFlowConfig {
            retry_interval_ms: 10,
            ..TaskFlowConfig::default()
        }
    }

    fn started_event() -> TaskLifecycleEvent {
        TaskStarted::new(Uuid::new_v4(), "u1", Utc::now(), "corr").into()
    }

    #[test]
    fn test_endpoint_name_is_deterministic_and_dashed() {
        assert_eq!(
            EventBusGateway::endpoint_name("Task Execution", "progress_updated"),
            "task-execution-progress-updated"
        );
        assert_eq!(
            EventBusGateway::endpoint_name("intake", "created"),
            "intake-created"
        );
    }

    #[test]
    fn test_retry_policy_doubles_then_exhausts() {
        let policy = RetryPolicy::new(Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[tokio::test]
    async fn test_transient_handler_failure_is_redelivered() {
        let broker = Arc::new(InMemoryBroker::new());
        let gateway = EventBusGateway::new(broker.clone(), &test_config());
        let consumer = Arc::new(CountingConsumer {
            calls: AtomicUsize::new(0),
            failures_before_success: 2,
        });

        gateway
            .subscribe("execution", "started", consumer.clone())
            .unwrap();
        gateway.publish(&started_event()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(consumer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            broker.dead_letter_depth(&EventBusGateway::endpoint_name("execution", "started")),
            0
        );
        gateway.shutdown();
    }

    #[tokio::test]
    async fn test_exhausted_redelivery_dead_letters() {
        let broker = Arc::new(InMemoryBroker::new());
        let gateway = EventBusGateway::new(broker.clone(), &test_config());
        let consumer = Arc::new(CountingConsumer {
            calls: AtomicUsize::new(0),
            failures_before_success: usize::MAX,
        });

        gateway
            .subscribe("execution", "started", consumer.clone())
            .unwrap();
        gateway.publish(&started_event()).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        // initial attempt plus three redeliveries
        assert_eq!(consumer.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            broker.dead_letter_depth(&EventBusGateway::endpoint_name("execution", "started")),
            1
        );
        gateway.shutdown();
    }

    #[tokio::test]
    async fn test_competing_consumers_share_one_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let gateway = EventBusGateway::new(broker.clone(), &test_config());
        let first = Arc::new(CountingConsumer {
            calls: AtomicUsize::new(0),
            failures_before_success: 0,
        });
        let second = Arc::new(CountingConsumer {
            calls: AtomicUsize::new(0),
            failures_before_success: 0,
        });

        gateway.subscribe("execution", "started", first.clone()).unwrap();
        gateway.subscribe("execution", "started", second.clone()).unwrap();

        for _ in 0..10 {
            gateway.publish(&started_event()).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        let total =
            first.calls.load(Ordering::SeqCst) + second.calls.load(Ordering::SeqCst);
        assert_eq!(total, 10);
        gateway.shutdown();
    }
}
