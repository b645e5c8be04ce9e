//! # In-Process Broker
//!
//! Competing-consumer queues over tokio mpsc channels. Queue names are bound
//! to event kinds so that every service subscribed to a kind gets its own
//! shared queue, and each message on a queue is taken by exactly one consumer
//! instance. Exhausted redeliveries land in a per-queue dead-letter bucket.

use crate::events::TaskLifecycleEvent;
use crate::messaging::errors::{MessagingError, MessagingResult};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

struct BrokerQueue {
    tx: mpsc::UnboundedSender<TaskLifecycleEvent>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<TaskLifecycleEvent>>>,
}

impl BrokerQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

/// In-memory broker with at-least-once delivery semantics
#[derive(Default)]
pub struct InMemoryBroker {
    queues: DashMap<String, BrokerQueue>,
    bindings: DashMap<String, Vec<String>>,
    dead_letters: DashMap<String, Vec<TaskLifecycleEvent>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue if it does not exist yet
    pub fn declare_queue(&self, queue_name: &str) {
        self.queues
            .entry(queue_name.to_string())
            .or_insert_with(BrokerQueue::new);
        debug!(queue_name = %queue_name, "Queue declared");
    }

    /// Bind a queue to an event kind so publishes of that kind reach it
    pub fn bind(&self, event_type: &str, queue_name: &str) {
        let mut bound = self.bindings.entry(event_type.to_string()).or_default();
        if !bound.iter().any(|name| name == queue_name) {
            bound.push(queue_name.to_string());
        }
    }

    /// Fan the event out to every queue bound to its kind.
    ///
    /// Returns the number of queues the event was placed on. Zero bound
    /// queues is not an error; the publish side never depends on consumers
    /// existing.
    pub fn publish(&self, event: &TaskLifecycleEvent) -> MessagingResult<usize> {
        let queue_names = self
            .bindings
            .get(event.event_type())
            .map(|bound| bound.clone())
            .unwrap_or_default();

        for queue_name in &queue_names {
            let queue = self
                .queues
                .get(queue_name.as_str())
                .ok_or_else(|| MessagingError::queue_not_found(queue_name.clone()))?;
            queue.tx.send(event.clone()).map_err(|e| {
                MessagingError::queue_operation(queue_name.clone(), "send", e.to_string())
            })?;
        }

        debug!(
            event_type = event.event_type(),
            event_id = %event.event_id(),
            queue_count = queue_names.len(),
            "Event published"
        );
        Ok(queue_names.len())
    }

    /// Shared receiver handle for competing consumers on one queue
    pub(crate) fn receiver(
        &self,
        queue_name: &str,
    ) -> MessagingResult<Arc<Mutex<mpsc::UnboundedReceiver<TaskLifecycleEvent>>>> {
        self.queues
            .get(queue_name)
            .map(|queue| queue.rx.clone())
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))
    }

    /// Take one message off a queue without blocking, if any is waiting.
    /// Consumers in production go through the gateway; this is the inspection
    /// path for tooling and tests.
    pub async fn try_take(&self, queue_name: &str) -> MessagingResult<Option<TaskLifecycleEvent>> {
        let receiver = self.receiver(queue_name)?;
        let mut receiver = receiver.lock().await;
        Ok(receiver.try_recv().ok())
    }

    /// Park a message whose redeliveries are exhausted
    pub fn dead_letter(&self, queue_name: &str, event: TaskLifecycleEvent) {
        warn!(
            queue_name = %queue_name,
            event_id = %event.event_id(),
            event_type = event.event_type(),
            "Message moved to dead-letter queue"
        );
        self.dead_letters
            .entry(format!("{queue_name}_dlq"))
            .or_default()
            .push(event);
    }

    /// Number of dead-lettered messages for a queue
    pub fn dead_letter_depth(&self, queue_name: &str) -> usize {
        self.dead_letters
            .get(&format!("{queue_name}_dlq"))
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskStarted;
    use chrono::Utc;
    use uuid::Uuid;

    fn started_event() -> TaskLifecycleEvent {
        TaskStarted::new(Uuid::new_v4(), "u1", Utc::now(), "corr").into()
    }

    #[tokio::test]
    async fn test_publish_without_bindings_is_not_an_error() {
        let broker = InMemoryBroker::new();
        let delivered = broker.publish(&started_event()).unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_every_bound_queue() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("a");
        broker.declare_queue("b");
        broker.bind("started", "a");
        broker.bind("started", "b");

        let delivered = broker.publish(&started_event()).unwrap();
        assert_eq!(delivered, 2);

        for queue in ["a", "b"] {
            let rx = broker.receiver(queue).unwrap();
            let event = rx.lock().await.try_recv().unwrap();
            assert_eq!(event.event_type(), "started");
        }
    }

    #[tokio::test]
    async fn test_duplicate_bindings_are_collapsed() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("a");
        broker.bind("started", "a");
        broker.bind("started", "a");

        let delivered = broker.publish(&started_event()).unwrap();
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn test_dead_letter_depth() {
        let broker = InMemoryBroker::new();
        assert_eq!(broker.dead_letter_depth("q"), 0);
        broker.dead_letter("q", started_event());
        assert_eq!(broker.dead_letter_depth("q"), 1);
    }
}
