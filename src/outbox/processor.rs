//! # Outbox Processor
//!
//! Single background poller per process draining the outbox through the event
//! bus gateway. Failures are isolated per message so one poisoned row never
//! blocks the batch. Running more than one processor instance per service
//! would double-publish; a claim/lease mechanism is deliberately absent.

use crate::error::Result;
use crate::messaging::EventBusGateway;
use crate::outbox::store::OutboxStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub published: usize,
    pub failed: usize,
}

pub struct OutboxProcessor {
    store: Arc<dyn OutboxStore>,
    gateway: Arc<EventBusGateway>,
    poll_interval: Duration,
    batch_size: usize,
}

impl OutboxProcessor {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        gateway: Arc<EventBusGateway>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            poll_interval,
            batch_size,
        }
    }

    /// Process one batch: decode, publish, then mark each message. Messages
    /// publish sequentially; a failure is recorded on that row alone and the
    /// batch continues.
    pub async fn drain_once(&self) -> Result<DrainSummary> {
        let messages = self.store.get_unprocessed(self.batch_size).await?;
        let mut summary = DrainSummary::default();

        for message in messages {
            let outcome = match message.decode() {
                Ok(event) => self
                    .gateway
                    .publish(&event)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("unable to decode event payload: {e}")),
            };

            match outcome {
                Ok(()) => {
                    self.store.mark_processed(message.id).await?;
                    summary.published += 1;
                    debug!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        "Published outbox message"
                    );
                }
                Err(reason) => {
                    error!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        error = %reason,
                        "Failed to process outbox message"
                    );
                    self.store.mark_failed(message.id, &reason).await?;
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Run the poll loop until the shutdown token fires
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_ms = self.poll_interval.as_millis() as u64,
                batch_size = self.batch_size,
                "Outbox processor started"
            );

            loop {
                if let Err(err) = self.drain_once().await {
                    error!(error = %err, "Error processing outbox batch");
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }

            info!("Outbox processor stopped");
        })
    }
}
