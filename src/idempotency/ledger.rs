use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One handled (event, consumer) pair. Rows are write-once: presence means
/// the handler already ran to completion for that pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEvent {
    pub event_id: Uuid,
    pub consumer_name: String,
    pub processed_at: DateTime<Utc>,
}

/// Per-service dedup ledger
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn is_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<bool>;

    async fn mark_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryIdempotencyLedger {
    entries: RwLock<HashMap<(Uuid, String), DateTime<Utc>>>,
}

impl InMemoryIdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryIdempotencyLedger {
    async fn is_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<bool> {
        Ok(self
            .entries
            .read()
            .await
            .contains_key(&(event_id, consumer_name.to_string())))
    }

    async fn mark_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .entry((event_id, consumer_name.to_string()))
            .or_insert_with(Utc::now);
        Ok(())
    }
}
