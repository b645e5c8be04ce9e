use crate::error::{Result, TaskFlowError};
use crate::outbox::message::OutboxMessage;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only store of pending events, one per service.
///
/// `add` must run inside the caller's own unit of work alongside the state
/// transition it announces; the concrete stores provide the pairing
/// (in-memory via the owning service store, Postgres via a transaction).
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn add(&self, message: OutboxMessage) -> Result<()>;

    /// Pending rows only: `processed_at` null and `retry_count` below the
    /// ceiling, oldest first.
    async fn get_unprocessed(&self, batch_size: usize) -> Result<Vec<OutboxMessage>>;

    /// Terminal: the row becomes inert audit data
    async fn mark_processed(&self, id: Uuid) -> Result<()>;

    /// Record the failure and keep the row eligible until the retry ceiling
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;
}

/// Lock-guarded vector store backing tests and embedded runs
pub struct InMemoryOutboxStore {
    rows: RwLock<Vec<OutboxMessage>>,
    retry_limit: i32,
}

impl InMemoryOutboxStore {
    pub fn new(retry_limit: i32) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            retry_limit,
        }
    }

    /// Total rows ever written, processed or not
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Snapshot of a row for inspection
    pub async fn get(&self, id: Uuid) -> Option<OutboxMessage> {
        self.rows.read().await.iter().find(|m| m.id == id).cloned()
    }

    /// Snapshot of every row, processed rows included
    pub async fn all_messages(&self) -> Vec<OutboxMessage> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn add(&self, message: OutboxMessage) -> Result<()> {
        self.rows.write().await.push(message);
        Ok(())
    }

    async fn get_unprocessed(&self, batch_size: usize) -> Result<Vec<OutboxMessage>> {
        let rows = self.rows.read().await;
        let mut pending: Vec<OutboxMessage> = rows
            .iter()
            .filter(|m| m.processed_at.is_none() && m.retry_count < self.retry_limit)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.created_at);
        pending.truncate(batch_size);
        Ok(pending)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| TaskFlowError::NotFound(format!("outbox message {id}")))?;
        row.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| TaskFlowError::NotFound(format!("outbox message {id}")))?;
        row.retry_count += 1;
        row.error = Some(error.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{TaskCreated, TaskLifecycleEvent};

    fn message() -> OutboxMessage {
        let event: TaskLifecycleEvent =
            TaskCreated::new(Uuid::new_v4(), "u1", "Email", "High", None, None, "corr").into();
        OutboxMessage::for_event(&event).unwrap()
    }

    #[tokio::test]
    async fn test_get_unprocessed_skips_processed_rows() {
        let store = InMemoryOutboxStore::new(5);
        let first = message();
        let second = message();
        store.add(first.clone()).await.unwrap();
        store.add(second.clone()).await.unwrap();

        store.mark_processed(first.id).await.unwrap();

        let pending = store.get_unprocessed(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
    }

    #[tokio::test]
    async fn test_get_unprocessed_respects_retry_ceiling() {
        let store = InMemoryOutboxStore::new(2);
        let row = message();
        store.add(row.clone()).await.unwrap();

        store.mark_failed(row.id, "broker down").await.unwrap();
        assert_eq!(store.get_unprocessed(10).await.unwrap().len(), 1);

        store.mark_failed(row.id, "broker down").await.unwrap();
        // At the ceiling the row is stuck pending operator action, but never
        // deleted.
        assert!(store.get_unprocessed(10).await.unwrap().is_empty());
        let stuck = store.get(row.id).await.unwrap();
        assert_eq!(stuck.retry_count, 2);
        assert_eq!(stuck.error.as_deref(), Some("broker down"));
    }

    #[tokio::test]
    async fn test_get_unprocessed_returns_oldest_first() {
        let store = InMemoryOutboxStore::new(5);
        let mut older = message();
        older.created_at = Utc::now() - chrono::Duration::seconds(60);
        let newer = message();
        store.add(newer.clone()).await.unwrap();
        store.add(older.clone()).await.unwrap();

        let pending = store.get_unprocessed(1).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, older.id);
    }
}
