use crate::error::{Result, TaskFlowError};
use crate::execution::record::ExecutionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence seam for execution records. Uniqueness on task id is part of
/// the contract: at most one record per task ever exists.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn get_by_task_id(&self, task_id: Uuid) -> Result<Option<ExecutionRecord>>;

    async fn insert(&self, record: ExecutionRecord) -> Result<()>;

    async fn update(&self, record: ExecutionRecord) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<Uuid, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get_by_task_id(&self, task_id: Uuid) -> Result<Option<ExecutionRecord>> {
        Ok(self.records.read().await.get(&task_id).cloned())
    }

    async fn insert(&self, record: ExecutionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.task_id) {
            return Err(TaskFlowError::StorageError(format!(
                "execution record for task {} already exists",
                record.task_id
            )));
        }
        records.insert(record.task_id, record);
        Ok(())
    }

    async fn update(&self, record: ExecutionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.task_id) {
            return Err(TaskFlowError::NotFound(format!(
                "execution record for task {}",
                record.task_id
            )));
        }
        records.insert(record.task_id, record);
        Ok(())
    }
}
