use crate::error::{Result, TaskFlowError};
use crate::intake::states::TaskStatus;
use crate::intake::task::Task;
use crate::outbox::{OutboxMessage, OutboxStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence seam for the intake service.
///
/// The combined operations pair the task row mutation with its outbox append
/// in one unit of work; that pairing, not a distributed transaction, is what
/// makes "state changed" and "event will eventually be sent" atomic.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Task>>;

    /// Tasks for one user, newest first
    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Number of non-cancelled tasks a user currently holds
    async fn count_active(&self, user_id: &str) -> Result<usize>;

    async fn insert_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()>;

    async fn update(&self, task: Task) -> Result<()>;

    async fn update_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()>;
}

pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    outbox: Arc<dyn OutboxStore>,
}

impl InMemoryTaskStore {
    pub fn new(outbox: Arc<dyn OutboxStore>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            outbox,
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut owned: Vec<Task> = tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn count_active(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id && t.status != TaskStatus::Cancelled)
            .count())
    }

    async fn insert_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()> {
        // Hold the task lock across the outbox append so the pair is visible
        // together or not at all.
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(TaskFlowError::StorageError(format!(
                "task {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id, task);
        self.outbox.add(message).await
    }

    async fn update(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(TaskFlowError::NotFound(format!("task {}", task.id)));
        }
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn update_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(TaskFlowError::NotFound(format!("task {}", task.id)));
        }
        tasks.insert(task.id, task);
        self.outbox.add(message).await
    }
}
