use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Payload pushed to realtime subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNotification {
    pub task_id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub status: String,
    pub progress_percent: Option<i32>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Realtime fan-out over lazily created broadcast channels.
///
/// A channel with no subscribers simply drops the notification; pushing is
/// never an error.
pub struct NotificationService {
    user_channels: DashMap<String, broadcast::Sender<TaskNotification>>,
    task_channels: DashMap<Uuid, broadcast::Sender<TaskNotification>>,
    capacity: usize,
}

impl NotificationService {
    pub fn new(capacity: usize) -> Self {
        Self {
            user_channels: DashMap::new(),
            task_channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to every notification concerning one user's tasks
    pub fn subscribe_user(&self, user_id: &str) -> broadcast::Receiver<TaskNotification> {
        self.user_channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to every notification concerning one task
    pub fn subscribe_task(&self, task_id: Uuid) -> broadcast::Receiver<TaskNotification> {
        self.task_channels
            .entry(task_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn notify_user(&self, user_id: &str, notification: TaskNotification) {
        if let Some(sender) = self.user_channels.get(user_id) {
            // send only errs when no receiver is listening, which is fine
            let _ = sender.send(notification.clone());
        }
        debug!(
            user_id = %user_id,
            event_type = %notification.event_type,
            task_id = %notification.task_id,
            "Sent notification to user channel"
        );
    }

    pub fn notify_task_subscribers(&self, task_id: Uuid, notification: TaskNotification) {
        if let Some(sender) = self.task_channels.get(&task_id) {
            let _ = sender.send(notification.clone());
        }
        debug!(
            task_id = %task_id,
            event_type = %notification.event_type,
            "Sent notification to task channel"
        );
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(256)
    }
}
