//! Translates each lifecycle event into a [`TaskNotification`] and forwards
//! it to both channel families. One registration per event kind shares this
//! consumer.

use crate::error::Result;
use crate::events::TaskLifecycleEvent;
use crate::messaging::EventConsumer;
use crate::notification::service::{NotificationService, TaskNotification};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct NotificationConsumer {
    service: Arc<NotificationService>,
}

impl NotificationConsumer {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }

    fn translate(event: &TaskLifecycleEvent) -> TaskNotification {
        let (status, progress_percent, message) = match event {
            TaskLifecycleEvent::Created(e) => (
                "Pending",
                None,
                format!("Task created ({})", e.task_type),
            ),
            TaskLifecycleEvent::Started(_) => {
                ("Running", Some(0), "Task started".to_string())
            }
            TaskLifecycleEvent::ProgressUpdated(e) => (
                "Running",
                Some(e.progress_percent),
                e.status_message
                    .clone()
                    .unwrap_or_else(|| format!("Progress: {}%", e.progress_percent)),
            ),
            TaskLifecycleEvent::Completed(e) => (
                "Completed",
                Some(100),
                e.result_location
                    .clone()
                    .map(|location| format!("Task completed: {location}"))
                    .unwrap_or_else(|| "Task completed".to_string()),
            ),
            TaskLifecycleEvent::Failed(e) => {
                ("Failed", None, format!("Task failed: {}", e.error_message))
            }
            TaskLifecycleEvent::Cancelled(_) => {
                ("Cancelled", None, "Task cancelled".to_string())
            }
        };

        TaskNotification {
            task_id: event.task_id(),
            user_id: event.user_id().to_string(),
            event_type: event.event_type().to_string(),
            status: status.to_string(),
            progress_percent,
            message,
            timestamp: event.occurred_at(),
        }
    }
}

#[async_trait]
impl EventConsumer for NotificationConsumer {
    fn name(&self) -> &str {
        "notification-forwarder"
    }

    async fn consume(&self, event: TaskLifecycleEvent) -> Result<()> {
        debug!(
            event_type = event.event_type(),
            task_id = %event.task_id(),
            "Forwarding event to realtime subscribers"
        );

        let notification = Self::translate(&event);
        self.service
            .notify_user(&notification.user_id, notification.clone());
        self.service
            .notify_task_subscribers(notification.task_id, notification);
        Ok(())
    }
}
