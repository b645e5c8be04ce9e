use crate::events::TaskLifecycleEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pending (or already published) event row.
///
/// Rows are never deleted: once `processed_at` is set the row is inert and
/// kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub error: Option<String>,
}

impl OutboxMessage {
    /// Serialize an event into a fresh pending row
    pub fn for_event(event: &TaskLifecycleEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: Utc::now(),
            processed_at: None,
            retry_count: 0,
            error: None,
        })
    }

    /// Reconstruct the concrete event from the stored payload.
    ///
    /// An unknown discriminator or malformed payload surfaces here and is
    /// treated by the processor as a per-message failure.
    pub fn decode(&self) -> Result<TaskLifecycleEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskCreated;

    #[test]
    fn test_for_event_round_trips() {
        let event: TaskLifecycleEvent =
            TaskCreated::new(Uuid::new_v4(), "u1", "Email", "High", None, None, "corr").into();
        let message = OutboxMessage::for_event(&event).unwrap();

        assert_eq!(message.event_type, "created");
        assert!(message.processed_at.is_none());
        assert_eq!(message.retry_count, 0);
        assert_eq!(message.decode().unwrap(), event);
    }

    #[test]
    fn test_decode_rejects_unknown_event_type() {
        let mut message = OutboxMessage::for_event(
            &TaskCreated::new(Uuid::new_v4(), "u1", "Email", "High", None, None, "corr").into(),
        )
        .unwrap();
        message.payload = r#"{"event_type":"mystery"}"#.to_string();
        assert!(message.decode().is_err());
    }
}
