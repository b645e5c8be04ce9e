use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskFlowError {
    InvalidTransition(String),
    StorageError(String),
    MessagingError(String),
    SerializationError(String),
    ConfigurationError(String),
    NotFound(String),
    Unauthorized(String),
    QuotaExceeded(String),
}

impl fmt::Display for TaskFlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFlowError::InvalidTransition(msg) => write!(f, "Invalid transition: {msg}"),
            TaskFlowError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            TaskFlowError::MessagingError(msg) => write!(f, "Messaging error: {msg}"),
            TaskFlowError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            TaskFlowError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            TaskFlowError::NotFound(msg) => write!(f, "Not found: {msg}"),
            TaskFlowError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            TaskFlowError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {msg}"),
        }
    }
}

impl std::error::Error for TaskFlowError {}

impl From<serde_json::Error> for TaskFlowError {
    fn from(err: serde_json::Error) -> Self {
        TaskFlowError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskFlowError>;
