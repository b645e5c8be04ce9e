use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority levels for task scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric level, higher means more urgent
    pub fn level(&self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Case-insensitive total parse. Unknown names fall back to `Medium`
    /// rather than failing; callers that need strict validation must check
    /// the input themselves.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    /// Total parse from a numeric level, falling back to `Medium`
    pub fn from_level(level: i32) -> Self {
        match level {
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            4 => Self::Critical,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Well-known task types dispatched by the execution service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Report,
    Email,
    DataProcessing,
    Notification,
    Backup,
}

impl TaskType {
    /// Case-insensitive total parse. Unknown names fall back to `Report`.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "report" => Self::Report,
            "email" => Self::Email,
            "dataprocessing" => Self::DataProcessing,
            "notification" => Self::Notification,
            "backup" => Self::Backup,
            _ => Self::Report,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report => write!(f, "Report"),
            Self::Email => write!(f, "Email"),
            Self::DataProcessing => write!(f, "DataProcessing"),
            Self::Notification => write!(f, "Notification"),
            Self::Backup => write!(f, "Backup"),
        }
    }
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Report
    }
}
