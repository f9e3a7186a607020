use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub instance_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        instance_id: Option<Uuid>,
        level: LogLevel,
        source: LogSource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            instance_id,
            timestamp: Utc::now(),
            level,
            source,
            message: message.into(),
        }
    }

    pub fn lifecycle(instance_id: Option<Uuid>, level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(instance_id, level, LogSource::Lifecycle, message)
    }

    /// 后端原始输出，stderr 按 warning 级别上报
    pub fn output(instance_id: Uuid, source: LogSource, message: impl Into<String>) -> Self {
        let level = match source {
            LogSource::Stderr => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        Self::new(Some(instance_id), level, source, message)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Stdout,
    Stderr,
    Lifecycle,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::Lifecycle => "lifecycle",
        }
    }
}
