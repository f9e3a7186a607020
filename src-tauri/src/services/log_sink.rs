use crate::models::{LogEntry, LogLevel};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 后端生命周期与原始输出的观测出口
pub trait LogSink: Send + Sync {
    fn record(&self, entry: LogEntry);
}

/// 转发到 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: LogEntry) {
        let instance = entry
            .instance_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let source = entry.source.as_str();
        let message = entry.message.trim_end();
        match entry.level {
            LogLevel::Error => tracing::error!(instance = %instance, source, "{message}"),
            LogLevel::Warning => tracing::warn!(instance = %instance, source, "{message}"),
            LogLevel::Info => tracing::info!(instance = %instance, source, "{message}"),
            LogLevel::Debug => tracing::debug!(instance = %instance, source, "{message}"),
        }
    }
}

pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// 保留最近 N 条日志，供 UI 回读
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogSink for LogBuffer {
    fn record(&self, entry: LogEntry) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// 同时写入多个出口
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for FanoutSink {
    fn record(&self, entry: LogEntry) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(entry.clone());
            }
            last.record(entry);
        }
    }
}
