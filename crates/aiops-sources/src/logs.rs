//! Log entries and the in-memory logs source.

use crate::{selects, LogsSource};
use aiops_core::types::TimeRange;
use aiops_core::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub service: String,
    pub level: LogLevel,
    /// Unix seconds
    pub timestamp: i64,
    pub message: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Raw line as shipped, may carry a stack trace
    #[serde(default)]
    pub raw: String,
}

impl LogEntry {
    pub fn new(
        service: impl Into<String>,
        level: LogLevel,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            service: service.into(),
            level,
            timestamp,
            raw: message.clone(),
            message,
            trace_id: None,
            labels: HashMap::new(),
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Logs source backed by a fixed set of entries
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogs {
    entries: Vec<LogEntry>,
    failure: Option<String>,
}

impl InMemoryLogs {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self {
            entries,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            failure: Some(message.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LogsSource for InMemoryLogs {
    fn name(&self) -> &str {
        "in_memory_logs"
    }

    async fn fetch(&self, services: &[String], time_range: TimeRange) -> Result<Vec<LogEntry>> {
        if let Some(message) = &self.failure {
            return Err(Error::data_source(self.name(), message.clone()));
        }

        let entries: Vec<LogEntry> = self
            .entries
            .iter()
            .filter(|e| selects(services, &e.service) && time_range.contains(e.timestamp))
            .cloned()
            .collect();

        debug!(source = self.name(), entries = entries.len(), "Fetched logs");
        Ok(entries)
    }
}
