//! Logging capability injected into stages and the pipeline driver.
//!
//! Stages never reach for process-wide logger state. Each one is built with a
//! [`TriageLogger`] and receives the [`CorrelationId`] of the current run from
//! the driver on every call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier shared by every log line of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for pipeline log lines.
pub trait TriageLogger: Send + Sync {
    fn log(&self, level: LogLevel, source: &str, message: &str, correlation_id: &CorrelationId);
}

/// Forwards log lines to `tracing` with `source` and `correlation_id` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn shared() -> Arc<dyn TriageLogger> {
        Arc::new(Self)
    }
}

impl TriageLogger for TracingLogger {
    fn log(&self, level: LogLevel, source: &str, message: &str, correlation_id: &CorrelationId) {
        match level {
            LogLevel::Debug => tracing::debug!(source, correlation_id = %correlation_id, "{}", message),
            LogLevel::Info => tracing::info!(source, correlation_id = %correlation_id, "{}", message),
            LogLevel::Warn => tracing::warn!(source, correlation_id = %correlation_id, "{}", message),
            LogLevel::Error => tracing::error!(source, correlation_id = %correlation_id, "{}", message),
        }
    }
}

/// A captured log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub correlation_id: CorrelationId,
}

/// Logger that keeps every line in memory, for tests and run reports.
#[derive(Clone, Default)]
pub struct MemoryLogger {
    records: Arc<RwLock<Vec<LogRecord>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Records emitted at the given level.
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Records carrying the given correlation id.
    pub fn for_run(&self, correlation_id: &CorrelationId) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl TriageLogger for MemoryLogger {
    fn log(&self, level: LogLevel, source: &str, message: &str, correlation_id: &CorrelationId) {
        self.records.write().push(LogRecord {
            timestamp: Utc::now(),
            level,
            source: source.to_string(),
            message: message.to_string(),
            correlation_id: *correlation_id,
        });
    }
}
