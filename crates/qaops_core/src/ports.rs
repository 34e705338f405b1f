//! Collaborator interfaces the pipeline calls through.
//!
//! Concrete providers live in other crates (`qaops_llm`, `qaops_tools`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult, TicketResult, TrackerResult};

/// Text generation capability used by the analysis stage.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short provider label for logs.
    fn name(&self) -> &str;

    /// Whether a live provider is configured. Fixed at construction.
    fn is_available(&self) -> bool {
        true
    }

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> BackendResult<String>;
}

/// Backend used when no provider credential is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn shared() -> Arc<dyn AnalysisBackend> {
        Arc::new(Self)
    }
}

#[async_trait]
impl AnalysisBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str) -> BackendResult<String> {
        Err(BackendError::NotConfigured)
    }
}

/// Issue tracker used by the planning stage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Create a ticket and return its reference (usually a URL).
    async fn create_ticket(&self, summary: &str, description: &str) -> TicketResult<String>;
}

/// Persistent per-issue failure counter.
///
/// Implementations own the serialization of concurrent read-modify-write
/// increments on the same issue.
#[cfg_attr(test, mockall::automock)]
pub trait RecurrenceTracker: Send + Sync {
    fn increment(&self, issue: &str) -> TrackerResult<()>;
}

/// Source of raw CI log text.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_ci_logs(&self) -> std::io::Result<String>;
}
