//! Error types for the triage pipeline and its collaborators.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by stages and the pipeline driver.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Stage {stage} expected content key '{key}'")]
    MissingContent { stage: String, key: String },

    #[error("Invalid content for stage {stage}: {message}")]
    InvalidContent { stage: String, message: String },

    #[error("Ticketing failed in stage {stage}: {source}")]
    Ticketing {
        stage: String,
        #[source]
        source: TicketError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a missing content error.
    pub fn missing_content(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingContent {
            stage: stage.into(),
            key: key.into(),
        }
    }

    /// Create an invalid content error.
    pub fn invalid_content(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidContent {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for analysis backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures of an analysis backend. Always recovered by the analysis stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Analysis backend not configured")]
    NotConfigured,

    #[error("Analysis backend request failed: {0}")]
    Request(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

/// Result type alias for ticketing calls.
pub type TicketResult<T> = Result<T, TicketError>;

/// Failures of the ticketing collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("Ticket rejected: {0}")]
    Rejected(String),

    #[error("Ticketing service unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for recurrence tracker calls.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Failures of the recurrence tracker's counter store.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to update memory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt memory bank: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Tracker unavailable: {0}")]
    Unavailable(String),
}
