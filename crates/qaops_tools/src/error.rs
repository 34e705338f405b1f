//! Error types for the tool integrations.

use thiserror::Error;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid ticket base URL '{0}': expected an http(s) URL")]
    InvalidBaseUrl(String),

    #[error("Failed to read CI log {path}: {source}")]
    LogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
