//! CI log sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use qaops_core::LogSource;
use tracing::info;

use crate::error::{ToolError, ToolResult};

/// Build log returned by [`SampleJenkinsSource`].
pub const SAMPLE_BUILD_LOG: &str = "[INFO] Build started
[ERROR] test_login FAILED due to timeout
[INFO] Build finished";

/// Jenkins stand-in that always returns the same sample build log.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleJenkinsSource;

#[async_trait]
impl LogSource for SampleJenkinsSource {
    async fn fetch_ci_logs(&self) -> std::io::Result<String> {
        info!("Fetched CI logs from Jenkins");
        Ok(SAMPLE_BUILD_LOG.to_string())
    }
}

/// Log source backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
}

impl FileLogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file, naming the path on failure.
    pub async fn read(&self) -> ToolResult<String> {
        let logs = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ToolError::LogRead {
                path: self.path.display().to_string(),
                source,
            })?;
        info!(path = %self.path.display(), bytes = logs.len(), "Read CI log file");
        Ok(logs)
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn fetch_ci_logs(&self) -> std::io::Result<String> {
        self.read().await.map_err(|e| match e {
            ToolError::LogRead { source, .. } => source,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        })
    }
}
