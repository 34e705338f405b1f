//! # qaops_tools
//!
//! Concrete collaborators for the triage pipeline:
//!
//! - [`MockJiraClient`]: deterministic ticket references
//! - [`SampleJenkinsSource`] and [`FileLogSource`]: CI log text
//! - [`MemoryBank`]: JSON-file recurrence counts

pub mod error;
pub mod jenkins;
pub mod jira;
pub mod memory;

pub use error::{ToolError, ToolResult};
pub use jenkins::{FileLogSource, SampleJenkinsSource, SAMPLE_BUILD_LOG};
pub use jira::{MockJiraClient, DEFAULT_JIRA_BASE_URL, PROJECT_KEY};
pub use memory::{IssueCounts, MemoryBank, DEFAULT_MEMORY_FILE};
