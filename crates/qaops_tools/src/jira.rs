//! Mock Jira ticketing client.
//!
//! Hands out deterministic ticket URLs of the form
//! `<base>/ticket/QA-<n>`, numbered per client from 1.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use qaops_core::{TicketClient, TicketError, TicketResult};
use tracing::{info, warn};

use crate::error::{ToolError, ToolResult};

/// Base URL used when none is configured.
pub const DEFAULT_JIRA_BASE_URL: &str = "https://mock-jira.local";

/// Project key prefixed to ticket numbers.
pub const PROJECT_KEY: &str = "QA";

pub struct MockJiraClient {
    base_url: String,
    sequence: AtomicU64,
    simulate_failure: RwLock<Option<TicketError>>,
}

impl MockJiraClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_JIRA_BASE_URL.to_string(),
            sequence: AtomicU64::new(0),
            simulate_failure: RwLock::new(None),
        }
    }

    /// Client issuing URLs under `base_url` instead of the default host.
    pub fn with_base_url(base_url: impl Into<String>) -> ToolResult<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ToolError::InvalidBaseUrl(base_url));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
            ..Self::new()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fail every following call with `error`. `None` restores normal operation.
    pub fn set_failure(&self, error: Option<TicketError>) {
        *self.simulate_failure.write() = error;
    }

    /// Number of tickets issued so far.
    pub fn issued(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for MockJiraClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketClient for MockJiraClient {
    async fn create_ticket(&self, summary: &str, description: &str) -> TicketResult<String> {
        if let Some(err) = self.simulate_failure.read().clone() {
            warn!("Simulated JIRA failure for '{}': {}", summary, err);
            return Err(err);
        }
        if summary.trim().is_empty() {
            return Err(TicketError::Rejected("summary must not be empty".to_string()));
        }

        info!(
            description_len = description.len(),
            "Creating JIRA ticket: {}",
            summary
        );
        let number = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}/ticket/{}-{}", self.base_url, PROJECT_KEY, number))
    }
}
