//! Test doubles for the pipeline collaborators.
//!
//! These capture every call and return configured responses, so pipeline
//! behavior can be verified without network access or files on disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{
    BackendError, BackendResult, TicketError, TicketResult, TrackerError, TrackerResult,
};
use crate::ports::{AnalysisBackend, RecurrenceTracker, TicketClient};

/// Scripted analysis backend.
#[derive(Clone)]
pub struct StubBackend {
    available: bool,
    reply: Result<String, BackendError>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl StubBackend {
    /// A live backend answering every prompt with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            available: true,
            reply: Ok(reply.into()),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A live backend whose every call fails with `error`.
    pub fn failing(error: BackendError) -> Self {
        Self {
            available: true,
            reply: Err(error),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Report the backend as unavailable.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.read().len()
    }
}

#[async_trait]
impl AnalysisBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, prompt: &str) -> BackendResult<String> {
        self.prompts.write().push(prompt.to_string());
        self.reply.clone()
    }
}

/// Captured `create_ticket` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedTicket {
    pub summary: String,
    pub description: String,
}

/// Ticket client that records calls and hands out sequential references.
#[derive(Clone, Default)]
pub struct RecordingTicketClient {
    calls: Arc<RwLock<Vec<CapturedTicket>>>,
    next_id: Arc<AtomicUsize>,
    simulate_failure: Arc<RwLock<Option<TicketError>>>,
}

impl RecordingTicketClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent call with `error`.
    pub fn simulate_failure(self, error: TicketError) -> Self {
        *self.simulate_failure.write() = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<CapturedTicket> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }
}

#[async_trait]
impl TicketClient for RecordingTicketClient {
    async fn create_ticket(&self, summary: &str, description: &str) -> TicketResult<String> {
        self.calls.write().push(CapturedTicket {
            summary: summary.to_string(),
            description: description.to_string(),
        });
        if let Some(err) = self.simulate_failure.read().clone() {
            return Err(err);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("TEST-{}", id))
    }
}

/// In-memory recurrence tracker.
#[derive(Clone, Default)]
pub struct RecordingTracker {
    counts: Arc<RwLock<HashMap<String, u64>>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every increment with a storage error (calls are still counted).
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn count(&self, issue: &str) -> u64 {
        self.counts.read().get(issue).copied().unwrap_or(0)
    }

    /// Total number of `increment` calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecurrenceTracker for RecordingTracker {
    fn increment(&self, issue: &str) -> TrackerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TrackerError::Unavailable("simulated tracker failure".to_string()));
        }
        *self.counts.write().entry(issue.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
