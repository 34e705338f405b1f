//! The stage contract.
//!
//! Every pipeline stage consumes one [`Envelope`] and produces a new one.
//! Stages hold only configuration fixed at construction, so a single instance
//! can serve concurrent runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use qaops_core::{CoreResult, CorrelationId, Envelope, Stage};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Stage for Echo {
//!     fn name(&self) -> &str { "Echo" }
//!
//!     async fn process(&self, input: Envelope, _id: &CorrelationId) -> CoreResult<Envelope> {
//!         Envelope::new(self.name(), input.sender(), input.into_content())
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::CoreResult;
use crate::logging::CorrelationId;

/// Content keys exchanged between stages.
pub mod keys {
    pub const FAILED_TESTS: &str = "failed_tests";
    pub const ANALYSIS: &str = "analysis";
    pub const PLAN: &str = "plan";
    pub const TICKET: &str = "ticket";
}

/// The three stage roles of the triage pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Diagnostics,
    Analysis,
    Planning,
}

impl StageKind {
    /// Default stage name, used as the envelope sender.
    pub fn default_name(&self) -> &'static str {
        match self {
            StageKind::Diagnostics => "Diagnostics",
            StageKind::Analysis => "RootCause",
            StageKind::Planning => "ActionPlanner",
        }
    }

}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StageKind::Diagnostics => "diagnostics",
            StageKind::Analysis => "analysis",
            StageKind::Planning => "planning",
        };
        write!(f, "{}", label)
    }
}

/// A unit of the triage pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, used as the sender of produced envelopes and as log source.
    fn name(&self) -> &str;

    /// Content keys this stage requires on input. The driver refuses to
    /// invoke the stage when one is absent.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Content keys this stage guarantees on output. An output lacking one
    /// fails the stage.
    fn produces(&self) -> &'static [&'static str] {
        &[]
    }

    /// Consume one envelope and produce the next.
    async fn process(&self, input: Envelope, correlation_id: &CorrelationId)
        -> CoreResult<Envelope>;
}
