//! # qaops_core
//!
//! Agent message-passing pipeline for CI failure triage.
//!
//! Raw CI log text flows through three stages, each consuming one
//! [`Envelope`] and producing the next:
//!
//! ```text
//! ci logs ──▶ Diagnostics ──▶ Analysis ──▶ Planning ──▶ PipelineResult
//!             failed_tests    analysis     plan, ticket
//! ```
//!
//! | Stage | Input keys | Output keys |
//! |-------|------------|-------------|
//! | [`DiagnosticsStage`] | raw text | `failed_tests` |
//! | [`AnalysisStage`] | `failed_tests` | `analysis` |
//! | [`PlanningStage`] | `analysis` | `plan`, `ticket` |
//!
//! The analysis stage is the only place where collaborator failures are
//! absorbed: a missing or failing [`AnalysisBackend`] yields a deterministic
//! mock summary. Ticketing failures abort the run.

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod mock;
pub mod pipeline;
pub mod planning;
pub mod ports;
pub mod result;
pub mod stage;

pub use analysis::{build_prompt, mock_analysis, AnalysisOutcome, AnalysisStage, FallbackReason};
pub use config::{PipelineConfig, DEFAULT_CONFIDENCE, INITIAL_SENDER};
pub use diagnostics::{context_window, extract_failed_tests, DiagnosticsStage, FAILURE_MARKER};
pub use envelope::Envelope;
pub use error::{
    BackendError, BackendResult, CoreError, CoreResult, TicketError, TicketResult, TrackerError,
    TrackerResult,
};
pub use logging::{CorrelationId, LogLevel, LogRecord, MemoryLogger, TracingLogger, TriageLogger};
pub use pipeline::{PipelineBuilder, PipelineRun, RunState, TriagePipeline};
pub use planning::{PlanningStage, DEFAULT_TICKET_SUMMARY, DRIVER_RECEIVER, REMEDIATION_PLAN};
pub use ports::{AnalysisBackend, LogSource, NullBackend, RecurrenceTracker, TicketClient};
pub use result::{PipelineResult, PipelineStatus, TriageFailure, TriageReport};
pub use stage::{keys, Stage, StageKind};
