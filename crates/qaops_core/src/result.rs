//! The pipeline result returned to front-ends.
//!
//! The serialized shape is stable: consumers depend on these exact keys.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Error,
}

/// Aggregated output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReport {
    pub failed_tests: Vec<String>,
    pub analysis: String,
    pub remediation_plan: String,
    pub ticket_reference: String,
    pub confidence: f64,
    pub status: PipelineStatus,
}

/// Output of a failed run. No partial aggregation is ever included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageFailure {
    pub status: PipelineStatus,
    pub error: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineResult {
    Success(TriageReport),
    Error(TriageFailure),
}

impl PipelineResult {
    pub fn success(
        failed_tests: Vec<String>,
        analysis: impl Into<String>,
        remediation_plan: impl Into<String>,
        ticket_reference: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::Success(TriageReport {
            failed_tests,
            analysis: analysis.into(),
            remediation_plan: remediation_plan.into(),
            ticket_reference: ticket_reference.into(),
            confidence,
            status: PipelineStatus::Success,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(TriageFailure {
            status: PipelineStatus::Error,
            error: message.into(),
            confidence: 0.0,
        })
    }

    pub fn status(&self) -> PipelineStatus {
        match self {
            PipelineResult::Success(_) => PipelineStatus::Success,
            PipelineResult::Error(_) => PipelineStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == PipelineStatus::Success
    }

    pub fn confidence(&self) -> f64 {
        match self {
            PipelineResult::Success(report) => report.confidence,
            PipelineResult::Error(failure) => failure.confidence,
        }
    }

    pub fn report(&self) -> Option<&TriageReport> {
        match self {
            PipelineResult::Success(report) => Some(report),
            PipelineResult::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PipelineResult::Success(_) => None,
            PipelineResult::Error(failure) => Some(&failure.error),
        }
    }

    /// HTTP status a network front-end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineResult::Success(_) => 200,
            PipelineResult::Error(_) => 500,
        }
    }

    pub fn to_json(&self) -> CoreResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
