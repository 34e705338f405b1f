//! Analysis stage: root-cause summary for failing tests.
//!
//! The stage asks its [`AnalysisBackend`] for a summary when one is
//! available. Any backend failure, or the absence of a backend, yields the
//! deterministic mock summary instead. Errors from the backend never leave
//! this stage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::envelope::Envelope;
use crate::error::{BackendError, CoreError, CoreResult};
use crate::logging::{CorrelationId, LogLevel, TracingLogger, TriageLogger};
use crate::ports::{AnalysisBackend, NullBackend};
use crate::stage::{keys, Stage, StageKind};

/// Prompt sent to a live backend. Pure function of `failed_tests`.
pub fn build_prompt(failed_tests: &[String]) -> String {
    format!("Summarize root causes from logs: {:?}", failed_tests)
}

/// Summary used whenever the live backend is absent or fails.
pub fn mock_analysis(failed_tests: &[String]) -> String {
    format!(
        "Mock analysis: {} failed test(s) {:?} likely due to timeout or configuration issues",
        failed_tests.len(),
        failed_tests
    )
}

/// Why the mock branch was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoBackend,
    BackendFailed(String),
}

/// The two ways an analysis can be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Live { text: String },
    Mock { text: String, reason: FallbackReason },
}

impl AnalysisOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, AnalysisOutcome::Live { .. })
    }

    /// Collapse into the analysis string carried downstream.
    pub fn into_text(self) -> String {
        match self {
            AnalysisOutcome::Live { text } | AnalysisOutcome::Mock { text, .. } => text,
        }
    }
}

pub struct AnalysisStage {
    name: String,
    receiver: String,
    backend: Arc<dyn AnalysisBackend>,
    logger: Arc<dyn TriageLogger>,
}

impl AnalysisStage {
    /// Create a stage with no live backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: StageKind::Planning.default_name().to_string(),
            backend: NullBackend::shared(),
            logger: TracingLogger::shared(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Set the advisory receiver of produced envelopes.
    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn TriageLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Produce the analysis for `failed_tests`, live or mocked.
    pub async fn analyze(
        &self,
        failed_tests: &[String],
        correlation_id: &CorrelationId,
    ) -> AnalysisOutcome {
        if !self.backend.is_available() {
            self.logger.log(
                LogLevel::Debug,
                &self.name,
                "No analysis backend configured, using mock analysis",
                correlation_id,
            );
            return AnalysisOutcome::Mock {
                text: mock_analysis(failed_tests),
                reason: FallbackReason::NoBackend,
            };
        }

        match self.backend.generate(&build_prompt(failed_tests)).await {
            Ok(text) => AnalysisOutcome::Live { text },
            Err(err) => {
                self.logger.log(
                    LogLevel::Warn,
                    &self.name,
                    &format!("{} backend error: {}", self.backend.name(), err),
                    correlation_id,
                );
                let reason = match err {
                    BackendError::NotConfigured => FallbackReason::NoBackend,
                    other => FallbackReason::BackendFailed(other.to_string()),
                };
                AnalysisOutcome::Mock {
                    text: mock_analysis(failed_tests),
                    reason,
                }
            }
        }
    }
}

impl Default for AnalysisStage {
    fn default() -> Self {
        Self::new(StageKind::Analysis.default_name())
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &'static [&'static str] {
        &[keys::FAILED_TESTS]
    }

    fn produces(&self) -> &'static [&'static str] {
        &[keys::ANALYSIS]
    }

    async fn process(&self, input: Envelope, correlation_id: &CorrelationId) -> CoreResult<Envelope> {
        if input.content().get(keys::FAILED_TESTS).is_none() {
            return Err(CoreError::missing_content(&self.name, keys::FAILED_TESTS));
        }
        let failed_tests = input.get_string_list(keys::FAILED_TESTS).ok_or_else(|| {
            CoreError::invalid_content(&self.name, "failed_tests must be a list of strings")
        })?;

        let outcome = self.analyze(&failed_tests, correlation_id).await;
        let analysis = outcome.into_text();

        let preview: String = analysis.chars().take(100).collect();
        self.logger.log(
            LogLevel::Info,
            &self.name,
            &format!("Analysis completed: {}...", preview),
            correlation_id,
        );

        Envelope::from_fields(&self.name, &self.receiver, [(keys::ANALYSIS, json!(analysis))])
    }
}
