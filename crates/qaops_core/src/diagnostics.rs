//! Diagnostics stage: pull failing test lines out of raw CI logs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::envelope::Envelope;
use crate::error::{CoreError, CoreResult};
use crate::logging::{CorrelationId, LogLevel, TracingLogger, TriageLogger};
use crate::stage::{keys, Stage, StageKind};

/// Case-sensitive substring marking a failure line.
pub const FAILURE_MARKER: &str = "FAIL";

/// Every line of `logs` containing [`FAILURE_MARKER`], verbatim and in order.
///
/// Lines are split on `\n` only and are not deduplicated.
pub fn extract_failed_tests(logs: &str) -> Vec<String> {
    logs.split('\n')
        .filter(|line| line.contains(FAILURE_MARKER))
        .map(str::to_string)
        .collect()
}

/// The last `window` lines of the trimmed log text.
///
/// A window of 0 keeps nothing and yields an empty string.
pub fn context_window(logs: &str, window: usize) -> String {
    let lines: Vec<&str> = logs.trim().split('\n').collect();
    let start = lines.len().saturating_sub(window);
    lines[start..].join("\n")
}

pub struct DiagnosticsStage {
    name: String,
    receiver: String,
    logger: Arc<dyn TriageLogger>,
}

impl DiagnosticsStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: StageKind::Analysis.default_name().to_string(),
            logger: TracingLogger::shared(),
        }
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
}

impl Default for DiagnosticsStage {
    fn default() -> Self {
        Self::new(StageKind::Diagnostics.default_name())
    }
}

#[async_trait]
impl Stage for DiagnosticsStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn produces(&self) -> &'static [&'static str] {
        &[keys::FAILED_TESTS]
    }

    async fn process(&self, input: Envelope, correlation_id: &CorrelationId) -> CoreResult<Envelope> {
        let logs = input.text().ok_or_else(|| {
            CoreError::invalid_content(&self.name, "expected raw log text as content")
        })?;

        let failed_tests = extract_failed_tests(logs);
        self.logger.log(
            LogLevel::Info,
            &self.name,
            &format!("Extracted failed tests: {:?}", failed_tests),
            correlation_id,
        );

        Envelope::from_fields(
            &self.name,
            &self.receiver,
            [(keys::FAILED_TESTS, json!(failed_tests))],
        )
    }
}
