//! Pipeline configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::planning::{DEFAULT_TICKET_SUMMARY, DRIVER_RECEIVER};
use crate::stage::StageKind;

/// Confidence reported with every successful result.
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Sender of the envelope that starts a run.
pub const INITIAL_SENDER: &str = "System";

/// Immutable settings for a pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub diagnostics_name: String,
    pub analysis_name: String,
    pub planning_name: String,
    /// Receiver named on the planning stage's envelope
    pub final_receiver: String,
    pub ticket_summary: String,
    pub confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            diagnostics_name: StageKind::Diagnostics.default_name().to_string(),
            analysis_name: StageKind::Analysis.default_name().to_string(),
            planning_name: StageKind::Planning.default_name().to_string(),
            final_receiver: DRIVER_RECEIVER.to_string(),
            ticket_summary: DEFAULT_TICKET_SUMMARY.to_string(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let names = [
            ("diagnosticsName", &self.diagnostics_name),
            ("analysisName", &self.analysis_name),
            ("planningName", &self.planning_name),
            ("finalReceiver", &self.final_receiver),
            ("ticketSummary", &self.ticket_summary),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(CoreError::Config(format!("{} must not be empty", field)));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::Config(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.diagnostics_name, "Diagnostics");
        assert_eq!(config.analysis_name, "RootCause");
        assert_eq!(config.planning_name, "ActionPlanner");
        assert_eq!(config.confidence, DEFAULT_CONFIDENCE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ticketSummary": "Nightly", "confidence": 0.5}}"#).unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.ticket_summary, "Nightly");
        assert_eq!(config.confidence, 0.5);
        assert_eq!(config.planning_name, "ActionPlanner");
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let config = PipelineConfig {
            confidence: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_stage_name() {
        let config = PipelineConfig {
            analysis_name: String::new(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_ticket_summary() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ticketSummary": "  "}}"#).unwrap();

        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("ticketSummary"));
    }
}
