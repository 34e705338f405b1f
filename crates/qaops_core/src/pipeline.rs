//! Pipeline driver.
//!
//! Runs Diagnostics, Analysis and Planning in that fixed order, handing each
//! stage's output envelope unchanged to the next stage, then aggregates a
//! [`PipelineResult`]. Any stage error aborts the run and yields the error
//! shape; nothing from a partial run is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qaops_core::TriagePipeline;
//!
//! let pipeline = TriagePipeline::builder(Arc::new(jira))
//!     .with_backend(backend)
//!     .with_tracker(Arc::new(memory_bank))
//!     .build()?;
//!
//! let result = pipeline.run("[ERROR] test_login FAILED").await;
//! println!("{}", result.to_json()?);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisStage;
use crate::config::{PipelineConfig, INITIAL_SENDER};
use crate::diagnostics::DiagnosticsStage;
use crate::envelope::Envelope;
use crate::error::{CoreError, CoreResult};
use crate::logging::{CorrelationId, LogLevel, TracingLogger, TriageLogger};
use crate::planning::PlanningStage;
use crate::ports::{AnalysisBackend, NullBackend, RecurrenceTracker, TicketClient};
use crate::result::PipelineResult;
use crate::stage::{keys, Stage, StageKind};

const DRIVER_SOURCE: &str = "TriagePipeline";

/// States of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    Diagnosed,
    Analyzed,
    Planned,
    Done,
    Failed,
}

impl RunState {
    /// State reached once the given stage has succeeded.
    pub fn after(kind: StageKind) -> Self {
        match kind {
            StageKind::Diagnostics => RunState::Diagnosed,
            StageKind::Analysis => RunState::Analyzed,
            StageKind::Planning => RunState::Planned,
        }
    }
}

/// Record of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub correlation_id: CorrelationId,
    /// Visited states in order, ending in `Done` or `Failed`
    pub states: Vec<RunState>,
    /// Stage that failed, if any
    pub failed_stage: Option<StageKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub result: PipelineResult,
}

impl PipelineRun {
    pub fn final_state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Start)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Everything gathered from the three stage outputs.
struct Aggregate {
    failed_tests: Vec<String>,
    analysis: String,
    plan: String,
    ticket: String,
}

/// A stage error together with where it happened.
struct StageFailure {
    stage: Option<StageKind>,
    error: CoreError,
}

impl StageFailure {
    fn at(stage: StageKind) -> impl FnOnce(CoreError) -> Self {
        move |error| Self {
            stage: Some(stage),
            error,
        }
    }
}

pub struct TriagePipeline {
    config: PipelineConfig,
    diagnostics: Arc<dyn Stage>,
    analysis: Arc<dyn Stage>,
    planning: Arc<dyn Stage>,
    tracker: Option<Arc<dyn RecurrenceTracker>>,
    logger: Arc<dyn TriageLogger>,
}

impl TriagePipeline {
    /// Start building a pipeline around a ticketing client.
    pub fn builder(tickets: Arc<dyn TicketClient>) -> PipelineBuilder {
        PipelineBuilder::new(tickets)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline and return only the result.
    pub async fn run(&self, ci_logs: &str) -> PipelineResult {
        self.execute(ci_logs).await.result
    }

    /// Run the pipeline and return the full run record.
    pub async fn execute(&self, ci_logs: &str) -> PipelineRun {
        let correlation_id = CorrelationId::new();
        let started_at = Utc::now();
        let mut states = vec![RunState::Start];

        self.log(LogLevel::Info, "Starting QA triage pipeline", &correlation_id);

        let outcome = self.drive(ci_logs, &correlation_id, &mut states).await;

        let (result, failed_stage) = match outcome {
            Ok(aggregate) => {
                self.record_recurrences(&aggregate.failed_tests, &correlation_id);
                states.push(RunState::Done);

                let result = PipelineResult::success(
                    aggregate.failed_tests,
                    aggregate.analysis,
                    aggregate.plan,
                    aggregate.ticket,
                    self.config.confidence,
                );
                self.log(
                    LogLevel::Info,
                    &format!(
                        "Pipeline completed: {}",
                        result.to_json().map(|v| v.to_string()).unwrap_or_default()
                    ),
                    &correlation_id,
                );
                (result, None)
            }
            Err(failure) => {
                states.push(RunState::Failed);
                self.log(
                    LogLevel::Error,
                    &format!("Pipeline error: {}", failure.error),
                    &correlation_id,
                );
                (PipelineResult::error(failure.error.to_string()), failure.stage)
            }
        };

        PipelineRun {
            correlation_id,
            states,
            failed_stage,
            started_at,
            completed_at: Utc::now(),
            result,
        }
    }

    async fn drive(
        &self,
        ci_logs: &str,
        correlation_id: &CorrelationId,
        states: &mut Vec<RunState>,
    ) -> Result<Aggregate, StageFailure> {
        let initial = Envelope::new(INITIAL_SENDER, self.diagnostics.name(), ci_logs)
            .map_err(|error| StageFailure { stage: None, error })?;

        let diagnosed = self
            .invoke(StageKind::Diagnostics, initial, correlation_id, states)
            .await?;
        let failed_tests = diagnosed
            .get_string_list(keys::FAILED_TESTS)
            .ok_or_else(|| self.unreadable(StageKind::Diagnostics, keys::FAILED_TESTS))?;

        let analyzed = self
            .invoke(StageKind::Analysis, diagnosed, correlation_id, states)
            .await?;
        let analysis = analyzed
            .get_str(keys::ANALYSIS)
            .map(str::to_string)
            .ok_or_else(|| self.unreadable(StageKind::Analysis, keys::ANALYSIS))?;

        let planned = self
            .invoke(StageKind::Planning, analyzed, correlation_id, states)
            .await?;
        let plan = planned
            .get_str(keys::PLAN)
            .ok_or_else(|| self.unreadable(StageKind::Planning, keys::PLAN))?;
        let ticket = planned
            .get_str(keys::TICKET)
            .ok_or_else(|| self.unreadable(StageKind::Planning, keys::TICKET))?;

        Ok(Aggregate {
            failed_tests,
            analysis,
            plan: plan.to_string(),
            ticket: ticket.to_string(),
        })
    }

    async fn invoke(
        &self,
        kind: StageKind,
        input: Envelope,
        correlation_id: &CorrelationId,
        states: &mut Vec<RunState>,
    ) -> Result<Envelope, StageFailure> {
        let stage = self.stage(kind);
        self.log(
            LogLevel::Debug,
            &format!("Executing {} stage '{}'", kind, stage.name()),
            correlation_id,
        );

        check_keys(stage.as_ref(), &input, stage.requires()).map_err(StageFailure::at(kind))?;
        let output = stage
            .process(input, correlation_id)
            .await
            .map_err(StageFailure::at(kind))?;
        check_keys(stage.as_ref(), &output, stage.produces()).map_err(StageFailure::at(kind))?;

        states.push(RunState::after(kind));
        Ok(output)
    }

    fn stage(&self, kind: StageKind) -> &Arc<dyn Stage> {
        match kind {
            StageKind::Diagnostics => &self.diagnostics,
            StageKind::Analysis => &self.analysis,
            StageKind::Planning => &self.planning,
        }
    }

    /// Output key the driver could not read. Declared keys are already
    /// present, so for those only the type can be wrong.
    fn unreadable(&self, kind: StageKind, key: &str) -> StageFailure {
        let stage = self.stage(kind).name();
        let error = if self.stage(kind).produces().contains(&key) {
            CoreError::invalid_content(stage, format!("'{}' has an unexpected type", key))
        } else {
            CoreError::missing_content(stage, key)
        };
        StageFailure {
            stage: Some(kind),
            error,
        }
    }

    /// Increment the tracker once per failing test entry. Best effort.
    fn record_recurrences(&self, failed_tests: &[String], correlation_id: &CorrelationId) {
        let Some(tracker) = &self.tracker else {
            self.log(
                LogLevel::Debug,
                "No recurrence tracker configured",
                correlation_id,
            );
            return;
        };

        for test in failed_tests {
            if let Err(e) = tracker.increment(test) {
                self.log(
                    LogLevel::Warn,
                    &format!("Failed to record recurrence for '{}': {}", test, e),
                    correlation_id,
                );
            }
        }
    }

    fn log(&self, level: LogLevel, message: &str, correlation_id: &CorrelationId) {
        self.logger.log(level, DRIVER_SOURCE, message, correlation_id);
    }
}

/// Fail with the first of `expected` absent from the envelope content.
fn check_keys(stage: &dyn Stage, envelope: &Envelope, expected: &[&str]) -> CoreResult<()> {
    match expected.iter().find(|key| envelope.content().get(**key).is_none()) {
        Some(key) => Err(CoreError::missing_content(stage.name(), *key)),
        None => Ok(()),
    }
}

/// Builder for [`TriagePipeline`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    tickets: Arc<dyn TicketClient>,
    backend: Arc<dyn AnalysisBackend>,
    tracker: Option<Arc<dyn RecurrenceTracker>>,
    logger: Arc<dyn TriageLogger>,
    diagnostics: Option<Arc<dyn Stage>>,
    analysis: Option<Arc<dyn Stage>>,
    planning: Option<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new(tickets: Arc<dyn TicketClient>) -> Self {
        Self {
            config: PipelineConfig::default(),
            tickets,
            backend: NullBackend::shared(),
            tracker: None,
            logger: TracingLogger::shared(),
            diagnostics: None,
            analysis: None,
            planning: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn RecurrenceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Logger shared by the driver and the built-in stages.
    pub fn with_logger(mut self, logger: Arc<dyn TriageLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace one of the built-in stages.
    pub fn with_stage(mut self, kind: StageKind, stage: Arc<dyn Stage>) -> Self {
        match kind {
            StageKind::Diagnostics => self.diagnostics = Some(stage),
            StageKind::Analysis => self.analysis = Some(stage),
            StageKind::Planning => self.planning = Some(stage),
        }
        self
    }

    pub fn build(self) -> CoreResult<TriagePipeline> {
        self.config.validate()?;
        let config = self.config;
        let logger = self.logger;

        let diagnostics = self.diagnostics.unwrap_or_else(|| {
            Arc::new(
                DiagnosticsStage::new(&config.diagnostics_name)
                    .with_receiver(&config.analysis_name)
                    .with_logger(logger.clone()),
            )
        });
        let analysis = self.analysis.unwrap_or_else(|| {
            Arc::new(
                AnalysisStage::new(&config.analysis_name)
                    .with_receiver(&config.planning_name)
                    .with_backend(self.backend)
                    .with_logger(logger.clone()),
            )
        });
        let planning = self.planning.unwrap_or_else(|| {
            Arc::new(
                PlanningStage::new(&config.planning_name, self.tickets)
                    .with_receiver(&config.final_receiver)
                    .with_ticket_summary(&config.ticket_summary)
                    .with_logger(logger.clone()),
            )
        });

        Ok(TriagePipeline {
            config,
            diagnostics,
            analysis,
            planning,
            tracker: self.tracker,
            logger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::analysis::mock_analysis;
    use crate::error::TicketError;
    use crate::logging::MemoryLogger;
    use crate::mock::{RecordingTicketClient, RecordingTracker};
    use crate::planning::REMEDIATION_PLAN;
    use crate::ports::{MockRecurrenceTracker, MockTicketClient};

    /// Stage that always fails.
    struct BrokenStage;

    #[async_trait]
    impl Stage for BrokenStage {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn process(&self, _input: Envelope, _id: &CorrelationId) -> CoreResult<Envelope> {
            Err(CoreError::invalid_content("Broken", "intentional failure"))
        }
    }

    /// Stage that forgets to produce its output key.
    struct ForgetfulStage;

    #[async_trait]
    impl Stage for ForgetfulStage {
        fn name(&self) -> &str {
            "Forgetful"
        }

        async fn process(&self, _input: Envelope, _id: &CorrelationId) -> CoreResult<Envelope> {
            Envelope::new("Forgetful", "ActionPlanner", serde_json::json!({}))
        }
    }

    /// Stage that declares an output key it never writes.
    struct UnkeptPromiseStage;

    #[async_trait]
    impl Stage for UnkeptPromiseStage {
        fn name(&self) -> &str {
            "UnkeptPromise"
        }

        fn produces(&self) -> &'static [&'static str] {
            &[keys::ANALYSIS]
        }

        async fn process(&self, _input: Envelope, _id: &CorrelationId) -> CoreResult<Envelope> {
            Envelope::new("UnkeptPromise", "ActionPlanner", serde_json::json!({}))
        }
    }

    /// Stage that requires a key nobody produces and counts its invocations.
    #[derive(Clone, Default)]
    struct DemandingStage {
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Stage for DemandingStage {
        fn name(&self) -> &str {
            "Demanding"
        }

        fn requires(&self) -> &'static [&'static str] {
            &["build_number"]
        }

        async fn process(&self, input: Envelope, _id: &CorrelationId) -> CoreResult<Envelope> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(input)
        }
    }

    fn pipeline_with(tickets: RecordingTicketClient, tracker: RecordingTracker) -> TriagePipeline {
        TriagePipeline::builder(Arc::new(tickets))
            .with_tracker(Arc::new(tracker))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_path_states() {
        let pipeline = pipeline_with(RecordingTicketClient::new(), RecordingTracker::new());
        let run = pipeline.execute("[ERROR] test_login FAILED").await;

        assert_eq!(
            run.states,
            vec![
                RunState::Start,
                RunState::Diagnosed,
                RunState::Analyzed,
                RunState::Planned,
                RunState::Done
            ]
        );
        assert_eq!(run.final_state(), RunState::Done);
        assert!(run.failed_stage.is_none());
        assert!(run.duration_ms() >= 0);
    }

    #[tokio::test]
    async fn test_success_aggregation() {
        let tickets = RecordingTicketClient::new();
        let pipeline = pipeline_with(tickets.clone(), RecordingTracker::new());

        let result = pipeline
            .run("[INFO] ok\n[ERROR] test_login FAILED\n[INFO] done")
            .await;
        let failed = vec!["[ERROR] test_login FAILED".to_string()];

        assert_eq!(
            result,
            PipelineResult::success(
                failed.clone(),
                mock_analysis(&failed),
                REMEDIATION_PLAN,
                "TEST-1",
                0.85
            )
        );
        assert_eq!(tickets.calls()[0].description, mock_analysis(&failed));
    }

    #[tokio::test]
    async fn test_ticketing_failure_aborts_run() {
        let tickets =
            RecordingTicketClient::new().simulate_failure(TicketError::Rejected("no project".into()));
        let tracker = RecordingTracker::new();
        let pipeline = pipeline_with(tickets, tracker.clone());

        let run = pipeline.execute("[ERROR] test_login FAILED").await;

        assert_eq!(
            run.states,
            vec![
                RunState::Start,
                RunState::Diagnosed,
                RunState::Analyzed,
                RunState::Failed
            ]
        );
        assert_eq!(run.failed_stage, Some(StageKind::Planning));
        assert_eq!(run.result.confidence(), 0.0);
        assert!(run.result.error_message().unwrap().contains("no project"));
        assert_eq!(tracker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_first_stage_skips_the_rest() {
        let mut tickets = MockTicketClient::new();
        tickets.expect_create_ticket().never();
        let mut tracker = MockRecurrenceTracker::new();
        tracker.expect_increment().never();

        let pipeline = TriagePipeline::builder(Arc::new(tickets))
            .with_tracker(Arc::new(tracker))
            .with_stage(StageKind::Diagnostics, Arc::new(BrokenStage))
            .build()
            .unwrap();

        let run = pipeline.execute("FAIL").await;

        assert_eq!(run.states, vec![RunState::Start, RunState::Failed]);
        assert_eq!(run.failed_stage, Some(StageKind::Diagnostics));
        assert!(!run.result.is_success());
    }

    #[tokio::test]
    async fn test_stage_output_missing_key_is_an_error() {
        let pipeline = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_stage(StageKind::Analysis, Arc::new(ForgetfulStage))
            .build()
            .unwrap();

        let run = pipeline.execute("FAIL").await;

        assert_eq!(run.failed_stage, Some(StageKind::Analysis));
        assert_eq!(run.final_state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_declared_output_key_is_enforced() {
        let mut tickets = MockTicketClient::new();
        tickets.expect_create_ticket().never();

        let pipeline = TriagePipeline::builder(Arc::new(tickets))
            .with_stage(StageKind::Analysis, Arc::new(UnkeptPromiseStage))
            .build()
            .unwrap();

        let run = pipeline.execute("x FAIL").await;

        assert_eq!(
            run.states,
            vec![RunState::Start, RunState::Diagnosed, RunState::Failed]
        );
        assert_eq!(run.failed_stage, Some(StageKind::Analysis));
        assert_eq!(
            run.result.error_message(),
            Some("Stage UnkeptPromise expected content key 'analysis'")
        );
    }

    #[tokio::test]
    async fn test_declared_input_key_is_enforced() {
        let stage = DemandingStage::default();
        let pipeline = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_stage(StageKind::Planning, Arc::new(stage.clone()))
            .build()
            .unwrap();

        let run = pipeline.execute("x FAIL").await;

        assert_eq!(run.failed_stage, Some(StageKind::Planning));
        assert_eq!(run.final_state(), RunState::Failed);
        assert_eq!(stage.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builtin_stages_declare_their_keys() {
        let pipeline = pipeline_with(RecordingTicketClient::new(), RecordingTracker::new());

        assert_eq!(
            pipeline.stage(StageKind::Diagnostics).produces(),
            &[keys::FAILED_TESTS]
        );
        assert_eq!(
            pipeline.stage(StageKind::Analysis).requires(),
            &[keys::FAILED_TESTS]
        );
        assert_eq!(pipeline.stage(StageKind::Planning).produces(), &[keys::PLAN, keys::TICKET]);
    }

    #[tokio::test]
    async fn test_tracker_called_once_per_entry() {
        let mut tracker = MockRecurrenceTracker::new();
        tracker
            .expect_increment()
            .times(3)
            .returning(|_| Ok(()));

        let pipeline = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_tracker(Arc::new(tracker))
            .build()
            .unwrap();

        let result = pipeline.run("a FAIL\nok\nb FAIL\na FAIL").await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_tracker_failure_is_logged_not_fatal() {
        let logger = MemoryLogger::new();
        let tracker = RecordingTracker::new().failing();
        let pipeline = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_tracker(Arc::new(tracker.clone()))
            .with_logger(Arc::new(logger.clone()))
            .build()
            .unwrap();

        let result = pipeline.run("x FAIL\ny FAIL").await;

        assert!(result.is_success());
        assert_eq!(tracker.call_count(), 2);
        assert_eq!(logger.at_level(LogLevel::Warn).len(), 2);
    }

    #[tokio::test]
    async fn test_logs_share_one_correlation_id() {
        let logger = MemoryLogger::new();
        let pipeline = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_logger(Arc::new(logger.clone()))
            .build()
            .unwrap();

        let first = pipeline.execute("a FAIL").await;
        let second = pipeline.execute("b FAIL").await;

        assert_ne!(first.correlation_id, second.correlation_id);
        let sources: Vec<String> = logger
            .for_run(&first.correlation_id)
            .into_iter()
            .map(|r| r.source)
            .collect();
        assert!(sources.iter().any(|s| s == "Diagnostics"));
        assert!(sources.iter().any(|s| s == "RootCause"));
        assert!(sources.iter().any(|s| s == "ActionPlanner"));
        assert!(sources.iter().any(|s| s == DRIVER_SOURCE));
    }

    #[tokio::test]
    async fn test_custom_config_flows_into_stages() {
        let tickets = RecordingTicketClient::new();
        let config = PipelineConfig {
            ticket_summary: "Nightly".to_string(),
            confidence: 0.6,
            ..PipelineConfig::default()
        };
        let pipeline = TriagePipeline::builder(Arc::new(tickets.clone()))
            .with_config(config)
            .build()
            .unwrap();

        let result = pipeline.run("").await;

        assert_eq!(result.confidence(), 0.6);
        assert_eq!(tickets.calls()[0].summary, "Nightly");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            confidence: -1.0,
            ..PipelineConfig::default()
        };
        let built = TriagePipeline::builder(Arc::new(RecordingTicketClient::new()))
            .with_config(config)
            .build();
        assert!(built.is_err());
    }
}
