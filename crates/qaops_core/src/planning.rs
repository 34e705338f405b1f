//! Planning stage: remediation advice plus a tracking ticket.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::envelope::Envelope;
use crate::error::{CoreError, CoreResult};
use crate::logging::{CorrelationId, LogLevel, TracingLogger, TriageLogger};
use crate::ports::TicketClient;
use crate::stage::{keys, Stage, StageKind};

/// Fixed remediation recommendation.
pub const REMEDIATION_PLAN: &str = "Recommended Action: restart failing jobs, or fix test modules.";

/// Default summary label for created tickets.
pub const DEFAULT_TICKET_SUMMARY: &str = "QA Failure";

/// Receiver of the planning stage's envelope: the pipeline driver itself.
pub const DRIVER_RECEIVER: &str = "Driver";

pub struct PlanningStage {
    name: String,
    receiver: String,
    ticket_summary: String,
    tickets: Arc<dyn TicketClient>,
    logger: Arc<dyn TriageLogger>,
}

impl PlanningStage {
    pub fn new(name: impl Into<String>, tickets: Arc<dyn TicketClient>) -> Self {
        Self {
            name: name.into(),
            receiver: DRIVER_RECEIVER.to_string(),
            ticket_summary: DEFAULT_TICKET_SUMMARY.to_string(),
            tickets,
            logger: TracingLogger::shared(),
        }
    }

    /// Create a stage with the default name.
    pub fn with_client(tickets: Arc<dyn TicketClient>) -> Self {
        Self::new(StageKind::Planning.default_name(), tickets)
    }

    pub fn with_ticket_summary(mut self, summary: impl Into<String>) -> Self {
        self.ticket_summary = summary.into();
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
}

#[async_trait]
impl Stage for PlanningStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &'static [&'static str] {
        &[keys::ANALYSIS]
    }

    fn produces(&self) -> &'static [&'static str] {
        &[keys::PLAN, keys::TICKET]
    }

    async fn process(&self, input: Envelope, correlation_id: &CorrelationId) -> CoreResult<Envelope> {
        let analysis = input
            .get_str(keys::ANALYSIS)
            .ok_or_else(|| CoreError::missing_content(&self.name, keys::ANALYSIS))?;

        // Ticketing failures are not recovered here.
        let ticket = self
            .tickets
            .create_ticket(&self.ticket_summary, analysis)
            .await
            .map_err(|source| CoreError::Ticketing {
                stage: self.name.clone(),
                source,
            })?;

        self.logger.log(
            LogLevel::Info,
            &self.name,
            &format!("Remediation plan: {}, Ticket: {}", REMEDIATION_PLAN, ticket),
            correlation_id,
        );

        Envelope::from_fields(
            &self.name,
            &self.receiver,
            [
                (keys::PLAN, json!(REMEDIATION_PLAN)),
                (keys::TICKET, json!(ticket)),
            ],
        )
    }
}
