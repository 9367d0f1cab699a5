//! The action pipeline: the single front door every action goes through.
//!
//! Dispatch order is fixed: policy gate, confirmation if routed there,
//! focus save for input-simulating tools, execution, outcome stamping,
//! then feeding the pattern detector and the workflow recorder. Denied
//! actions still get their outcome stamped so callers can log them, but
//! they never reach the detector or the recorder.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use marshal_core::types::{Action, ActionOutcome};

use crate::error::{DenyReason, PipelineError};
use crate::focus::FocusLedger;
use crate::journal::MethodJournal;
use crate::patterns::PatternDetector;
use crate::policy::{GateDecision, PolicyGate};
use crate::workflow::WorkflowEngine;

/// Host-side executor for admitted actions.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> std::result::Result<Value, String>;

    /// Whether this tool synthesizes keyboard or mouse input, and so
    /// needs the foreground window saved and restored around it.
    fn simulates_input(&self, tool: &str) -> bool;

    /// Ask the user to approve an action the gate routed to confirmation.
    async fn confirm(&self, action: &Action) -> bool;
}

pub struct ActionPipeline {
    gate: Arc<PolicyGate>,
    ledger: Arc<FocusLedger>,
    journal: Arc<MethodJournal>,
    detector: Arc<PatternDetector>,
    workflows: Arc<WorkflowEngine>,
}

impl ActionPipeline {
    pub fn new(
        gate: Arc<PolicyGate>,
        ledger: Arc<FocusLedger>,
        journal: Arc<MethodJournal>,
        detector: Arc<PatternDetector>,
        workflows: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            gate,
            ledger,
            journal,
            detector,
            workflows,
        }
    }

    pub fn gate(&self) -> &Arc<PolicyGate> {
        &self.gate
    }

    pub fn journal(&self) -> &Arc<MethodJournal> {
        &self.journal
    }

    pub fn detector(&self) -> &Arc<PatternDetector> {
        &self.detector
    }

    pub fn workflows(&self) -> &Arc<WorkflowEngine> {
        &self.workflows
    }

    /// Run one action through the full pipeline.
    ///
    /// The action comes back with its outcome stamped either way; the
    /// `Err` cases carry why it was refused or how execution failed.
    pub async fn dispatch(
        &self,
        mut action: Action,
        executor: &dyn ToolExecutor,
    ) -> (Action, std::result::Result<Value, PipelineError>) {
        match self.gate.evaluate(&action) {
            GateDecision::Allow => {}
            GateDecision::Deny { code, message } => {
                action.outcome = Some(ActionOutcome::Blocked);
                return (
                    action,
                    Err(PipelineError::PolicyDenied { code, message }),
                );
            }
            GateDecision::RequireConfirmation => {
                if !executor.confirm(&action).await {
                    info!("confirmation refused: {}", action.tool);
                    action.outcome = Some(ActionOutcome::Blocked);
                    return (
                        action,
                        Err(PipelineError::PolicyDenied {
                            code: DenyReason::ConfirmationRefused,
                            message: "user refused the action".to_string(),
                        }),
                    );
                }
                if let GateDecision::Deny { code, message } = self.gate.admit_confirmed(&action) {
                    action.outcome = Some(ActionOutcome::Blocked);
                    return (
                        action,
                        Err(PipelineError::PolicyDenied { code, message }),
                    );
                }
            }
        }

        let needs_focus_guard =
            executor.simulates_input(&action.tool) && !FocusLedger::is_exempt(&action.tool);

        let result = if needs_focus_guard {
            let _token = self.ledger.save();
            executor.execute(&action).await
            // Focus restored here, even on early error.
        } else {
            executor.execute(&action).await
        };

        match result {
            Ok(value) => {
                action.outcome = Some(ActionOutcome::Success);
                debug!("dispatched: {}.{}", action.tool, action.target);
                self.detector.ingest(&action);
                self.workflows.capture_step(&action, true);
                (action, Ok(value))
            }
            Err(message) => {
                action.outcome = Some(ActionOutcome::Failure);
                // Failures still feed the detector; a retried routine is
                // a routine all the same.
                self.detector.ingest(&action);
                self.workflows.capture_step(&action, false);
                let method = action
                    .method_used
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                (
                    action,
                    Err(PipelineError::ExecutionFailed { method, message }),
                )
            }
        }
    }
}
