//! Error taxonomy for the action pipeline.
//!
//! Policy and escalation failures are structured outcomes with a stable
//! machine-readable code plus a human-readable message, so a dispatch
//! layer can always explain a refusal without exposing internals.

use marshal_core::error::MarshalError;
use serde::{Deserialize, Serialize};

/// Machine-readable reason a gate denied an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    KillSwitch,
    BlockMode,
    BlockedTarget,
    BlockedCommand,
    RateLimited,
    ConfirmationRefused,
}

impl DenyReason {
    /// Stable wire code for callers and audit records.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::KillSwitch => "kill_switch",
            DenyReason::BlockMode => "block_mode",
            DenyReason::BlockedTarget => "blocked_target",
            DenyReason::BlockedCommand => "blocked_command",
            DenyReason::RateLimited => "rate_limited",
            DenyReason::ConfirmationRefused => "confirmation_refused",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors surfaced by the pipeline to its dispatch layer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Terminal: the policy gate refused the action. Never retried.
    #[error("Action denied by policy ({code}): {message}")]
    PolicyDenied { code: DenyReason, message: String },

    /// Escalation exhausted every tier without a usable candidate.
    /// Distinct from an execution error; the caller may retry with a
    /// different query or a wider scope.
    #[error("'{query}' not found after {tiers_tried} escalation tiers")]
    NotFound { query: String, tiers_tried: usize },

    /// The chosen method raised during actuation.
    #[error("Execution failed via {method}: {message}")]
    ExecutionFailed { method: String, message: String },

    /// A journal/pattern/workflow write did not reach disk. The in-memory
    /// decision still stands; the write is retried on the next mutation.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error(transparent)]
    Core(#[from] MarshalError),
}

/// Errors from workflow recording and replay state management.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Already recording workflow '{0}'; stop it first")]
    AlreadyRecording(String),
    #[error("Not currently recording any workflow")]
    NotRecording,
    #[error("Workflow not found: {0}")]
    NotFound(String),
}
