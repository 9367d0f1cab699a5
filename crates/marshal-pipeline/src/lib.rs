//! Action pipeline for a desktop automation agent.
//!
//! Every action the agent takes flows through one pipeline: the policy
//! gate decides whether it may run at all, the focus ledger protects the
//! user's foreground window around input simulation, the escalation
//! engine resolves UI targets by climbing from structural search to text
//! recognition to a visual hand-off, the method journal remembers which
//! of those methods work where, the pattern detector mines the history
//! for repeatable routines, and the workflow engine records and replays
//! them under the same policy gate.
//!
//! The crate talks to the host OS only through the traits in
//! [`providers`]; nothing here performs real input or capture.

pub mod error;
pub mod escalate;
pub mod focus;
pub mod journal;
pub mod patterns;
pub mod pipeline;
pub mod policy;
pub mod providers;
pub mod workflow;

pub use error::{DenyReason, PipelineError, WorkflowError};
pub use escalate::{EscalationEngine, FindOutcome, Resolution, TierAttempt};
pub use focus::{FocusLedger, FocusToken, RestoreOutcome};
pub use journal::{MethodJournal, MethodRecord};
pub use patterns::{ActionSignature, Pattern, PatternDetector};
pub use pipeline::{ActionPipeline, ToolExecutor};
pub use policy::{AuditRecord, GateDecision, GateStatus, PolicyGate};
pub use workflow::{
    ReplayReport, StepExecutor, StepResult, StepStatus, StopReason, Workflow, WorkflowEngine,
    WorkflowStep, WorkflowSummary,
};
