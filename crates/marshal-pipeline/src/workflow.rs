//! Workflow engine: record successful action sequences by name and replay
//! them later, step by step, with the policy gate re-applied to every
//! replayed step.
//!
//! Recording is passive: the pipeline feeds it each executed action and
//! the recorder keeps the successful non-meta ones, along with the pause
//! observed before each step so replays keep a human-plausible rhythm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use marshal_core::types::Action;
use marshal_core::Result;
use marshal_store::DocumentStore;

use crate::error::{DenyReason, WorkflowError};
use crate::policy::{GateDecision, PolicyGate};

/// Control-plane tools that never belong inside a recorded workflow.
const META_TOOLS: &[&str] = &[
    "kill_switch",
    "workflow_record",
    "workflow_stop",
    "workflow_run",
    "workflow_list",
    "workflow_delete",
    "get_suggestions",
    "accept_suggestion",
    "dismiss_suggestion",
    "get_capabilities",
    "get_version",
];

const MIN_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub tool: String,
    pub target: String,
    pub parameters: Map<String, Value>,
    /// Pause before this step on replay, clamped to [100, 5000] ms.
    pub delay_before_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    pub created: DateTime<Utc>,
}

/// Compact listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub steps: usize,
    pub created: DateTime<Utc>,
}

/// Executes one replayed step against the host.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Ask the user to approve a step the gate routed to confirmation.
    async fn confirm(&self, step: &WorkflowStep) -> bool;
    async fn execute(&self, step: &WorkflowStep) -> std::result::Result<Value, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Blocked,
    ConfirmationRefused,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub tool: String,
    pub status: StepStatus,
    pub detail: Option<String>,
}

/// Why a replay stopped before its last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    KillSwitch,
    PolicyBlocked,
    ConfirmationRefused,
    StepFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub workflow: String,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub results: Vec<StepResult>,
    pub stopped: Option<StopReason>,
}

enum RecorderState {
    Idle,
    Recording {
        name: String,
        steps: Vec<WorkflowStep>,
        last_step: Instant,
    },
}

pub struct WorkflowEngine {
    store: DocumentStore<Workflow>,
    workflows: Mutex<HashMap<String, Workflow>>,
    recorder: Mutex<RecorderState>,
}

impl WorkflowEngine {
    /// Open the engine, loading saved workflows from `path`.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let store = DocumentStore::new(path);
        let loaded: Vec<Workflow> = store.load()?;
        if !loaded.is_empty() {
            info!("workflow engine loaded: {} workflows", loaded.len());
        }
        let workflows = loaded.into_iter().map(|w| (w.name.clone(), w)).collect();
        Ok(Self {
            store,
            workflows: Mutex::new(workflows),
            recorder: Mutex::new(RecorderState::Idle),
        })
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Start recording under `name`. Recording over an existing name is
    /// allowed; stopping will overwrite it.
    pub fn record(&self, name: &str) -> std::result::Result<(), WorkflowError> {
        let mut recorder = self.recorder.lock().unwrap();
        if let RecorderState::Recording { name: active, .. } = &*recorder {
            return Err(WorkflowError::AlreadyRecording(active.clone()));
        }
        info!("workflow recording started: {name}");
        *recorder = RecorderState::Recording {
            name: name.to_string(),
            steps: Vec::new(),
            last_step: Instant::now(),
        };
        Ok(())
    }

    /// Offer one executed action to the recorder.
    ///
    /// Only successful, non-meta actions become steps; everything else is
    /// ignored without disturbing the recording.
    pub fn capture_step(&self, action: &Action, success: bool) {
        let mut recorder = self.recorder.lock().unwrap();
        let RecorderState::Recording {
            steps, last_step, ..
        } = &mut *recorder
        else {
            return;
        };
        if !success || META_TOOLS.contains(&action.tool.as_str()) {
            return;
        }

        let elapsed_ms = last_step.elapsed().as_millis() as u64;
        *last_step = Instant::now();
        steps.push(WorkflowStep {
            tool: action.tool.clone(),
            target: action.target.clone(),
            parameters: action.parameters.clone(),
            delay_before_ms: elapsed_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS),
        });
        debug!("workflow step captured: {}", action.tool);
    }

    /// Stop recording. An empty recording saves nothing; otherwise the
    /// workflow is stored, replacing any previous workflow of that name.
    pub fn stop(&self) -> std::result::Result<Option<Workflow>, WorkflowError> {
        let mut recorder = self.recorder.lock().unwrap();
        let state = std::mem::replace(&mut *recorder, RecorderState::Idle);
        let RecorderState::Recording { name, steps, .. } = state else {
            return Err(WorkflowError::NotRecording);
        };
        drop(recorder);

        if steps.is_empty() {
            info!("workflow recording discarded: {name} captured no steps");
            return Ok(None);
        }

        let workflow = Workflow {
            name: name.clone(),
            steps,
            created: Utc::now(),
        };
        let mut workflows = self.workflows.lock().unwrap();
        if workflows.insert(name.clone(), workflow.clone()).is_some() {
            info!("workflow overwritten: {name}");
        } else {
            info!("workflow saved: {name} ({} steps)", workflow.steps.len());
        }
        let snapshot: Vec<Workflow> = workflows.values().cloned().collect();
        drop(workflows);
        self.flush(&snapshot);
        Ok(Some(workflow))
    }

    pub fn is_recording(&self) -> bool {
        matches!(*self.recorder.lock().unwrap(), RecorderState::Recording { .. })
    }

    // =========================================================================
    // Replay
    // =========================================================================

    /// Replay `name`, re-checking policy for every step.
    ///
    /// The gate sees each step as a fresh action, so a workflow recorded
    /// under looser policy still honors today's blocks, modes, and rate
    /// ceiling. Any stop condition marks the remaining steps skipped.
    pub async fn run(
        &self,
        name: &str,
        gate: &PolicyGate,
        executor: &dyn StepExecutor,
    ) -> std::result::Result<ReplayReport, WorkflowError> {
        let workflow = self
            .workflows
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(name.to_string()))?;

        info!("workflow replay: {name} ({} steps)", workflow.steps.len());
        let total_steps = workflow.steps.len();
        let mut results = Vec::with_capacity(total_steps);
        let mut completed_steps = 0;
        let mut stopped = None;

        for (index, step) in workflow.steps.iter().enumerate() {
            if stopped.is_some() {
                results.push(StepResult {
                    index,
                    tool: step.tool.clone(),
                    status: StepStatus::Skipped,
                    detail: None,
                });
                continue;
            }

            if gate.is_killed() {
                warn!("workflow {name} stopped at step {index}: kill switch");
                stopped = Some(StopReason::KillSwitch);
                results.push(StepResult {
                    index,
                    tool: step.tool.clone(),
                    status: StepStatus::Skipped,
                    detail: Some("kill switch engaged".to_string()),
                });
                continue;
            }

            let action = Action::new(&step.tool, &step.target, step.parameters.clone());
            match gate.evaluate(&action) {
                GateDecision::Allow => {}
                GateDecision::Deny { code, message } => {
                    warn!("workflow {name} stopped at step {index}: {message}");
                    stopped = Some(match code {
                        DenyReason::KillSwitch => StopReason::KillSwitch,
                        _ => StopReason::PolicyBlocked,
                    });
                    results.push(StepResult {
                        index,
                        tool: step.tool.clone(),
                        status: StepStatus::Blocked,
                        detail: Some(message),
                    });
                    continue;
                }
                GateDecision::RequireConfirmation => {
                    if !executor.confirm(step).await {
                        info!("workflow {name} stopped at step {index}: refused");
                        stopped = Some(StopReason::ConfirmationRefused);
                        results.push(StepResult {
                            index,
                            tool: step.tool.clone(),
                            status: StepStatus::ConfirmationRefused,
                            detail: None,
                        });
                        continue;
                    }
                    if let GateDecision::Deny { code, message } = gate.admit_confirmed(&action) {
                        stopped = Some(match code {
                            DenyReason::KillSwitch => StopReason::KillSwitch,
                            _ => StopReason::PolicyBlocked,
                        });
                        results.push(StepResult {
                            index,
                            tool: step.tool.clone(),
                            status: StepStatus::Blocked,
                            detail: Some(message),
                        });
                        continue;
                    }
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(step.delay_before_ms)).await;

            match executor.execute(step).await {
                Ok(_) => {
                    completed_steps += 1;
                    results.push(StepResult {
                        index,
                        tool: step.tool.clone(),
                        status: StepStatus::Completed,
                        detail: None,
                    });
                }
                Err(message) => {
                    warn!("workflow {name} step {index} failed: {message}");
                    stopped = Some(StopReason::StepFailed);
                    results.push(StepResult {
                        index,
                        tool: step.tool.clone(),
                        status: StepStatus::Failed,
                        detail: Some(message),
                    });
                }
            }
        }

        Ok(ReplayReport {
            workflow: name.to_string(),
            completed_steps,
            total_steps,
            results,
            stopped,
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub fn list(&self) -> Vec<WorkflowSummary> {
        let workflows = self.workflows.lock().unwrap();
        let mut out: Vec<WorkflowSummary> = workflows
            .values()
            .map(|w| WorkflowSummary {
                name: w.name.clone(),
                steps: w.steps.len(),
                created: w.created,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn get(&self, name: &str) -> Option<Workflow> {
        self.workflows.lock().unwrap().get(name).cloned()
    }

    pub fn delete(&self, name: &str) -> std::result::Result<(), WorkflowError> {
        let mut workflows = self.workflows.lock().unwrap();
        if workflows.remove(name).is_none() {
            return Err(WorkflowError::NotFound(name.to_string()));
        }
        let snapshot: Vec<Workflow> = workflows.values().cloned().collect();
        drop(workflows);
        info!("workflow deleted: {name}");
        self.flush(&snapshot);
        Ok(())
    }

    fn flush(&self, snapshot: &[Workflow]) {
        if let Err(err) = self.store.save(snapshot) {
            warn!("workflow store flush failed: {err}");
        }
    }
}
