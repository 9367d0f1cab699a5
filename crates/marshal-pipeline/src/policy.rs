//! Policy gate: the safety checks every action passes before execution.
//!
//! Check order is fixed: kill switch, block mode, blocked targets, blocked
//! commands, rate limit, confirmation routing. A denial at any check is
//! terminal for that action — the gate never retries on the caller's
//! behalf. All state lives behind one mutex so the rate limiter's
//! check-and-insert is atomic under concurrent admission checks, and so a
//! background kill-switch listener can flip state mid-flight through the
//! same lock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use marshal_core::config::SecurityConfig;
use marshal_core::types::{Action, ConfirmationMode};

use crate::error::DenyReason;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Parameter keys that may carry a window/application identity.
const TARGET_PARAM_KEYS: &[&str] = &["window_title", "app_name", "process_name", "title", "name"];

/// Tools that always require confirmation in `sensitive` mode.
const SENSITIVE_TOOLS: &[&str] = &[
    "run_command",
    "open_application",
    "manage_window",
    "type_text",
    "clipboard",
    "run_app_script",
    "schedule_task",
    "watch_folder",
    "workflow_run",
];

/// Parameter keys whose values are bulk payloads, kept out of the audit
/// trail.
const AUDIT_EXCLUDED_KEYS: &[&str] = &["image", "image_data", "screenshot", "data"];

/// Verbs embedded in a tool name that mark it sensitive.
const SENSITIVE_VERBS: &[&str] = &[
    "close", "delete", "remove", "kill", "terminate", "write", "paste", "send",
];

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Admitted; the action's timestamp is already in the rate window.
    Allow,
    /// Refused, with a stable code and a caller-facing explanation.
    Deny { code: DenyReason, message: String },
    /// The caller must obtain external approval, then call
    /// [`PolicyGate::admit_confirmed`].
    RequireConfirmation,
}

impl GateDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// One line of the in-memory audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub target: String,
    /// The action's parameters, minus bulk payload keys.
    pub params: serde_json::Map<String, serde_json::Value>,
    pub approved: bool,
    pub result: String,
    pub reason: Option<String>,
}

/// Snapshot of the gate's observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    pub kill_switch_engaged: bool,
    pub confirmation_mode: ConfirmationMode,
    pub actions_in_window: usize,
    pub max_actions_per_minute: usize,
    pub blocked_targets: usize,
    pub blocked_commands: usize,
    pub total_actions_logged: usize,
}

struct PolicyState {
    kill_switch_engaged: bool,
    confirmation_mode: ConfirmationMode,
    blocked_targets: Vec<String>,
    blocked_commands: Vec<String>,
    rate_window: VecDeque<Instant>,
    audit: Vec<AuditRecord>,
}

/// Process-wide policy enforcement. Constructed once and injected.
pub struct PolicyGate {
    state: Mutex<PolicyState>,
    max_per_minute: usize,
}

impl PolicyGate {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            state: Mutex::new(PolicyState {
                kill_switch_engaged: false,
                confirmation_mode: config.confirmation_mode,
                blocked_targets: config.blocked_targets.clone(),
                blocked_commands: config.blocked_commands.clone(),
                rate_window: VecDeque::new(),
                audit: Vec::new(),
            }),
            max_per_minute: config.max_actions_per_minute,
        }
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Run every policy check against `action`.
    ///
    /// On `Allow` the action's timestamp is inserted into the rate window
    /// atomically with the check. `RequireConfirmation` does not insert;
    /// the caller admits via [`admit_confirmed`](Self::admit_confirmed)
    /// after approval.
    pub fn evaluate(&self, action: &Action) -> GateDecision {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();

        // 1. Kill switch — before any other check.
        if state.kill_switch_engaged {
            let message = "Kill switch is active; reset it to resume automation".to_string();
            Self::audit(&mut state, action, false, "killed", Some(message.as_str()));
            error!("KILLED: {}.{}", action.tool, action.target);
            return GateDecision::Deny {
                code: DenyReason::KillSwitch,
                message,
            };
        }

        // 2. Block mode — all automation disabled.
        if state.confirmation_mode == ConfirmationMode::Block {
            let message =
                "Block mode active — all automation is disabled. Change the confirmation \
                 mode to 'all', 'sensitive', or 'autonomous' to allow actions."
                    .to_string();
            Self::audit(&mut state, action, false, "blocked", Some(message.as_str()));
            warn!("BLOCKED (block mode): {}", action.tool);
            return GateDecision::Deny {
                code: DenyReason::BlockMode,
                message,
            };
        }

        // 3. Blocked targets.
        if let Some(blocked) = Self::match_blocked_target(&state, action) {
            let message = format!(
                "'{}' is a protected application; automation never touches it",
                blocked
            );
            Self::audit(&mut state, action, false, "blocked", Some(message.as_str()));
            warn!("BLOCKED target: {} ({})", action.target, blocked);
            return GateDecision::Deny {
                code: DenyReason::BlockedTarget,
                message,
            };
        }

        // 4. Blocked commands.
        if let Some(blocked) = Self::match_blocked_command(&state, action) {
            let message = format!("'{}' is a destructive command and is not allowed", blocked);
            Self::audit(&mut state, action, false, "blocked", Some(message.as_str()));
            warn!("BLOCKED command: {}", blocked);
            return GateDecision::Deny {
                code: DenyReason::BlockedCommand,
                message,
            };
        }

        // 5. Rate limit — check and insert under the same lock.
        Self::prune_window(&mut state.rate_window, now);
        if state.rate_window.len() >= self.max_per_minute {
            let message = format!(
                "Maximum {} actions per minute exceeded; wait a moment",
                self.max_per_minute
            );
            Self::audit(&mut state, action, false, "blocked", Some(message.as_str()));
            warn!("RATE LIMITED: {}", action.tool);
            return GateDecision::Deny {
                code: DenyReason::RateLimited,
                message,
            };
        }

        // 6. Confirmation routing.
        let needs_confirmation = match state.confirmation_mode {
            ConfirmationMode::All => true,
            ConfirmationMode::Sensitive => Self::is_sensitive(&action.tool),
            ConfirmationMode::Autonomous => false,
            ConfirmationMode::Block => unreachable!("handled above"),
        };
        if needs_confirmation {
            Self::audit(
                &mut state,
                action,
                true,
                "confirmation",
                Some("routed to external approval"),
            );
            return GateDecision::RequireConfirmation;
        }

        state.rate_window.push_back(now);
        Self::audit(&mut state, action, true, "success", None);
        debug!("OK: {}.{}", action.tool, action.target);
        GateDecision::Allow
    }

    /// Admit an action after external approval.
    ///
    /// Conditions may have changed while the user was deciding, so the kill
    /// switch and the rate ceiling are re-checked atomically here.
    pub fn admit_confirmed(&self, action: &Action) -> GateDecision {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();

        if state.kill_switch_engaged {
            let message = "Kill switch engaged while awaiting confirmation".to_string();
            Self::audit(&mut state, action, false, "killed", Some(message.as_str()));
            return GateDecision::Deny {
                code: DenyReason::KillSwitch,
                message,
            };
        }

        Self::prune_window(&mut state.rate_window, now);
        if state.rate_window.len() >= self.max_per_minute {
            let message = format!(
                "Maximum {} actions per minute exceeded; wait a moment",
                self.max_per_minute
            );
            Self::audit(&mut state, action, false, "blocked", Some(message.as_str()));
            return GateDecision::Deny {
                code: DenyReason::RateLimited,
                message,
            };
        }

        state.rate_window.push_back(now);
        Self::audit(&mut state, action, true, "success", None);
        GateDecision::Allow
    }

    // =========================================================================
    // Matching helpers
    // =========================================================================

    fn match_blocked_target(state: &PolicyState, action: &Action) -> Option<String> {
        let mut values: Vec<String> = vec![action.target.clone()];
        for key in TARGET_PARAM_KEYS {
            if let Some(value) = action.param_str(key) {
                if !value.is_empty() {
                    values.push(value.to_string());
                }
            }
        }

        for value in &values {
            for blocked in &state.blocked_targets {
                if token_match(value, blocked) {
                    return Some(blocked.clone());
                }
            }
        }
        None
    }

    fn match_blocked_command(state: &PolicyState, action: &Action) -> Option<String> {
        let command = action.param_str("command")?.trim().to_lowercase();
        if command.is_empty() {
            return None;
        }
        state
            .blocked_commands
            .iter()
            .find(|blocked| command.contains(&blocked.to_lowercase()))
            .cloned()
    }

    fn is_sensitive(tool: &str) -> bool {
        if SENSITIVE_TOOLS.contains(&tool) {
            return true;
        }
        let tool_lower = tool.to_lowercase();
        SENSITIVE_VERBS.iter().any(|v| tool_lower.contains(v))
    }

    fn prune_window(window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= RATE_WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    fn audit(
        state: &mut PolicyState,
        action: &Action,
        approved: bool,
        result: &str,
        reason: Option<&str>,
    ) {
        let params = action
            .parameters
            .iter()
            .filter(|(key, _)| !AUDIT_EXCLUDED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        state.audit.push(AuditRecord {
            timestamp: Utc::now(),
            tool: action.tool.clone(),
            target: action.target.clone(),
            params,
            approved,
            result: result.to_string(),
            reason: reason.map(String::from),
        });
    }

    // =========================================================================
    // State transitions (kill-switch listener, operators)
    // =========================================================================

    pub fn is_killed(&self) -> bool {
        self.state.lock().unwrap().kill_switch_engaged
    }

    /// Stop all automation immediately.
    pub fn engage_kill_switch(&self) {
        self.state.lock().unwrap().kill_switch_engaged = true;
        error!("KILL SWITCH ENGAGED — all automation stopped");
    }

    /// Allow automation to resume.
    pub fn reset_kill_switch(&self) {
        self.state.lock().unwrap().kill_switch_engaged = false;
        info!("Kill switch reset — automation can resume");
    }

    pub fn confirmation_mode(&self) -> ConfirmationMode {
        self.state.lock().unwrap().confirmation_mode
    }

    pub fn set_confirmation_mode(&self, mode: ConfirmationMode) {
        self.state.lock().unwrap().confirmation_mode = mode;
        info!("Confirmation mode set to {}", mode);
    }

    /// Add a target to the blocked list at runtime. No-op if present.
    pub fn block_target(&self, target: &str) {
        let mut state = self.state.lock().unwrap();
        let target = target.to_lowercase();
        if !state.blocked_targets.contains(&target) {
            state.blocked_targets.push(target);
        }
    }

    /// Remove a runtime-blocked target. Returns whether it was present.
    pub fn unblock_target(&self, target: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let target = target.to_lowercase();
        let before = state.blocked_targets.len();
        state.blocked_targets.retain(|t| *t != target);
        state.blocked_targets.len() != before
    }

    /// The most recent `n` audit records, newest last.
    pub fn recent_audit(&self, n: usize) -> Vec<AuditRecord> {
        let state = self.state.lock().unwrap();
        let start = state.audit.len().saturating_sub(n);
        state.audit[start..].to_vec()
    }

    pub fn status(&self) -> GateStatus {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        Self::prune_window(&mut state.rate_window, now);
        GateStatus {
            kill_switch_engaged: state.kill_switch_engaged,
            confirmation_mode: state.confirmation_mode,
            actions_in_window: state.rate_window.len(),
            max_actions_per_minute: self.max_per_minute,
            blocked_targets: state.blocked_targets.len(),
            blocked_commands: state.blocked_commands.len(),
            total_actions_logged: state.audit.len(),
        }
    }
}

/// Whole-token match of `blocked` within `value`, case-insensitive.
///
/// Both sides are split on non-alphanumeric boundaries and the blocked
/// entry's token sequence must appear contiguously, so a blocked "file"
/// never matches "profile" while "windows security" still matches
/// "Windows Security — Settings".
fn token_match(value: &str, blocked: &str) -> bool {
    let value_tokens = tokenize(value);
    let blocked_tokens = tokenize(blocked);
    if blocked_tokens.is_empty() || value_tokens.len() < blocked_tokens.len() {
        return false;
    }
    value_tokens
        .windows(blocked_tokens.len())
        .any(|w| w == blocked_tokens.as_slice())
}

fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn gate_with(f: impl FnOnce(&mut SecurityConfig)) -> PolicyGate {
        let mut config = SecurityConfig {
            confirmation_mode: ConfirmationMode::Autonomous,
            ..SecurityConfig::default()
        };
        f(&mut config);
        PolicyGate::new(&config)
    }

    fn autonomous_gate() -> PolicyGate {
        gate_with(|_| {})
    }

    fn action(tool: &str, target: &str) -> Action {
        Action::new(tool, target, Map::new())
    }

    fn command_action(command: &str) -> Action {
        let mut params = Map::new();
        params.insert(
            "command".to_string(),
            Value::String(command.to_string()),
        );
        Action::new("run_command", "shell", params)
    }

    // -- Kill switch --

    #[test]
    fn test_kill_switch_denies_everything() {
        let gate = autonomous_gate();
        gate.engage_kill_switch();
        let decision = gate.evaluate(&action("click", "Notepad"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::KillSwitch,
                ..
            }
        ));
    }

    #[test]
    fn test_kill_switch_checked_before_other_denials() {
        // A blocked target would normally fire, but the kill switch wins.
        let gate = autonomous_gate();
        gate.engage_kill_switch();
        let decision = gate.evaluate(&action("click", "paypal"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::KillSwitch,
                ..
            }
        ));
    }

    #[test]
    fn test_kill_switch_reset_restores_admission() {
        let gate = autonomous_gate();
        gate.engage_kill_switch();
        assert!(gate.is_killed());
        gate.reset_kill_switch();
        assert!(!gate.is_killed());
        assert!(gate.evaluate(&action("click", "Notepad")).is_allow());
    }

    // -- Block mode --

    #[test]
    fn test_block_mode_denies_all() {
        let gate = autonomous_gate();
        gate.set_confirmation_mode(ConfirmationMode::Block);
        let decision = gate.evaluate(&action("click", "Notepad"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockMode,
                ..
            }
        ));
    }

    // -- Blocked targets --

    #[test]
    fn test_blocked_target_denied() {
        let gate = autonomous_gate();
        let decision = gate.evaluate(&action("click", "PayPal - Checkout"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockedTarget,
                ..
            }
        ));
    }

    #[test]
    fn test_blocked_target_matches_params_too() {
        let gate = autonomous_gate();
        let mut params = Map::new();
        params.insert(
            "window_title".to_string(),
            Value::String("1Password - Vault".to_string()),
        );
        let decision = gate.evaluate(&Action::new("click", "browser", params));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockedTarget,
                ..
            }
        ));
    }

    #[test]
    fn test_blocked_token_does_not_match_superstring() {
        // Blocked "file" must not match target "profile".
        let gate = gate_with(|c| c.blocked_targets = vec!["file".to_string()]);
        assert!(gate.evaluate(&action("click", "profile")).is_allow());
        assert!(matches!(
            gate.evaluate(&action("click", "file manager")),
            GateDecision::Deny {
                code: DenyReason::BlockedTarget,
                ..
            }
        ));
    }

    #[test]
    fn test_multiword_blocked_target() {
        let gate = autonomous_gate();
        let decision = gate.evaluate(&action("click", "Windows Security — Settings"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockedTarget,
                ..
            }
        ));
    }

    #[test]
    fn test_block_and_unblock_target_at_runtime() {
        let gate = autonomous_gate();
        assert!(gate.evaluate(&action("click", "mytool")).is_allow());
        gate.block_target("mytool");
        assert!(!gate.evaluate(&action("click", "mytool")).is_allow());
        assert!(gate.unblock_target("mytool"));
        assert!(!gate.unblock_target("mytool"));
        assert!(gate.evaluate(&action("click", "mytool")).is_allow());
    }

    // -- Blocked commands --

    #[test]
    fn test_blocked_command_denied() {
        let gate = autonomous_gate();
        let decision = gate.evaluate(&command_action("rm -rf /"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockedCommand,
                ..
            }
        ));
    }

    #[test]
    fn test_blocked_command_case_insensitive() {
        let gate = autonomous_gate();
        let decision = gate.evaluate(&command_action("SHUTDOWN /s /t 0"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::BlockedCommand,
                ..
            }
        ));
    }

    #[test]
    fn test_benign_command_allowed() {
        let gate = autonomous_gate();
        assert!(gate.evaluate(&command_action("dir C:\\")).is_allow());
    }

    #[test]
    fn test_no_command_param_skips_command_check() {
        let gate = autonomous_gate();
        assert!(gate.evaluate(&action("click", "Notepad")).is_allow());
    }

    // -- Rate limiting --

    #[test]
    fn test_rate_limit_admits_exactly_n() {
        let gate = gate_with(|c| c.max_actions_per_minute = 5);
        for _ in 0..5 {
            assert!(gate.evaluate(&action("click", "Notepad")).is_allow());
        }
        let decision = gate.evaluate(&action("click", "Notepad"));
        assert!(matches!(
            decision,
            GateDecision::Deny {
                code: DenyReason::RateLimited,
                ..
            }
        ));
    }

    #[test]
    fn test_denied_actions_do_not_consume_rate_budget() {
        let gate = gate_with(|c| {
            c.max_actions_per_minute = 3;
            c.blocked_targets = vec!["vault".to_string()];
        });
        for _ in 0..10 {
            let _ = gate.evaluate(&action("click", "vault"));
        }
        // Budget is untouched; three admissions still fit.
        for _ in 0..3 {
            assert!(gate.evaluate(&action("click", "Notepad")).is_allow());
        }
    }

    #[test]
    fn test_rate_check_and_insert_is_atomic_under_contention() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let gate = Arc::new(gate_with(|c| c.max_actions_per_minute = 10));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if gate.evaluate(&action("click", "Notepad")).is_allow() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 10);
    }

    // -- Confirmation routing --

    #[test]
    fn test_mode_all_requires_confirmation() {
        let gate = gate_with(|c| c.confirmation_mode = ConfirmationMode::All);
        assert_eq!(
            gate.evaluate(&action("read_screen", "Notepad")),
            GateDecision::RequireConfirmation
        );
    }

    #[test]
    fn test_mode_sensitive_routes_only_sensitive_tools() {
        let gate = gate_with(|c| c.confirmation_mode = ConfirmationMode::Sensitive);
        assert_eq!(
            gate.evaluate(&action("type_text", "Notepad")),
            GateDecision::RequireConfirmation
        );
        assert_eq!(
            gate.evaluate(&action("close_window", "Notepad")),
            GateDecision::RequireConfirmation
        );
        assert!(gate.evaluate(&action("read_screen", "Notepad")).is_allow());
    }

    #[test]
    fn test_autonomous_mode_skips_confirmation() {
        let gate = autonomous_gate();
        assert!(gate.evaluate(&action("type_text", "Notepad")).is_allow());
    }

    #[test]
    fn test_require_confirmation_does_not_insert_into_window() {
        let gate = gate_with(|c| {
            c.confirmation_mode = ConfirmationMode::All;
            c.max_actions_per_minute = 2;
        });
        for _ in 0..5 {
            assert_eq!(
                gate.evaluate(&action("click", "Notepad")),
                GateDecision::RequireConfirmation
            );
        }
        assert_eq!(gate.status().actions_in_window, 0);
    }

    #[test]
    fn test_admit_confirmed_inserts_and_rate_limits() {
        let gate = gate_with(|c| {
            c.confirmation_mode = ConfirmationMode::All;
            c.max_actions_per_minute = 2;
        });
        let a = action("click", "Notepad");
        assert_eq!(gate.evaluate(&a), GateDecision::RequireConfirmation);
        assert!(gate.admit_confirmed(&a).is_allow());
        assert!(gate.admit_confirmed(&a).is_allow());
        assert!(matches!(
            gate.admit_confirmed(&a),
            GateDecision::Deny {
                code: DenyReason::RateLimited,
                ..
            }
        ));
    }

    #[test]
    fn test_admit_confirmed_respects_kill_switch() {
        let gate = gate_with(|c| c.confirmation_mode = ConfirmationMode::All);
        let a = action("click", "Notepad");
        assert_eq!(gate.evaluate(&a), GateDecision::RequireConfirmation);
        gate.engage_kill_switch();
        assert!(matches!(
            gate.admit_confirmed(&a),
            GateDecision::Deny {
                code: DenyReason::KillSwitch,
                ..
            }
        ));
    }

    // -- Audit trail and status --

    #[test]
    fn test_audit_records_denials_and_admissions() {
        let gate = autonomous_gate();
        let _ = gate.evaluate(&action("click", "Notepad"));
        let _ = gate.evaluate(&action("click", "paypal"));

        let audit = gate.recent_audit(10);
        assert_eq!(audit.len(), 2);
        assert!(audit[0].approved);
        assert_eq!(audit[0].result, "success");
        assert!(!audit[1].approved);
        assert_eq!(audit[1].result, "blocked");
        assert!(audit[1].reason.is_some());
    }

    #[test]
    fn test_audit_keeps_params_minus_payload_keys() {
        let gate = autonomous_gate();
        let mut params = Map::new();
        params.insert("text".to_string(), Value::String("hello".to_string()));
        params.insert(
            "screenshot".to_string(),
            Value::String("aGVsbG8=".repeat(100)),
        );
        let _ = gate.evaluate(&Action::new("type_text", "Notepad", params));

        let audit = gate.recent_audit(1);
        assert_eq!(
            audit[0].params.get("text"),
            Some(&Value::String("hello".to_string()))
        );
        assert!(audit[0].params.get("screenshot").is_none());
    }

    #[test]
    fn test_recent_audit_returns_tail() {
        let gate = autonomous_gate();
        for i in 0..5 {
            let _ = gate.evaluate(&action("click", &format!("win{i}")));
        }
        let audit = gate.recent_audit(2);
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[1].target, "win4");
    }

    #[test]
    fn test_status_snapshot() {
        let gate = autonomous_gate();
        let _ = gate.evaluate(&action("click", "Notepad"));
        let status = gate.status();
        assert!(!status.kill_switch_engaged);
        assert_eq!(status.confirmation_mode, ConfirmationMode::Autonomous);
        assert_eq!(status.actions_in_window, 1);
        assert_eq!(status.max_actions_per_minute, 30);
        assert_eq!(status.total_actions_logged, 1);
    }

    // -- Token matching --

    #[test]
    fn test_token_match_basics() {
        assert!(token_match("My PayPal Window", "paypal"));
        assert!(token_match("Windows Security", "windows security"));
        assert!(!token_match("profile", "file"));
        assert!(!token_match("prof ile man", "file manager"));
        assert!(!token_match("", "paypal"));
    }

    #[test]
    fn test_token_match_punctuation_boundaries() {
        assert!(token_match("settings/defender/home", "defender"));
        assert!(token_match("keepass.exe", "keepass"));
    }
}
