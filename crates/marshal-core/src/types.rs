use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Confirmation mode governing how the policy gate routes actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Every action requires user confirmation before execution.
    #[default]
    All,
    /// Only sensitive tools require confirmation.
    Sensitive,
    /// No confirmation; actions run as soon as the gate admits them.
    Autonomous,
    /// All automation is disabled; every action is denied.
    Block,
}

impl std::fmt::Display for ConfirmationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfirmationMode::All => "all",
            ConfirmationMode::Sensitive => "sensitive",
            ConfirmationMode::Autonomous => "autonomous",
            ConfirmationMode::Block => "block",
        };
        f.write_str(s)
    }
}

/// Final result of one action's trip through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Failure,
    Blocked,
}

/// One ranked strategy within the escalation engine.
///
/// Tiers are ordered from cheapest to most expensive; the engine never
/// advances to the next tier while an earlier one can still resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodTier {
    /// Accessibility-tree search with fuzzy multi-property matching.
    Structural,
    /// Optical text recognition over the rendered window.
    TextRecognition,
    /// Screenshot handed off to an external vision-capable reasoner.
    Visual,
}

impl MethodTier {
    /// Stable string used to tag method-journal entries.
    pub fn as_method(&self) -> &'static str {
        match self {
            MethodTier::Structural => "structural",
            MethodTier::TextRecognition => "text_recognition",
            MethodTier::Visual => "visual",
        }
    }

    /// Parse a journal method tag back into a tier.
    pub fn from_method(method: &str) -> Option<MethodTier> {
        match method {
            "structural" => Some(MethodTier::Structural),
            "text_recognition" => Some(MethodTier::TextRecognition),
            "visual" => Some(MethodTier::Visual),
            _ => None,
        }
    }

    /// The next, more expensive tier, or `None` at the end of the ladder.
    pub fn next(&self) -> Option<MethodTier> {
        match self {
            MethodTier::Structural => Some(MethodTier::TextRecognition),
            MethodTier::TextRecognition => Some(MethodTier::Visual),
            MethodTier::Visual => None,
        }
    }
}

impl std::fmt::Display for MethodTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_method())
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Canonical application key derived from a raw window title.
///
/// Window titles carry document chrome ("Report.docx - Notepad"); the app
/// key keeps only the trailing application segment, lowercased, so journal
/// entries for the same application line up regardless of open document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppKey(pub String);

impl AppKey {
    pub fn from_window_title(title: &str) -> Self {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Self("unknown".to_string());
        }
        let app = match trimmed.rsplit_once(" - ") {
            Some((_, suffix)) => suffix,
            None => trimmed,
        };
        Self(app.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// OS-level window identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

// =============================================================================
// Entity Structs
// =============================================================================

/// One request to perform an effect on the desktop.
///
/// Every action passes the policy gate before execution, and every executed
/// action (success or failure) is appended exactly once to the stream the
/// pattern detector consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    /// Identifier of the capability requested (e.g. "click", "type_text").
    pub tool: String,
    /// Application/window identity as given by the caller.
    pub target: String,
    pub parameters: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub outcome: Option<ActionOutcome>,
    /// Strategy tier or concrete method that ultimately ran, if any.
    pub method_used: Option<String>,
}

impl Action {
    pub fn new(tool: impl Into<String>, target: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool: tool.into(),
            target: target.into(),
            parameters,
            timestamp: Utc::now(),
            outcome: None,
            method_used: None,
        }
    }

    /// The canonical app key for this action's target.
    pub fn app_key(&self) -> AppKey {
        AppKey::from_window_title(&self.target)
    }

    /// String parameter accessor; absent and non-string values read as `None`.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}
