use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MarshalError, Result};
use crate::types::ConfirmationMode;

/// Top-level configuration for the Marshal pipeline.
///
/// Loaded from `~/.marshal/config.toml` by default. Security defaults are
/// locked down: confirmation mode `all`, kill switch enabled, and the full
/// blocked-target and blocked-command lists active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarshalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
}

impl MarshalConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MarshalConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MarshalError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the journal, pattern, and workflow documents.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.marshal/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Security settings — secure by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// How actions are routed for confirmation. Default: every action.
    pub confirmation_mode: ConfirmationMode,
    /// Whether the kill-switch listener should be registered at all.
    pub kill_switch_enabled: bool,
    /// Hotkey the external listener binds for the kill switch.
    pub kill_switch_hotkey: String,
    /// Applications the pipeline will never touch.
    pub blocked_targets: Vec<String>,
    /// Shell command fragments that are always denied.
    pub blocked_commands: Vec<String>,
    /// Ceiling for admitted actions within the trailing 60-second window.
    pub max_actions_per_minute: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            confirmation_mode: ConfirmationMode::All,
            kill_switch_enabled: true,
            kill_switch_hotkey: "ctrl+shift+escape".to_string(),
            blocked_targets: vec![
                // Banking & finance
                "chase",
                "bankofamerica",
                "wellsfargo",
                "citi",
                "capital one",
                "paypal",
                "venmo",
                "zelle",
                "cashapp",
                "coinbase",
                "robinhood",
                // Password managers
                "1password",
                "lastpass",
                "bitwarden",
                "keepass",
                "dashlane",
                // Security & auth
                "authenticator",
                "authy",
                "yubikey",
                // System security
                "windows security",
                "defender",
                "firewall",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_commands: vec![
                "format",
                "del /f",
                "del /s",
                "rmdir /s",
                "rm -rf",
                "shutdown",
                "restart",
                "reg delete",
                "bcdedit",
                "cipher /w",
                "diskpart",
                "net user",
                "net localgroup",
                "netsh",
                "powershell -encodedcommand",
                "powershell -enc",
                "set-executionpolicy",
                "new-service",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_actions_per_minute: 30,
        }
    }
}

/// Automation behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Upper bound for any single OS-facing call in the escalation engine.
    pub ui_timeout_ms: u64,
    /// Prefer silent (non-input-simulating) methods when a tool offers both.
    pub prefer_silent_methods: bool,
    /// Default ranked-candidate count returned by the escalation engine.
    pub max_find_results: usize,
    /// Depth limit for structural tree traversal.
    pub max_tree_depth: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            ui_timeout_ms: 500,
            prefer_silent_methods: true,
            max_find_results: 5,
            max_tree_depth: 5,
        }
    }
}
