//! Pattern detector: mine the recent action history for repeated
//! sequences worth offering back to the user as one-shot workflows.
//!
//! Actions are abstracted into signatures before comparison so two runs
//! of the same routine line up even when the typed text differs. Mining
//! slides windows of length 2 through 10 over the buffer and keeps any
//! sequence seen at least three times; trivial two-step repeats of one
//! identical action are discarded as noise.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use marshal_core::types::{Action, ActionOutcome};
use marshal_core::Result;
use marshal_store::DocumentStore;

const BUFFER_CAP: usize = 500;
const MIN_WINDOW: usize = 2;
const MAX_WINDOW: usize = 10;
const MIN_FREQUENCY: usize = 3;

/// One action reduced to its repeatable shape.
///
/// Literal payloads (typed text) are stripped; identity-bearing values
/// (targets, element names, command programs) are kept, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSignature {
    pub tool: String,
    pub params: Vec<(String, String)>,
}

impl ActionSignature {
    pub fn of(action: &Action) -> Self {
        let mut params = Vec::new();
        if !action.target.is_empty() {
            params.push(("target".to_string(), action.target.to_lowercase()));
        }
        for key in ["element", "element_name"] {
            if let Some(value) = action.param_str(key) {
                params.push(("element".to_string(), value.to_lowercase()));
                break;
            }
        }
        if action.param_str("text").is_some() {
            params.push(("text".to_string(), "<text>".to_string()));
        }
        if let Some(command) = action.param_str("command") {
            let program = command.split_whitespace().next().unwrap_or("");
            params.push(("command".to_string(), program.to_lowercase()));
        }
        Self {
            tool: action.tool.clone(),
            params,
        }
    }
}

/// A mined repeated sequence and its review state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub sequence: Vec<ActionSignature>,
    pub frequency: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub accepted: bool,
    pub dismissed: bool,
}

pub struct PatternDetector {
    store: DocumentStore<Pattern>,
    inner: RwLock<DetectorState>,
}

struct DetectorState {
    buffer: VecDeque<ActionSignature>,
    patterns: Vec<Pattern>,
}

impl PatternDetector {
    /// Open the detector, loading previously mined patterns from `path`.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let store = DocumentStore::new(path);
        let patterns = store.load()?;
        if !patterns.is_empty() {
            info!("pattern detector loaded: {} patterns", patterns.len());
        }
        Ok(Self {
            store,
            inner: RwLock::new(DetectorState {
                buffer: VecDeque::new(),
                patterns,
            }),
        })
    }

    /// Feed one completed action into the history buffer.
    ///
    /// Blocked actions never reach here; failures still count, since a
    /// user retrying a flaky routine is repeating it all the same.
    pub fn ingest(&self, action: &Action) {
        if action.outcome == Some(ActionOutcome::Blocked) {
            return;
        }
        let mut state = self.inner.write().unwrap();
        state.buffer.push_back(ActionSignature::of(action));
        while state.buffer.len() > BUFFER_CAP {
            state.buffer.pop_front();
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.inner.read().unwrap().buffer.len()
    }

    /// Mine the buffer and fold new findings into the pattern set.
    pub fn analyze(&self) -> usize {
        let mut state = self.inner.write().unwrap();
        let history: Vec<ActionSignature> = state.buffer.iter().cloned().collect();

        let mut counts: HashMap<&[ActionSignature], usize> = HashMap::new();
        for size in MIN_WINDOW..=MAX_WINDOW {
            if history.len() < size {
                break;
            }
            for window in history.windows(size) {
                // "click, click" is noise, not a routine.
                if size == 2 && window[0] == window[1] {
                    continue;
                }
                *counts.entry(window).or_insert(0) += 1;
            }
        }

        let now = Utc::now();
        let mut discovered = 0;
        for (sequence, frequency) in counts {
            if frequency < MIN_FREQUENCY {
                continue;
            }
            if let Some(existing) = state
                .patterns
                .iter_mut()
                .find(|p| p.sequence.as_slice() == sequence)
            {
                if frequency > existing.frequency {
                    existing.frequency = frequency;
                }
                existing.last_seen = now;
            } else {
                state.patterns.push(Pattern {
                    id: Uuid::new_v4(),
                    sequence: sequence.to_vec(),
                    frequency,
                    first_seen: now,
                    last_seen: now,
                    accepted: false,
                    dismissed: false,
                });
                discovered += 1;
            }
        }

        if discovered > 0 {
            debug!("pattern analysis found {discovered} new patterns");
        }
        let snapshot = state.patterns.clone();
        drop(state);
        self.flush(&snapshot);
        discovered
    }

    /// Mine, then return suggestable patterns, most frequent first.
    /// Dismissed patterns stay out of the list permanently.
    pub fn suggestions(&self) -> Vec<Pattern> {
        self.analyze();
        let state = self.inner.read().unwrap();
        let mut out: Vec<Pattern> = state
            .patterns
            .iter()
            .filter(|p| !p.dismissed)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        out
    }

    /// Mark a pattern accepted. Idempotent; false when the id is unknown.
    pub fn accept(&self, id: Uuid) -> bool {
        self.mark(id, |p| p.accepted = true)
    }

    /// Mark a pattern dismissed so it is never suggested again.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.mark(id, |p| p.dismissed = true)
    }

    pub fn get(&self, id: Uuid) -> Option<Pattern> {
        self.inner
            .read()
            .unwrap()
            .patterns
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    fn mark(&self, id: Uuid, f: impl FnOnce(&mut Pattern)) -> bool {
        let mut state = self.inner.write().unwrap();
        let Some(pattern) = state.patterns.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        f(pattern);
        let snapshot = state.patterns.clone();
        drop(state);
        self.flush(&snapshot);
        true
    }

    fn flush(&self, snapshot: &[Pattern]) {
        if let Err(err) = self.store.save(snapshot) {
            warn!("pattern store flush failed: {err}");
        }
    }
}
