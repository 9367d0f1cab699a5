//! Escalation engine: resolve a UI target by climbing a ladder of
//! increasingly expensive methods.
//!
//! Tier 1 searches the structural element tree with fuzzy multi-property
//! scoring. Tier 2 falls back to text recognition over the rendered
//! window. Tier 3 captures a screenshot for an external vision-capable
//! reasoner. The engine consults the method journal to skip tiers that
//! are known dead ends for the tool/application pair, records every
//! failure and success back into it, and checks the kill switch between
//! tiers so a long escalation cannot outlive an operator's stop.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use marshal_core::config::AutomationConfig;
use marshal_core::types::MethodTier;

use crate::error::{DenyReason, PipelineError};
use crate::journal::MethodJournal;
use crate::policy::PolicyGate;
use crate::providers::{
    CapturedImage, RecognizedWord, ScreenCapturer, StructureProvider, TextRecognizer, UiElement,
};

/// Minimum property score for the element name.
const NAME_THRESHOLD: f64 = 0.7;
/// Minimum property score for automation id, help text, and class name.
const SECONDARY_THRESHOLD: f64 = 0.6;
/// Minimum score for a recognized text span.
const TEXT_THRESHOLD: f64 = 0.7;

/// How one tier fared during a find.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: MethodTier,
    pub succeeded: bool,
    pub skipped: bool,
    pub elapsed_ms: u64,
}

/// A structural candidate with its match evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementMatch {
    pub name: String,
    pub control_type: String,
    pub automation_id: String,
    pub score: f64,
    pub matched_property: String,
}

/// What the winning tier produced.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Ranked structural candidates, best first.
    Structural { candidates: Vec<ElementMatch> },
    /// Recognized text spans matching the query, best first.
    Text { matched: Vec<RecognizedWord> },
    /// Screenshot handed off for external visual reasoning.
    Vision { image: CapturedImage, hint: String },
}

impl Resolution {
    pub fn tier(&self) -> MethodTier {
        match self {
            Resolution::Structural { .. } => MethodTier::Structural,
            Resolution::Text { .. } => MethodTier::TextRecognition,
            Resolution::Vision { .. } => MethodTier::Visual,
        }
    }
}

/// A completed find with its per-tier trail.
#[derive(Debug, Clone)]
pub struct FindOutcome {
    pub resolution: Resolution,
    pub attempts: Vec<TierAttempt>,
}

pub struct EscalationEngine {
    structure: Arc<dyn StructureProvider>,
    recognizer: Arc<dyn TextRecognizer>,
    capturer: Arc<dyn ScreenCapturer>,
    journal: Arc<MethodJournal>,
    gate: Arc<PolicyGate>,
    config: AutomationConfig,
}

impl EscalationEngine {
    pub fn new(
        structure: Arc<dyn StructureProvider>,
        recognizer: Arc<dyn TextRecognizer>,
        capturer: Arc<dyn ScreenCapturer>,
        journal: Arc<MethodJournal>,
        gate: Arc<PolicyGate>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            structure,
            recognizer,
            capturer,
            journal,
            gate,
            config,
        }
    }

    /// Resolve `query` within `target`'s window, escalating tier by tier.
    ///
    /// `tool` scopes the journal lookups; `control_type_hint` narrows the
    /// structural search to one control type when given; `max_results`
    /// overrides the configured candidate ceiling for this call only.
    pub fn find(
        &self,
        tool: &str,
        target: &str,
        query: &str,
        control_type_hint: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<FindOutcome, PipelineError> {
        let limit = max_results.unwrap_or(self.config.max_find_results);
        let mut attempts = Vec::new();

        // A proven later-tier method means the earlier tiers are known
        // dead ends here; start from it instead of rediscovering.
        let start_tier = self
            .journal
            .best_method(tool, target)
            .and_then(|m| MethodTier::from_method(&m))
            .unwrap_or(MethodTier::Structural);
        if start_tier != MethodTier::Structural {
            info!("escalation: journal suggests starting at {start_tier} for {tool}");
        }

        let mut tier = Some(MethodTier::Structural);
        while let Some(current) = tier {
            if self.gate.is_killed() {
                return Err(PipelineError::PolicyDenied {
                    code: DenyReason::KillSwitch,
                    message: "kill switch engaged during escalation".to_string(),
                });
            }

            if current < start_tier {
                attempts.push(TierAttempt {
                    tier: current,
                    succeeded: false,
                    skipped: true,
                    elapsed_ms: 0,
                });
                tier = current.next();
                continue;
            }

            let started = Instant::now();
            let result = self.run_tier(current, target, query, control_type_hint, limit);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(resolution) => {
                    attempts.push(TierAttempt {
                        tier: current,
                        succeeded: true,
                        skipped: false,
                        elapsed_ms,
                    });
                    // Only an escalated success is a lesson worth keeping.
                    if current != MethodTier::Structural {
                        self.journal.record_success(tool, target, current.as_method());
                    }
                    debug!("escalation: {query:?} resolved at {current} in {elapsed_ms}ms");
                    return Ok(FindOutcome {
                        resolution,
                        attempts,
                    });
                }
                Err(message) => {
                    attempts.push(TierAttempt {
                        tier: current,
                        succeeded: false,
                        skipped: false,
                        elapsed_ms,
                    });
                    let mut params = Map::new();
                    params.insert("query".to_string(), Value::String(query.to_string()));
                    self.journal
                        .record_failure(tool, target, current.as_method(), &message, params);
                    warn!("escalation: {current} failed for {query:?}: {message}");
                    tier = current.next();
                }
            }
        }

        Err(PipelineError::NotFound {
            query: query.to_string(),
            tiers_tried: attempts.iter().filter(|a| !a.skipped).count(),
        })
    }

    fn run_tier(
        &self,
        tier: MethodTier,
        target: &str,
        query: &str,
        control_type_hint: Option<&str>,
        limit: usize,
    ) -> Result<Resolution, String> {
        match tier {
            MethodTier::Structural => self.find_structural(target, query, control_type_hint, limit),
            MethodTier::TextRecognition => self.find_text(target, query, limit),
            MethodTier::Visual => self.find_visual(target, query),
        }
    }

    // =========================================================================
    // Tier 1: structural tree search
    // =========================================================================

    fn find_structural(
        &self,
        target: &str,
        query: &str,
        control_type_hint: Option<&str>,
        limit: usize,
    ) -> Result<Resolution, String> {
        let root = self.structure.element_tree(target)?;
        let mut candidates = Vec::new();
        Self::walk(
            &root,
            query,
            control_type_hint,
            0,
            self.config.max_tree_depth,
            &mut candidates,
        );

        if candidates.is_empty() {
            return Err(format!("no element matched {query:?}"));
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);
        Ok(Resolution::Structural { candidates })
    }

    /// Depth-first walk, stopping early on a perfect match.
    fn walk(
        element: &UiElement,
        query: &str,
        control_type_hint: Option<&str>,
        depth: usize,
        max_depth: usize,
        out: &mut Vec<ElementMatch>,
    ) -> bool {
        if depth > max_depth {
            return false;
        }

        let type_ok = control_type_hint
            .map_or(true, |hint| element.control_type.eq_ignore_ascii_case(hint));
        if type_ok {
            if let Some((score, property)) = score_element(element, query) {
                let perfect = score >= 1.0;
                out.push(ElementMatch {
                    name: element.name.clone(),
                    control_type: element.control_type.clone(),
                    automation_id: element.automation_id.clone(),
                    score,
                    matched_property: property.to_string(),
                });
                if perfect {
                    return true;
                }
            }
        }

        for child in &element.children {
            if Self::walk(child, query, control_type_hint, depth + 1, max_depth, out) {
                return true;
            }
        }
        false
    }

    // =========================================================================
    // Tier 2: text recognition
    // =========================================================================

    fn find_text(&self, target: &str, query: &str, limit: usize) -> Result<Resolution, String> {
        let words = self.recognizer.recognize(target)?;
        let query_words: Vec<&str> = query.split_whitespace().collect();
        if query_words.is_empty() {
            return Err("empty query".to_string());
        }
        let span = query_words.len();

        let mut matched: Vec<(f64, RecognizedWord)> = Vec::new();
        for window in words.windows(span) {
            let joined = window
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let score = similarity(&joined, query);
            if score >= TEXT_THRESHOLD {
                // Report the span through its first word's box; the caller
                // clicks the center anyway.
                matched.push((score, window[0].clone()));
            }
        }

        if matched.is_empty() {
            return Err(format!("text {query:?} not recognized on screen"));
        }

        matched.sort_by(|a, b| b.0.total_cmp(&a.0));
        matched.truncate(limit);
        Ok(Resolution::Text {
            matched: matched.into_iter().map(|(_, w)| w).collect(),
        })
    }

    // =========================================================================
    // Tier 3: visual hand-off
    // =========================================================================

    fn find_visual(&self, target: &str, query: &str) -> Result<Resolution, String> {
        let image = self.capturer.capture(target)?;
        Ok(Resolution::Vision {
            image,
            hint: format!("locate {query:?} in window {target:?}"),
        })
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Score one element against the query, returning the best passing
/// property. Name carries the highest bar; secondary properties pass at a
/// lower one.
fn score_element(element: &UiElement, query: &str) -> Option<(f64, &'static str)> {
    let mut best: Option<(f64, &'static str)> = None;
    let mut consider = |value: &str, property: &'static str, threshold: f64| {
        if value.is_empty() {
            return;
        }
        let score = similarity(value, query);
        if score >= threshold && best.map_or(true, |(b, _)| score > b) {
            best = Some((score, property));
        }
    };

    consider(&element.name, "name", NAME_THRESHOLD);
    consider(&element.automation_id, "automation_id", SECONDARY_THRESHOLD);
    consider(&element.help_text, "help_text", SECONDARY_THRESHOLD);
    consider(&element.class_name, "class_name", SECONDARY_THRESHOLD);
    best
}

/// Case-insensitive similarity in `[0, 1]`.
///
/// Exact match scores 1.0, a whole-word containment 0.95, a prefix 0.9,
/// anything else its normalized edit-distance similarity.
fn similarity(value: &str, query: &str) -> f64 {
    let value = value.trim().to_lowercase();
    let query = query.trim().to_lowercase();
    if value.is_empty() || query.is_empty() {
        return 0.0;
    }
    if value == query {
        return 1.0;
    }
    if value
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == query)
    {
        return 0.95;
    }
    if value.starts_with(&query) {
        return 0.9;
    }
    let distance = levenshtein(&value, &query);
    let longest = value.chars().count().max(query.chars().count());
    1.0 - distance as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
