//! Method journal: remembers which interaction methods fail or work for a
//! given tool and application, so later escalations can skip tiers that
//! are known to be dead ends.
//!
//! Records live in memory behind a `RwLock` and are mirrored to disk after
//! every mutation. A failed flush marks the journal dirty and the next
//! mutation retries; reads never touch disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use marshal_core::types::AppKey;
use marshal_core::Result;
use marshal_store::DocumentStore;

/// Oldest least-useful records are evicted past this many.
const MAX_RECORDS: usize = 500;

/// One learned fact: for this tool in this application, `method_failed`
/// does not work, and `method_worked` (once known) does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRecord {
    pub tool: String,
    pub app: AppKey,
    pub window: String,
    pub method_failed: String,
    pub method_worked: Option<String>,
    pub error_message: String,
    pub params_snapshot: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub success_count: u32,
    pub failure_count: u32,
}

impl MethodRecord {
    /// A record is resolved once a working alternative is known.
    pub fn is_resolved(&self) -> bool {
        self.method_worked.is_some()
    }
}

pub struct MethodJournal {
    store: DocumentStore<MethodRecord>,
    records: RwLock<Vec<MethodRecord>>,
    dirty: AtomicBool,
}

impl MethodJournal {
    /// Open the journal at `path`, loading any existing records.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let store = DocumentStore::new(path);
        let records = store.load()?;
        if !records.is_empty() {
            info!("method journal loaded: {} records", records.len());
        }
        Ok(Self {
            store,
            records: RwLock::new(records),
            dirty: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Record that `method` failed for `tool` in the window's application.
    ///
    /// An existing record for the same (tool, app, method) is bumped and
    /// refreshed instead of duplicated.
    pub fn record_failure(
        &self,
        tool: &str,
        window_title: &str,
        method: &str,
        error_message: &str,
        params: Map<String, Value>,
    ) {
        let app = AppKey::from_window_title(window_title);
        let mut records = self.records.write().unwrap();

        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.tool == tool && r.app == app && r.method_failed == method)
        {
            existing.failure_count += 1;
            existing.error_message = error_message.to_string();
            existing.window = window_title.to_string();
            existing.timestamp = Utc::now();
            debug!(
                "journal: {method} failed again for {tool}@{app} ({} times)",
                existing.failure_count
            );
        } else {
            records.push(MethodRecord {
                tool: tool.to_string(),
                app: app.clone(),
                window: window_title.to_string(),
                method_failed: method.to_string(),
                method_worked: None,
                error_message: error_message.to_string(),
                params_snapshot: params,
                timestamp: Utc::now(),
                success_count: 0,
                failure_count: 1,
            });
            debug!("journal: new failure record {method} for {tool}@{app}");
        }

        Self::evict(&mut records);
        let snapshot = records.clone();
        drop(records);
        self.flush(&snapshot);
    }

    /// Record that `method` worked for `tool` in the window's application.
    ///
    /// Links the most recent unresolved-or-matching failure of a different
    /// method, marking it resolved. A success with no prior failure for
    /// that (tool, app) carries no lesson and is ignored.
    pub fn record_success(&self, tool: &str, window_title: &str, method: &str) {
        let app = AppKey::from_window_title(window_title);
        let mut records = self.records.write().unwrap();

        let linked = records
            .iter_mut()
            .filter(|r| r.tool == tool && r.app == app && r.method_failed != method)
            .max_by_key(|r| r.timestamp);

        let Some(record) = linked else {
            return;
        };

        record.method_worked = Some(method.to_string());
        record.success_count += 1;
        record.timestamp = Utc::now();
        debug!(
            "journal: {method} works for {tool}@{app} (after {} failing)",
            record.method_failed
        );

        let snapshot = records.clone();
        drop(records);
        self.flush(&snapshot);
    }

    /// Drop records, all of them or just one application's.
    pub fn clear(&self, app: Option<&AppKey>) -> usize {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        match app {
            Some(app) => records.retain(|r| r.app != *app),
            None => records.clear(),
        }
        let removed = before - records.len();
        let snapshot = records.clone();
        drop(records);
        if removed > 0 {
            self.flush(&snapshot);
        }
        removed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The proven method for `tool` in this application, if one is known.
    ///
    /// Among resolved records the one with the most successes wins.
    pub fn best_method(&self, tool: &str, window_title: &str) -> Option<String> {
        let app = AppKey::from_window_title(window_title);
        let records = self.records.read().unwrap();
        records
            .iter()
            .filter(|r| r.tool == tool && r.app == app && r.is_resolved())
            .max_by_key(|r| r.success_count)
            .and_then(|r| r.method_worked.clone())
    }

    /// Known failure records, optionally scoped to one application.
    /// Newest first.
    pub fn known_issues(&self, app: Option<&AppKey>) -> Vec<MethodRecord> {
        let records = self.records.read().unwrap();
        let mut out: Vec<MethodRecord> = records
            .iter()
            .filter(|r| app.map_or(true, |a| r.app == *a))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn evict(records: &mut Vec<MethodRecord>) {
        if records.len() <= MAX_RECORDS {
            return;
        }
        // Keep the records that earned their place: proven fixes first,
        // then most-seen failures, then newest.
        records.sort_by(|a, b| {
            (b.success_count, b.failure_count, b.timestamp).cmp(&(
                a.success_count,
                a.failure_count,
                a.timestamp,
            ))
        });
        records.truncate(MAX_RECORDS);
    }

    fn flush(&self, snapshot: &[MethodRecord]) {
        match self.store.save(snapshot) {
            Ok(()) => {
                if self.dirty.swap(false, Ordering::SeqCst) {
                    info!("method journal flush recovered");
                }
            }
            Err(err) => {
                self.dirty.store(true, Ordering::SeqCst);
                warn!("method journal flush failed (will retry): {err}");
            }
        }
    }

    /// Whether the last flush failed and data is awaiting a retry.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}
