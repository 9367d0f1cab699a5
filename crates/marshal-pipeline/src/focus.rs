//! Focus ledger: save the foreground window before an input-simulating
//! action and restore it afterwards.
//!
//! Restoration rides on a drop guard so it happens even when the operation
//! panics or returns early with `?`. Restores are serialized through one
//! mutex; concurrent input-simulating actions would otherwise race each
//! other's foreground writes.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use marshal_core::types::WindowHandle;

use crate::providers::WindowRegistry;

/// Tools that exist to change focus; wrapping them would undo their work.
pub const FOCUS_EXEMPT_TOOLS: &[&str] = &["focus_window", "restore_focus"];

/// What happened on the most recent restore attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Moved focus back to the saved window.
    Restored,
    /// Forced focus back after the polite path was refused.
    Forced,
    /// Saved window is already foreground; nothing to do.
    AlreadyFocused,
    /// Saved window no longer exists.
    WindowGone,
    /// Nothing was in the foreground when saved.
    NothingSaved,
    /// Both the polite and forced paths failed.
    Failed,
}

pub struct FocusLedger {
    registry: Arc<dyn WindowRegistry>,
    restore_lock: Mutex<()>,
    last_outcome: Mutex<Option<RestoreOutcome>>,
}

impl FocusLedger {
    pub fn new(registry: Arc<dyn WindowRegistry>) -> Self {
        Self {
            registry,
            restore_lock: Mutex::new(()),
            last_outcome: Mutex::new(None),
        }
    }

    /// Capture the current foreground window. The returned token restores
    /// it when dropped.
    pub fn save(&self) -> FocusToken<'_> {
        let saved = self.registry.foreground();
        if let Some(handle) = saved {
            let title = self.registry.title(handle);
            debug!("focus saved: {title:?} ({handle:?})");
        }
        FocusToken {
            ledger: self,
            saved,
            armed: true,
        }
    }

    /// Run `op` with the current focus saved and restored around it.
    pub fn wrap<T>(&self, op: impl FnOnce() -> T) -> T {
        let _token = self.save();
        op()
    }

    pub fn is_exempt(tool: &str) -> bool {
        FOCUS_EXEMPT_TOOLS.contains(&tool)
    }

    /// Outcome of the most recent restore, if any restore has run.
    pub fn last_outcome(&self) -> Option<RestoreOutcome> {
        *self.last_outcome.lock().unwrap()
    }

    fn restore(&self, saved: Option<WindowHandle>) -> RestoreOutcome {
        let _serialize: MutexGuard<'_, ()> = self.restore_lock.lock().unwrap();

        let outcome = match saved {
            None => RestoreOutcome::NothingSaved,
            Some(handle) if !self.registry.is_window(handle) => {
                debug!("focus restore skipped: window {handle:?} is gone");
                RestoreOutcome::WindowGone
            }
            Some(handle) if self.registry.foreground() == Some(handle) => {
                RestoreOutcome::AlreadyFocused
            }
            Some(handle) => {
                if self.registry.set_foreground(handle) {
                    debug!("focus restored: {handle:?}");
                    RestoreOutcome::Restored
                } else if self.registry.force_set_foreground(handle) {
                    debug!("focus force-restored: {handle:?}");
                    RestoreOutcome::Forced
                } else {
                    // Restore failure must never fail the action itself.
                    warn!("could not restore focus to {handle:?}");
                    RestoreOutcome::Failed
                }
            }
        };

        *self.last_outcome.lock().unwrap() = Some(outcome);
        outcome
    }
}

/// Drop guard holding a saved foreground window.
pub struct FocusToken<'a> {
    ledger: &'a FocusLedger,
    saved: Option<WindowHandle>,
    armed: bool,
}

impl FocusToken<'_> {
    pub fn saved_window(&self) -> Option<WindowHandle> {
        self.saved
    }

    /// Restore now instead of at drop, reporting the outcome.
    pub fn restore_now(mut self) -> RestoreOutcome {
        self.armed = false;
        self.ledger.restore(self.saved)
    }

    /// Drop the token without restoring.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FocusToken<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.ledger.restore(self.saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scriptable window registry for exercising restore paths.
    struct FakeRegistry {
        foreground: StdMutex<Option<WindowHandle>>,
        live: StdMutex<Vec<WindowHandle>>,
        polite_refused: AtomicBool,
        force_refused: AtomicBool,
        set_calls: StdMutex<Vec<(WindowHandle, bool)>>,
    }

    impl FakeRegistry {
        fn with_foreground(handle: WindowHandle) -> Self {
            Self {
                foreground: StdMutex::new(Some(handle)),
                live: StdMutex::new(vec![handle]),
                polite_refused: AtomicBool::new(false),
                force_refused: AtomicBool::new(false),
                set_calls: StdMutex::new(Vec::new()),
            }
        }

        fn switch_to(&self, handle: WindowHandle) {
            self.live.lock().unwrap().push(handle);
            *self.foreground.lock().unwrap() = Some(handle);
        }

        fn close(&self, handle: WindowHandle) {
            self.live.lock().unwrap().retain(|h| *h != handle);
            let mut fg = self.foreground.lock().unwrap();
            if *fg == Some(handle) {
                *fg = None;
            }
        }
    }

    impl WindowRegistry for FakeRegistry {
        fn foreground(&self) -> Option<WindowHandle> {
            *self.foreground.lock().unwrap()
        }

        fn title(&self, _handle: WindowHandle) -> String {
            "Fake Window".to_string()
        }

        fn is_window(&self, handle: WindowHandle) -> bool {
            self.live.lock().unwrap().contains(&handle)
        }

        fn set_foreground(&self, handle: WindowHandle) -> bool {
            let refused = self.polite_refused.load(Ordering::SeqCst);
            self.set_calls.lock().unwrap().push((handle, false));
            if refused {
                return false;
            }
            *self.foreground.lock().unwrap() = Some(handle);
            true
        }

        fn force_set_foreground(&self, handle: WindowHandle) -> bool {
            let refused = self.force_refused.load(Ordering::SeqCst);
            self.set_calls.lock().unwrap().push((handle, true));
            if refused {
                return false;
            }
            *self.foreground.lock().unwrap() = Some(handle);
            true
        }
    }

    fn ledger(registry: &Arc<FakeRegistry>) -> FocusLedger {
        FocusLedger::new(Arc::clone(registry) as Arc<dyn WindowRegistry>)
    }

    #[test]
    fn test_restores_focus_after_op_changes_it() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        ledger.wrap(|| registry.switch_to(WindowHandle(2)));

        assert_eq!(registry.foreground(), Some(original));
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::Restored));
    }

    #[test]
    fn test_already_focused_does_not_call_set() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        ledger.wrap(|| {});

        assert!(registry.set_calls.lock().unwrap().is_empty());
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::AlreadyFocused));
    }

    #[test]
    fn test_gone_window_skips_restore() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        let token = ledger.save();
        registry.close(original);
        registry.switch_to(WindowHandle(2));
        drop(token);

        assert_eq!(registry.foreground(), Some(WindowHandle(2)));
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::WindowGone));
    }

    #[test]
    fn test_falls_back_to_forced_restore() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        registry.polite_refused.store(true, Ordering::SeqCst);
        let ledger = ledger(&registry);

        ledger.wrap(|| registry.switch_to(WindowHandle(2)));

        assert_eq!(registry.foreground(), Some(original));
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::Forced));
        let calls = registry.set_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(original, false), (original, true)]);
    }

    #[test]
    fn test_total_restore_failure_is_swallowed() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        registry.polite_refused.store(true, Ordering::SeqCst);
        registry.force_refused.store(true, Ordering::SeqCst);
        let ledger = ledger(&registry);

        // Must not panic even though both restore paths fail.
        ledger.wrap(|| registry.switch_to(WindowHandle(2)));
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::Failed));
    }

    #[test]
    fn test_restores_on_panic() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _token = ledger.save();
            registry.switch_to(WindowHandle(2));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(registry.foreground(), Some(original));
    }

    #[test]
    fn test_nothing_saved_when_no_foreground() {
        let registry = Arc::new(FakeRegistry::with_foreground(WindowHandle(1)));
        registry.close(WindowHandle(1));
        let ledger = ledger(&registry);

        ledger.wrap(|| registry.switch_to(WindowHandle(2)));

        // Focus is left where the operation put it.
        assert_eq!(registry.foreground(), Some(WindowHandle(2)));
        assert_eq!(ledger.last_outcome(), Some(RestoreOutcome::NothingSaved));
    }

    #[test]
    fn test_restore_now_reports_outcome() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        let token = ledger.save();
        registry.switch_to(WindowHandle(2));
        assert_eq!(token.restore_now(), RestoreOutcome::Restored);
        assert_eq!(registry.foreground(), Some(original));
    }

    #[test]
    fn test_disarm_skips_restore() {
        let original = WindowHandle(1);
        let registry = Arc::new(FakeRegistry::with_foreground(original));
        let ledger = ledger(&registry);

        let token = ledger.save();
        registry.switch_to(WindowHandle(2));
        token.disarm();

        assert_eq!(registry.foreground(), Some(WindowHandle(2)));
        assert_eq!(ledger.last_outcome(), None);
    }

    #[test]
    fn test_exempt_tools() {
        assert!(FocusLedger::is_exempt("focus_window"));
        assert!(FocusLedger::is_exempt("restore_focus"));
        assert!(!FocusLedger::is_exempt("click"));
    }
}
