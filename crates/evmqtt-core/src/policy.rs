// evmqtt Key Event Policy
// Press-edge filtering and outgoing key formatting

use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::KeyEvent;
use crate::key::KeyCodes;
use crate::modifier::ModifierTracker;
use crate::KeyState;

/// Decides which key events are published and how their key string is built.
///
/// Cloning a policy shares the underlying [`ModifierTracker`]: every clone
/// observes and mutates the same held-modifier state under one lock. Use
/// [`KeyEventPolicy::isolated`] to derive a policy with its own state.
#[derive(Debug, Clone)]
pub struct KeyEventPolicy {
    tracker: Arc<Mutex<ModifierTracker>>,
}

impl KeyEventPolicy {
    pub fn new(tracker: ModifierTracker) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }

    /// A policy with the same modifier and ignore sets but a fresh, unshared
    /// held state
    pub fn isolated(&self) -> Self {
        let template = self.tracker.lock();
        Self::new(ModifierTracker::new(
            template.modifiers().iter().cloned(),
            template.ignored().iter().cloned(),
        ))
    }

    /// True iff `state` is a press and `primary` is neither a modifier nor
    /// ignored. Release and repeat are never published.
    pub fn should_publish(&self, primary: &str, state: KeyState) -> bool {
        let tracker = self.tracker.lock();
        Self::publishable(&tracker, primary, state)
    }

    fn publishable(tracker: &ModifierTracker, primary: &str, state: KeyState) -> bool {
        state.is_press() && !tracker.is_modifier(primary) && !tracker.is_ignored(primary)
    }

    /// Join multiple reported codes with `|` in report order; a single code
    /// is returned unchanged.
    pub fn format_key(codes: &KeyCodes) -> String {
        codes.as_slice().join("|")
    }

    /// `format_key(codes)` followed by the current modifier suffix
    pub fn full_key(&self, codes: &KeyCodes) -> String {
        let suffix = self.tracker.lock().suffix();
        Self::format_key(codes) + &suffix
    }

    /// Record the event in the modifier state, then return the key string to
    /// publish, if any.
    ///
    /// The update, the publish check and the suffix read happen under a
    /// single lock acquisition, so an event from another device sharing this
    /// tracker cannot interleave. The lock is released before returning.
    pub fn evaluate(&self, event: &KeyEvent) -> Option<String> {
        let mut tracker = self.tracker.lock();
        tracker.update(event.primary(), event.state);
        if !Self::publishable(&tracker, event.primary(), event.state) {
            return None;
        }
        Some(Self::format_key(&event.codes) + &tracker.suffix())
    }

    /// Snapshot of the held modifiers
    pub fn active_modifiers(&self) -> Vec<String> {
        self.tracker.lock().active_modifiers()
    }

    /// Whether two policies share the same tracker
    pub fn shares_state_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tracker, &other.tracker)
    }
}

impl Default for KeyEventPolicy {
    fn default() -> Self {
        Self::new(ModifierTracker::with_defaults())
    }
}
