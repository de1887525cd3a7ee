// evmqtt Modifier Tracking
// Records which modifier keys (Shift, Ctrl, Alt, Meta) are currently held

use std::collections::{BTreeMap, BTreeSet};

use crate::KeyState;

/// Modifier identifiers tracked by default
pub const DEFAULT_MODIFIERS: &[&str] = &[
    "KEY_LEFTSHIFT",
    "KEY_RIGHTSHIFT",
    "KEY_LEFTCTRL",
    "KEY_RIGHTCTRL",
    "KEY_LEFTALT",
    "KEY_RIGHTALT",
    "KEY_LEFTMETA",
    "KEY_RIGHTMETA",
];

/// Keys that are never published by default
pub const DEFAULT_IGNORED_KEYS: &[&str] = &["KEY_NUMLOCK"];

/// Tracks the held state of a fixed set of modifier keys.
///
/// The modifier and ignore sets are fixed at construction. Only identifiers
/// from the modifier set ever appear in the held-state map, and an entry only
/// changes when an event for that key is processed. There is no implicit
/// reset: a modifier stays held until its release is seen.
///
/// Not synchronized. When one tracker is shared between monitors it is
/// wrapped in a single lock by [`crate::KeyEventPolicy`].
#[derive(Debug, Clone)]
pub struct ModifierTracker {
    modifiers: BTreeSet<String>,
    ignored: BTreeSet<String>,
    /// Last seen state per modifier; true while held
    held: BTreeMap<String, bool>,
}

impl ModifierTracker {
    /// Create a tracker with explicit modifier and ignore sets
    pub fn new<M, I, S, T>(modifiers: M, ignored: I) -> Self
    where
        M: IntoIterator<Item = S>,
        I: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            modifiers: modifiers.into_iter().map(Into::into).collect(),
            ignored: ignored.into_iter().map(Into::into).collect(),
            held: BTreeMap::new(),
        }
    }

    /// Create a tracker with the default left/right shift, ctrl, alt and meta
    /// modifiers and `KEY_NUMLOCK` ignored
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_MODIFIERS.iter().copied(),
            DEFAULT_IGNORED_KEYS.iter().copied(),
        )
    }

    /// Record the state of a key. No-op unless `keycode` is a modifier.
    ///
    /// Only `Press` counts as held; release and repeat both record the key
    /// as not held.
    pub fn update(&mut self, keycode: &str, state: KeyState) {
        if !self.modifiers.contains(keycode) {
            return;
        }
        let pressed = state.is_press();
        match self.held.get_mut(keycode) {
            Some(entry) => *entry = pressed,
            None => {
                self.held.insert(keycode.to_string(), pressed);
            }
        }
    }

    /// Currently held modifiers in ascending lexicographic order
    pub fn active_modifiers(&self) -> Vec<String> {
        // BTreeMap iteration is already sorted by key
        self.held
            .iter()
            .filter(|(_, &held)| held)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// `""` when nothing is held, otherwise `"_"` followed by the active
    /// modifiers joined with `"_"`
    pub fn suffix(&self) -> String {
        let active = self.active_modifiers();
        if active.is_empty() {
            String::new()
        } else {
            format!("_{}", active.join("_"))
        }
    }

    pub fn is_modifier(&self, keycode: &str) -> bool {
        self.modifiers.contains(keycode)
    }

    pub fn is_ignored(&self, keycode: &str) -> bool {
        self.ignored.contains(keycode)
    }

    pub fn modifiers(&self) -> &BTreeSet<String> {
        &self.modifiers
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }
}

impl Default for ModifierTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
