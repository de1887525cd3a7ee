// evmqtt Input Events
// Raw device events and their categorization into key events

use crate::key::{key_names, KeyCodes};
use crate::KeyState;

/// EV_SYN event type code from Linux input-event-codes.h
pub const EV_SYN: u16 = 0x00;

/// EV_KEY event type code from Linux input-event-codes.h
pub const EV_KEY: u16 = 0x01;

/// EV_MSC event type code (scancodes reported alongside key events)
pub const EV_MSC: u16 = 0x04;

/// A single event as read from an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    /// Shorthand for an EV_KEY event
    pub fn key(code: u16, value: i32) -> Self {
        Self::new(EV_KEY, code, value)
    }

    pub fn is_key_event(&self) -> bool {
        is_key_event(self.event_type)
    }
}

/// Check if an event type is a key event.
pub fn is_key_event(event_type: u16) -> bool {
    event_type == EV_KEY
}

/// A categorized key event. Transient: built per raw event and consumed
/// immediately by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub codes: KeyCodes,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn new(codes: impl Into<KeyCodes>, state: KeyState) -> Self {
        Self {
            codes: codes.into(),
            state,
        }
    }

    /// Categorize a raw event.
    ///
    /// Returns `None` for non-key events and for values that are not a
    /// key state (0, 1 or 2).
    pub fn categorize(event: &RawEvent) -> Option<Self> {
        if !event.is_key_event() {
            return None;
        }
        let state = KeyState::from_i32(event.value)?;
        Some(Self {
            codes: key_names(event.code),
            state,
        })
    }

    /// The identifier used for modifier tracking and filtering
    pub fn primary(&self) -> &str {
        self.codes.primary()
    }
}
