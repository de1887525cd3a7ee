/// State carried by an EV_KEY event.
///
/// From `evtest` output, the "magic numbers" for assignment to enums:
///   0 == 'released'
///   1 == 'pressed'
///   2 == 'repeated'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KeyState {
    Release = 0,
    Press = 1,
    Repeat = 2,
}

impl KeyState {
    /// Returns true only for the press edge (not auto-repeat)
    pub fn is_press(self) -> bool {
        matches!(self, KeyState::Press)
    }

    /// Create a KeyState from the raw event value
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Release),
            1 => Some(KeyState::Press),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_press_is_press() {
        assert!(KeyState::Press.is_press());
        assert!(!KeyState::Repeat.is_press());
        assert!(!KeyState::Release.is_press());
    }

    #[test]
    fn test_keystate_from_i32() {
        assert_eq!(KeyState::from_i32(0), Some(KeyState::Release));
        assert_eq!(KeyState::from_i32(1), Some(KeyState::Press));
        assert_eq!(KeyState::from_i32(2), Some(KeyState::Repeat));
        assert_eq!(KeyState::from_i32(3), None);
        assert_eq!(KeyState::from_i32(-1), None);
    }
}
