//! Physical keys, key states and the key-event notification.
//!
//! The firmware identifies each of the 25 switches on the pad by a small id
//! (0 through 24) and reports every edge as a `NOTIFY_KEY` frame:
//!
//! ```text
//! CMD = 0xFE, DATA = [key id, state]
//! ```
//!
//! Ids and states outside the known tables are not rejected; they are
//! carried through as [`Key::Unknown`] / [`KeyState::Unknown`] so that newer
//! firmware revisions still produce events.

use std::fmt;

use crate::protocol::command::CMD_NOTIFY_KEY;
use crate::protocol::frame::Frame;

/// One switch on the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Ufn1,
    Slash,
    Asterisk,
    Minus,
    NumLock,
    Ufn2,
    Num7,
    Num8,
    Num9,
    Plus,
    Ufn3,
    Num4,
    Num5,
    Num6,
    Enter,
    Ufn4,
    Num1,
    Num2,
    Num3,
    MacroRecord,
    Ufn5,
    Num0,
    /// Switch position 22; not populated on the 2024-03-23 board.
    Hidden,
    Dot,
    MacroPlay,
    /// The firmware's "no key" marker, `0xFF`.
    Invalid,
    Unknown(u8),
}

impl Key {
    /// Number of switch positions (ids `0..COUNT`).
    pub const COUNT: u8 = 25;

    /// Every switch position in id order, `Hidden` included.
    pub const ALL: [Key; 25] = [
        Key::Ufn1,
        Key::Slash,
        Key::Asterisk,
        Key::Minus,
        Key::NumLock,
        Key::Ufn2,
        Key::Num7,
        Key::Num8,
        Key::Num9,
        Key::Plus,
        Key::Ufn3,
        Key::Num4,
        Key::Num5,
        Key::Num6,
        Key::Enter,
        Key::Ufn4,
        Key::Num1,
        Key::Num2,
        Key::Num3,
        Key::MacroRecord,
        Key::Ufn5,
        Key::Num0,
        Key::Hidden,
        Key::Dot,
        Key::MacroPlay,
    ];

    /// Raw id as sent on the wire.
    pub fn id(self) -> u8 {
        u8::from(self)
    }

    /// Index of the user-function key (`0..5`), if this is one.
    pub fn ufn_index(self) -> Option<u8> {
        match self {
            Key::Ufn1 => Some(0),
            Key::Ufn2 => Some(1),
            Key::Ufn3 => Some(2),
            Key::Ufn4 => Some(3),
            Key::Ufn5 => Some(4),
            _ => None,
        }
    }
}

impl From<u8> for Key {
    fn from(raw: u8) -> Self {
        match raw {
            0xFF => Key::Invalid,
            id if id < Key::COUNT => Key::ALL[usize::from(id)],
            other => Key::Unknown(other),
        }
    }
}

impl From<Key> for u8 {
    fn from(key: Key) -> Self {
        match key {
            Key::Ufn1 => 0,
            Key::Slash => 1,
            Key::Asterisk => 2,
            Key::Minus => 3,
            Key::NumLock => 4,
            Key::Ufn2 => 5,
            Key::Num7 => 6,
            Key::Num8 => 7,
            Key::Num9 => 8,
            Key::Plus => 9,
            Key::Ufn3 => 10,
            Key::Num4 => 11,
            Key::Num5 => 12,
            Key::Num6 => 13,
            Key::Enter => 14,
            Key::Ufn4 => 15,
            Key::Num1 => 16,
            Key::Num2 => 17,
            Key::Num3 => 18,
            Key::MacroRecord => 19,
            Key::Ufn5 => 20,
            Key::Num0 => 21,
            Key::Hidden => 22,
            Key::Dot => 23,
            Key::MacroPlay => 24,
            Key::Invalid => 0xFF,
            Key::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Unknown(raw) => write!(f, "Unknown({raw:#04x})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Debounced edge state of one switch.
///
/// A press produces `Rise` then `High`; a release `Fall` then `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Low,
    Rise,
    High,
    Fall,
    Unknown(u8),
}

impl KeyState {
    /// `true` for `Rise` and `High`.
    pub fn is_down(self) -> bool {
        matches!(self, KeyState::Rise | KeyState::High)
    }
}

impl From<u8> for KeyState {
    fn from(raw: u8) -> Self {
        match raw {
            0 => KeyState::Low,
            1 => KeyState::Rise,
            2 => KeyState::High,
            3 => KeyState::Fall,
            other => KeyState::Unknown(other),
        }
    }
}

impl From<KeyState> for u8 {
    fn from(state: KeyState) -> Self {
        match state {
            KeyState::Low => 0,
            KeyState::Rise => 1,
            KeyState::High => 2,
            KeyState::Fall => 3,
            KeyState::Unknown(raw) => raw,
        }
    }
}

/// A key state change reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn new(key: Key, state: KeyState) -> Self {
        Self { key, state }
    }

    /// Extracts a key event from a `NOTIFY_KEY` frame.
    ///
    /// Returns `None` for any other command and for key frames carrying fewer
    /// than two data bytes.  Extra data bytes are ignored.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.command != CMD_NOTIFY_KEY {
            return None;
        }
        match frame.data.as_slice() {
            [key, state, ..] => Some(Self::new(Key::from(*key), KeyState::from(*state))),
            _ => None,
        }
    }

    /// Builds the frame the firmware would send for this event.
    pub fn to_frame(&self) -> Frame {
        Frame::new(CMD_NOTIFY_KEY, &[self.key.into(), self.state.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ids_match_firmware_table() {
        assert_eq!(Key::from(0), Key::Ufn1);
        assert_eq!(Key::from(2), Key::Asterisk);
        assert_eq!(Key::from(19), Key::MacroRecord);
        assert_eq!(Key::from(22), Key::Hidden);
        assert_eq!(Key::from(23), Key::Dot);
        assert_eq!(Key::from(24), Key::MacroPlay);
        assert_eq!(Key::from(0xFF), Key::Invalid);
    }

    #[test]
    fn test_key_all_is_in_id_order() {
        for (id, key) in Key::ALL.iter().enumerate() {
            assert_eq!(usize::from(key.id()), id, "{key} out of order");
        }
    }

    #[test]
    fn test_out_of_range_key_passes_through() {
        // Arrange / Act
        let key = Key::from(42);

        // Assert
        assert_eq!(key, Key::Unknown(42));
        assert_eq!(key.id(), 42);
    }

    #[test]
    fn test_ufn_index_only_for_user_function_keys() {
        assert_eq!(Key::Ufn1.ufn_index(), Some(0));
        assert_eq!(Key::Ufn5.ufn_index(), Some(4));
        assert_eq!(Key::Enter.ufn_index(), None);
    }

    #[test]
    fn test_key_state_conversion() {
        assert_eq!(KeyState::from(1), KeyState::Rise);
        assert_eq!(KeyState::from(9), KeyState::Unknown(9));
        assert_eq!(u8::from(KeyState::Fall), 3);
        assert!(KeyState::High.is_down());
        assert!(!KeyState::Fall.is_down());
    }

    #[test]
    fn test_key_event_from_notify_frame() {
        // Arrange
        let frame = Frame::new(0xFE, &[3, 1]);

        // Act
        let event = KeyEvent::from_frame(&frame);

        // Assert
        assert_eq!(event, Some(KeyEvent::new(Key::Minus, KeyState::Rise)));
    }

    #[test]
    fn test_key_event_ignores_short_data_and_other_commands() {
        assert_eq!(KeyEvent::from_frame(&Frame::new(0xFE, &[3])), None);
        assert_eq!(KeyEvent::from_frame(&Frame::empty(0xFE)), None);
        assert_eq!(KeyEvent::from_frame(&Frame::new(0x80, &[3, 1])), None);
    }

    #[test]
    fn test_key_event_ignores_trailing_bytes() {
        let frame = Frame::new(0xFE, &[14, 2, 0xAA]);
        assert_eq!(
            KeyEvent::from_frame(&frame),
            Some(KeyEvent::new(Key::Enter, KeyState::High))
        );
    }

    #[test]
    fn test_key_event_to_frame_matches_firmware_notify() {
        let frame = KeyEvent::new(Key::Num5, KeyState::Fall).to_frame();
        assert_eq!(frame, Frame::new(0xFE, &[12, 3]));
    }
}
