//! Command set understood by the keypad firmware.
//!
//! The host sends request frames built from [`Command`]; the firmware answers
//! each request with a frame whose command byte is the request code with
//! [`REPLY_FLAG`] set.  Key notifications (`0xFE`) flow device → host only and
//! are never requested.
//!
//! | Code   | Request                    | Reply data                      |
//! |--------|----------------------------|---------------------------------|
//! | `0x00` | NOP (ping), any data       | echo of the request data        |
//! | `0x01` | GET_UFN `[ufn]`            | [`UfnReply`]                    |
//! | `0x02` | SET_UFN `[ufn, sc, mod, t]`| [`UfnReply`]                    |
//! | `0x03` | RESET_UFN                  | echo                            |
//! | `0x7F` | FLASH_MODE                 | echo, then reboot to bootloader |
//!
//! The driver never waits for replies.  Callers that care subscribe to the
//! frame stream and decode with [`UfnReply::from_frame`].

use thiserror::Error;

use super::frame::Frame;

// ── Command codes ─────────────────────────────────────────────────────────────

/// No-operation; the firmware echoes the data back.  Used as a ping.
pub const CMD_NOP: u8 = 0x00;
/// Read one user-function key mapping.
pub const CMD_GET_UFN: u8 = 0x01;
/// Write one user-function key mapping.
pub const CMD_SET_UFN: u8 = 0x02;
/// Clear every user-function key mapping.
pub const CMD_RESET_UFN: u8 = 0x03;
/// Reboot the keypad into its USB bootloader.
pub const CMD_FLASH_MODE: u8 = 0x7F;
/// Key state notification, device → host.
pub const CMD_NOTIFY_KEY: u8 = 0xFE;
/// Bit set on every reply command byte.
pub const REPLY_FLAG: u8 = 0x80;

/// Number of user-function keys on the device (`UFN1` .. `UFN5`).
pub const MAX_UFN: u8 = 5;

/// Length of the data carried by GET_UFN / SET_UFN replies.
pub const UFN_REPLY_LEN: usize = 5;

/// Returns the request code a reply frame answers, or `None` when the frame
/// is not a reply.
///
/// The key notification `0xFE` carries the reply bit but is unsolicited, so it
/// is not treated as a reply.
pub fn reply_to(frame: &Frame) -> Option<u8> {
    if frame.command == CMD_NOTIFY_KEY || frame.command & REPLY_FLAG == 0 {
        return None;
    }
    Some(frame.command & !REPLY_FLAG)
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Failure to interpret a reply frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame command {0:#04x} is not a UFN reply")]
    UnexpectedCommand(u8),

    #[error("reply too short: needed {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },
}

// ── Toggle modes ─────────────────────────────────────────────────────────────

/// How a user-function key behaves when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleMode {
    /// Key is down while held.
    None,
    /// Each press flips the key between down and up.
    Toggle,
    /// Key stays down until the next non-UFN key.
    OneShot,
    /// Marker the firmware reports when a mapping could not be read.
    Invalid,
    /// Any other raw value.
    Unknown(u8),
}

impl From<u8> for ToggleMode {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Toggle,
            2 => Self::OneShot,
            0xFF => Self::Invalid,
            other => Self::Unknown(other),
        }
    }
}

impl From<ToggleMode> for u8 {
    fn from(mode: ToggleMode) -> Self {
        match mode {
            ToggleMode::None => 0,
            ToggleMode::Toggle => 1,
            ToggleMode::OneShot => 2,
            ToggleMode::Invalid => 0xFF,
            ToggleMode::Unknown(raw) => raw,
        }
    }
}

// ── Device status codes ──────────────────────────────────────────────────────

/// Error code carried in the first byte of a UFN reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Success,
    InvalidLength,
    InvalidUfn,
    InvalidKey,
    InvalidToggleMode,
    Other(u8),
}

impl DeviceStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<u8> for DeviceStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Success,
            1 => Self::InvalidLength,
            2 => Self::InvalidUfn,
            3 => Self::InvalidKey,
            4 => Self::InvalidToggleMode,
            other => Self::Other(other),
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// One user-function key mapping: which HID scan code and modifier mask the
/// key sends, and how it toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UfnMapping {
    /// User-function index, `0..MAX_UFN`.
    pub ufn: u8,
    pub scan_code: u8,
    pub modifiers: u8,
    pub toggle: ToggleMode,
}

/// A request the host can send to the keypad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// NOP with optional payload that the device echoes back.
    Ping(Vec<u8>),
    GetUfn { ufn: u8 },
    SetUfn(UfnMapping),
    ResetUfn,
    FlashMode,
    /// Arbitrary command byte and data, for codes this crate does not model.
    Raw { command: u8, data: Vec<u8> },
}

impl Command {
    /// Command byte placed in the frame.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ping(_) => CMD_NOP,
            Self::GetUfn { .. } => CMD_GET_UFN,
            Self::SetUfn(_) => CMD_SET_UFN,
            Self::ResetUfn => CMD_RESET_UFN,
            Self::FlashMode => CMD_FLASH_MODE,
            Self::Raw { command, .. } => *command,
        }
    }

    /// Data bytes placed in the frame (before truncation to 16 bytes).
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Ping(data) => data.clone(),
            Self::GetUfn { ufn } => vec![*ufn],
            Self::SetUfn(m) => vec![m.ufn, m.scan_code, m.modifiers, m.toggle.into()],
            Self::ResetUfn | Self::FlashMode => Vec::new(),
            Self::Raw { data, .. } => data.clone(),
        }
    }

    /// Reply command byte the firmware answers with.
    pub fn reply_code(&self) -> u8 {
        self.code() | REPLY_FLAG
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.code(), &self.payload())
    }
}

// ── Replies ──────────────────────────────────────────────────────────────────

/// Decoded GET_UFN / SET_UFN reply: `[error, ufn, scan_code, modifiers, toggle]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UfnReply {
    /// Request code this reply answers (`CMD_GET_UFN` or `CMD_SET_UFN`).
    pub request: u8,
    pub status: DeviceStatus,
    pub ufn: u8,
    pub scan_code: u8,
    pub modifiers: u8,
    pub toggle: ToggleMode,
}

impl UfnReply {
    /// Decodes a UFN reply frame.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnexpectedCommand`] if the frame is not a reply to
    ///   GET_UFN or SET_UFN.
    /// - [`ProtocolError::InsufficientData`] if it carries fewer than 5 bytes.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let request = match reply_to(frame) {
            Some(code @ (CMD_GET_UFN | CMD_SET_UFN)) => code,
            _ => return Err(ProtocolError::UnexpectedCommand(frame.command)),
        };

        if frame.data.len() < UFN_REPLY_LEN {
            return Err(ProtocolError::InsufficientData {
                needed: UFN_REPLY_LEN,
                available: frame.data.len(),
            });
        }

        let d = &frame.data;
        Ok(Self {
            request,
            status: DeviceStatus::from(d[0]),
            ufn: d[1],
            scan_code: d[2],
            modifiers: d[3],
            toggle: ToggleMode::from(d[4]),
        })
    }

    /// The mapping reported by a successful reply.
    pub fn mapping(&self) -> Option<UfnMapping> {
        self.status.is_success().then_some(UfnMapping {
            ufn: self.ufn,
            scan_code: self.scan_code,
            modifiers: self.modifiers,
            toggle: self.toggle,
        })
    }
}
