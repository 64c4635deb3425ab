//! # numpad-core
//!
//! Protocol and domain library for the SimpleNP USB numeric keypad.
//!
//! This crate has no dependencies on OS APIs, serial port libraries or an
//! async runtime.  `numpad-driver` builds the live driver on top of it.
//!
//! # Architecture overview (for beginners)
//!
//! The keypad is a small microcontroller board that shows up on the host as a
//! virtual serial port.  It reports every key edge as a tiny framed binary
//! message, and accepts a handful of commands (ping, read/write the
//! user-function key mappings, reboot to bootloader).
//!
//! - **`protocol`** – The frame envelope, its checksum, the incremental
//!   parser that recovers frames from a fragmented and possibly noisy byte
//!   stream, and the firmware command set.
//!
//! - **`keys`** – The 25 physical keys, their edge states and the key-event
//!   notification.
//!
//! - **`domain`** – Device recognition (USB vendor/product whitelist) and the
//!   serial line settings used to open a port.

pub mod domain;
pub mod keys;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `numpad_core::Frame` instead of `numpad_core::protocol::frame::Frame`.
pub use domain::{DeviceInfo, Parity, RecognitionInfo, SerialSettings, SettingsError, StopBits};
pub use keys::{Key, KeyEvent, KeyState};
pub use protocol::{
    checksum, encode_frame, Command, Frame, FrameParser, ProtocolError, UfnMapping, UfnReply,
};
