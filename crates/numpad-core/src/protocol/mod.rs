//! Wire protocol: checksum, frame construction, incremental parsing and the
//! firmware command set.
//!
//! # How a frame travels (for beginners)
//!
//! The keypad shows up on the host as a virtual serial port.  A serial port is
//! a plain byte pipe: it has no notion of "messages", and the operating system
//! hands bytes to us in whatever chunks it likes.  To carry discrete messages
//! over it, every message is wrapped in a small envelope:
//!
//! ```text
//! 0x02 | CMD | LEN | DATA (0..16 bytes) | 0x03 | CHK
//! ```
//!
//! - [`frame`] builds envelopes ([`encode_frame`]).
//! - [`parser`] takes raw chunks and finds complete, valid envelopes in them
//!   ([`FrameParser`]).
//! - [`checksum`] is the one-byte integrity check both sides compute.
//! - [`command`] names the command bytes the firmware understands.

pub mod checksum;
pub mod command;
pub mod frame;
pub mod parser;

pub use checksum::checksum;
pub use command::{Command, DeviceStatus, ProtocolError, ToggleMode, UfnMapping, UfnReply};
pub use frame::{encode_frame, Frame, ETX, MAX_DATA_LEN, MAX_FRAME_LEN, STX};
pub use parser::{FrameParser, ParseStage};
