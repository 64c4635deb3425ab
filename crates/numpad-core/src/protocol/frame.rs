//! Frame construction.
//!
//! Wire format:
//! ```text
//! [STX:1][cmd:1][len:1][data:len][ETX:1][chk:1]
//! ```
//! `STX` is `0x02`, `ETX` is `0x03`, `len` is at most [`MAX_DATA_LEN`] and
//! `chk` is the [`checksum`] of every byte from `STX` through `ETX`.
//!
//! The smallest frame (no data) is 5 bytes, the largest is 21 bytes.

use super::checksum::checksum;

/// Start-of-frame marker.
pub const STX: u8 = 0x02;

/// End-of-frame marker.
pub const ETX: u8 = 0x03;

/// Maximum number of data bytes carried by one frame.
pub const MAX_DATA_LEN: usize = 16;

/// Bytes a frame adds around its data: STX, CMD, LEN, ETX and CHK.
pub const FRAME_OVERHEAD: usize = 5;

/// Largest possible encoded frame.
pub const MAX_FRAME_LEN: usize = FRAME_OVERHEAD + MAX_DATA_LEN;

/// One protocol message: a command byte and up to 16 data bytes.
///
/// Frames produced by the parser have already passed the `ETX` and checksum
/// checks; frames built with [`Frame::new`] are valid by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Command byte.
    pub command: u8,
    /// Data bytes, never longer than [`MAX_DATA_LEN`].
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a frame, silently truncating `data` to its first 16 bytes.
    pub fn new(command: u8, data: &[u8]) -> Self {
        let len = data.len().min(MAX_DATA_LEN);
        Self {
            command,
            data: data[..len].to_vec(),
        }
    }

    /// Creates a frame with no data bytes.
    pub fn empty(command: u8) -> Self {
        Self {
            command,
            data: Vec::new(),
        }
    }

    /// Encodes the frame into its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.command, &self.data)
    }
}

/// Builds the wire bytes for `command` and `data`.
///
/// Data longer than 16 bytes is truncated to its first 16 bytes and `LEN`
/// reflects the truncated length.  Construction cannot fail.
///
/// # Examples
///
/// ```rust
/// use numpad_core::protocol::encode_frame;
///
/// let bytes = encode_frame(0x00, &[]);
/// assert_eq!(bytes, vec![0x02, 0x00, 0x00, 0x03, 0x05]);
/// ```
pub fn encode_frame(command: u8, data: &[u8]) -> Vec<u8> {
    let data = &data[..data.len().min(MAX_DATA_LEN)];

    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + data.len());
    buf.push(STX);
    buf.push(command);
    buf.push(data.len() as u8);
    buf.extend_from_slice(data);
    buf.push(ETX);

    let chk = checksum(&buf);
    buf.push(chk);
    buf
}
