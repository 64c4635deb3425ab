//! Incremental frame parser.
//!
//! Serial reads arrive in arbitrary pieces: one read may carry half a frame,
//! the next may carry the rest of it plus two more frames, and line noise or
//! a partially transmitted frame after a reconnect can appear anywhere.
//! [`FrameParser`] absorbs all of that.  Bytes are appended to one persistent
//! buffer and a six-stage state machine walks through it:
//!
//! ```text
//! WaitStx ─► WaitCmd ─► WaitLen ─► WaitData ─► WaitEtx ─► WaitChk
//!    ▲                                            │ bad       │ good / bad
//!    └────────────────────────────────────────────┴───────────┘
//! ```
//!
//! Each call to [`FrameParser::push`] re-runs the machine until a pass makes
//! no progress, i.e. the current stage needs bytes that have not arrived yet.
//!
//! # Resynchronisation
//!
//! A candidate that fails the `ETX` check or the checksum check is dropped
//! without a trace: the consumed prefix of the buffer is discarded and the
//! parser goes back to scanning for the next `STX`.  There is no "bad frame"
//! error; the only observable output is the list of valid frames.
//!
//! # Thread safety
//!
//! The parser is a plain `&mut self` state machine.  Exactly one owner (the
//! driver's receive task) feeds it, which is what keeps bytes in arrival
//! order.

use tracing::trace;

use super::checksum::checksum;
use super::frame::{Frame, ETX, MAX_DATA_LEN, STX};

/// The field the parser is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStage {
    /// Scanning for the start-of-frame marker.
    #[default]
    WaitStx,
    /// Next byte is the command.
    WaitCmd,
    /// Next byte is the data length.
    WaitLen,
    /// Collecting data bytes.
    WaitData,
    /// Next byte must be the end-of-frame marker.
    WaitEtx,
    /// Next byte is the checksum.
    WaitChk,
}

/// Stateful byte-stream to [`Frame`] decoder.
///
/// # Examples
///
/// ```rust
/// use numpad_core::protocol::{encode_frame, FrameParser};
///
/// let bytes = encode_frame(0xFE, &[3, 1]);
/// let mut parser = FrameParser::new();
///
/// // Half a frame produces nothing yet.
/// assert!(parser.push(&bytes[..3]).is_empty());
///
/// // The rest completes it.
/// let frames = parser.push(&bytes[3..]);
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].command, 0xFE);
/// assert_eq!(frames[0].data, vec![3, 1]);
/// ```
#[derive(Debug, Default)]
pub struct FrameParser {
    stage: ParseStage,
    /// Received bytes not yet discarded.  Only grows by [`push`](Self::push)
    /// and only shrinks by dropping a fully consumed prefix.
    buffer: Vec<u8>,
    /// Read position inside `buffer`.
    cursor: usize,
    /// Offset of the current candidate's `STX`; start of the checksum range.
    frame_start: usize,
    command: u8,
    data: Vec<u8>,
    expected_len: usize,
}

impl FrameParser {
    /// Creates a parser with an empty buffer, waiting for `STX`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stage the parser is currently in.
    pub fn stage(&self) -> ParseStage {
        self.stage
    }

    /// Number of bytes currently retained in the receive buffer.
    ///
    /// Only bytes of the in-progress candidate frame are retained; noise is
    /// dropped as soon as it has been scanned.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops all buffered bytes and returns to [`ParseStage::WaitStx`].
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Appends `bytes` to the receive buffer and returns every frame that
    /// became complete and valid, in arrival order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            let before = self.stage;
            self.step(&mut frames);
            if self.stage == before {
                break;
            }
        }
        frames
    }

    // ── State machine ────────────────────────────────────────────────────────

    fn step(&mut self, frames: &mut Vec<Frame>) {
        match self.stage {
            ParseStage::WaitStx => {
                while let Some(byte) = self.next_byte() {
                    if byte == STX {
                        self.frame_start = self.cursor - 1;
                        self.discard_before_frame_start();
                        self.stage = ParseStage::WaitCmd;
                        return;
                    }
                }
                // Everything scanned so far is noise.
                self.discard_consumed();
            }

            ParseStage::WaitCmd => {
                if let Some(command) = self.next_byte() {
                    self.command = command;
                    self.stage = ParseStage::WaitLen;
                }
            }

            ParseStage::WaitLen => {
                if let Some(len) = self.next_byte() {
                    self.expected_len = usize::from(len).min(MAX_DATA_LEN);
                    self.data = Vec::with_capacity(self.expected_len);
                    self.stage = ParseStage::WaitData;
                }
            }

            ParseStage::WaitData => {
                while self.data.len() < self.expected_len {
                    match self.next_byte() {
                        Some(byte) => self.data.push(byte),
                        None => return,
                    }
                }
                self.stage = ParseStage::WaitEtx;
            }

            ParseStage::WaitEtx => {
                if let Some(byte) = self.next_byte() {
                    if byte == ETX {
                        self.stage = ParseStage::WaitChk;
                    } else {
                        trace!(
                            command = self.command,
                            found = byte,
                            "frame candidate dropped: missing ETX"
                        );
                        self.finish_candidate();
                    }
                }
            }

            ParseStage::WaitChk => {
                if let Some(received) = self.next_byte() {
                    // Range is STX ..= ETX, i.e. everything before the byte just read.
                    let expected = checksum(&self.buffer[self.frame_start..self.cursor - 1]);
                    if received == expected {
                        frames.push(Frame {
                            command: self.command,
                            data: std::mem::take(&mut self.data),
                        });
                    } else {
                        trace!(
                            command = self.command,
                            expected,
                            received,
                            "frame candidate dropped: checksum mismatch"
                        );
                    }
                    self.finish_candidate();
                }
            }
        }
    }

    // ── Buffer helpers ───────────────────────────────────────────────────────

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.buffer.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(byte)
    }

    /// Drops scanned noise in front of the candidate's `STX`.
    fn discard_before_frame_start(&mut self) {
        if self.frame_start > 0 {
            self.buffer.drain(..self.frame_start);
            self.cursor -= self.frame_start;
            self.frame_start = 0;
        }
    }

    fn discard_consumed(&mut self) {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.frame_start = 0;
    }

    /// Ends the current candidate (accepted or not) and rescans from the
    /// first unconsumed byte.
    fn finish_candidate(&mut self) {
        self.discard_consumed();
        self.data.clear();
        self.expected_len = 0;
        self.stage = ParseStage::WaitStx;
    }
}
