//! Byte transport to the keypad.
//!
//! The driver never touches a serial port directly.  It talks to a
//! [`Transport`]: open it to get a stream of [`TransportEvent`]s, write whole
//! frames to it, close it at teardown.  Production code uses
//! [`serial::SerialTransport`]; tests use [`mock::MockTransport`].
//!
//! # Push model
//!
//! `open` hands back the receiving half of a channel.  The transport pushes
//! every chunk it reads as [`TransportEvent::Received`] and a single
//! [`TransportEvent::Failed`] when the port dies.  A closed channel means the
//! transport has stopped for good.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mock;
pub mod serial;

/// Capacity of the event channel returned by [`Transport::open`].
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something the transport observed on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes, in arrival order.  Chunk boundaries carry no meaning.
    Received(Vec<u8>),
    /// The port failed; no further events follow.
    Failed(String),
}

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The OS refused to open the port.
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// A line setting has no equivalent in the serial backend.
    #[error("unsupported serial setting: {0}")]
    Unsupported(String),

    #[error("transport is not open")]
    NotOpen,

    #[error("transport is already open")]
    AlreadyOpen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Full-duplex byte pipe to one device.
///
/// Implementations must be usable from several tasks at once; the driver's
/// emitter guarantees that only one `write` is in flight at a time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the port and starts delivering events.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`TransportError::AlreadyOpen`] on a second call without `close`,
    /// [`TransportError::Unsupported`] or [`TransportError::Open`] when the
    /// port cannot be opened with the configured settings.
    fn open(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Writes one complete frame.
    async fn write(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Stops delivery and releases the port.  Closing twice is not an error.
    fn close(&self) -> Result<(), TransportError>;
}
