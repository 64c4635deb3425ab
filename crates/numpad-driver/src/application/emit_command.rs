//! Single-flight command emission.
//!
//! The keypad's serial link has no flow control and no request ids, so the
//! host keeps at most one outgoing frame in flight.  [`CommandEmitter`] is a
//! capacity-1 gate in front of the transport: a submission waits for the
//! gate, writes its frame, and releases the gate when it returns (whether the
//! write succeeded or not).
//!
//! Waiting for the gate also watches the driver's cancellation token, so a
//! submission queued behind a slow write fails promptly with
//! [`EmitError::Cancelled`] when the driver shuts down.  Submissions never
//! wait for the device's reply.

use std::sync::Arc;

use numpad_core::protocol::command::{Command, CMD_NOP};
use numpad_core::protocol::encode_frame;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::infrastructure::transport::{Transport, TransportError};

/// Why a submission did not reach the transport (or failed there).
#[derive(Debug, Error)]
pub enum EmitError {
    /// The driver was torn down before the gate was acquired.
    #[error("submission cancelled: driver is shutting down")]
    Cancelled,

    /// The gate was closed; the emitter accepts no more submissions.
    #[error("command emitter is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Serializes frame writes to one transport.
pub struct CommandEmitter {
    transport: Arc<dyn Transport>,
    gate: Semaphore,
    cancel: CancellationToken,
}

impl CommandEmitter {
    /// Creates an emitter writing to `transport`, cancelled by `cancel`.
    pub fn new(transport: Arc<dyn Transport>, cancel: CancellationToken) -> Self {
        Self {
            transport,
            gate: Semaphore::new(1),
            cancel,
        }
    }

    /// Frames `data` under `command` and writes it.
    ///
    /// Data longer than 16 bytes is truncated.  Returns once the transport
    /// accepted the frame; no reply is awaited.
    ///
    /// # Errors
    ///
    /// - [`EmitError::Cancelled`] if the token fires before the gate is held.
    /// - [`EmitError::Closed`] after [`close`](Self::close).
    /// - [`EmitError::Transport`] if the write itself fails.
    pub async fn submit(&self, command: u8, data: &[u8]) -> Result<(), EmitError> {
        if self.cancel.is_cancelled() {
            return Err(EmitError::Cancelled);
        }

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(EmitError::Cancelled),
            permit = self.gate.acquire() => permit.map_err(|_| EmitError::Closed)?,
        };

        let frame = encode_frame(command, data);
        trace!(command, len = frame.len(), "writing frame");
        self.transport.write(&frame).await?;
        Ok(())
    }

    /// Sends an empty NOP frame.
    pub async fn ping(&self) -> Result<(), EmitError> {
        self.submit(CMD_NOP, &[]).await
    }

    /// Sends a typed firmware command.
    pub async fn send(&self, command: &Command) -> Result<(), EmitError> {
        self.submit(command.code(), &command.payload()).await
    }

    /// Closes the gate.  Waiting and future submissions fail with
    /// [`EmitError::Closed`]; a write already in progress completes.
    pub fn close(&self) {
        self.gate.close();
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }
}
