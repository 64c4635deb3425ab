//! The keypad driver: one open keypad port and everything attached to it.
//!
//! # What the driver wires together (for beginners)
//!
//! ```text
//!   Transport ──events──► receive task ──► FrameParser ──► frames hub ──► KeyStateTracker ──► key hub
//!       ▲                                                      │
//!       └────── CommandEmitter ◄── ping / submit / send        └──► frame subscribers
//!
//!   PresenceMonitor ──"port removed"──► dispose()
//! ```
//!
//! - The **receive task** is the only owner of the parser, so bytes are
//!   decoded strictly in arrival order.
//! - The **emitter** lets one outgoing frame through at a time.
//! - The **presence monitor** tells the driver when its USB device is gone;
//!   serial reads alone would just stall.
//!
//! # Lifecycle
//!
//! A driver is `Active` from a successful [`KeypadDriver::open`] until its
//! first teardown trigger: an explicit [`dispose`](KeypadDriver::dispose), a
//! transport failure, a closed transport event stream, a failed write, the
//! device being unplugged, or the last `Arc` being dropped.  Teardown runs
//! exactly once and the driver is `Disposed` for good; to talk to the device
//! again, open a new driver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use numpad_core::domain::{SerialSettings, SettingsError};
use numpad_core::keys::{Key, KeyEvent, KeyState};
use numpad_core::protocol::command::Command;
use numpad_core::protocol::{Frame, FrameParser};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::emit_command::{CommandEmitter, EmitError};
use super::events::{lock, EventHub, Subscription};
use super::track_keys::KeyStateTracker;
use crate::infrastructure::presence::{PresenceChange, PresenceMonitor};
use crate::infrastructure::transport::serial::SerialTransport;
use crate::infrastructure::transport::{Transport, TransportError, TransportEvent};

/// Why a driver could not be opened.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid serial settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("failed to open transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Active,
    Disposed,
}

/// Driver for one keypad port.
pub struct KeypadDriver {
    settings: SerialSettings,
    transport: Arc<dyn Transport>,
    emitter: CommandEmitter,
    frames: EventHub<Frame>,
    keys: Arc<KeyStateTracker>,
    cancel: CancellationToken,
    /// Teardown gate.  Held for the whole teardown so concurrent callers
    /// return only once it is complete.
    disposed: Mutex<bool>,
    presence: Mutex<Option<Subscription>>,
    _key_wiring: Subscription,
}

impl KeypadDriver {
    /// Opens a driver on `transport`, watching `settings.port` through
    /// `monitor`.
    ///
    /// Must be called from within a Tokio runtime: the receive task is
    /// spawned here.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidSettings`] before anything is touched.
    /// - [`DriverError::Transport`] if the transport refuses to open; the
    ///   partially built driver has been torn down by then.
    pub fn open(
        settings: SerialSettings,
        transport: Arc<dyn Transport>,
        monitor: &PresenceMonitor,
    ) -> Result<Arc<Self>, DriverError> {
        settings.validate()?;

        let cancel = CancellationToken::new();
        let frames: EventHub<Frame> = EventHub::new();
        let keys = Arc::new(KeyStateTracker::new());
        let key_wiring = {
            let keys = Arc::clone(&keys);
            frames.subscribe(move |frame| {
                keys.handle_frame(frame);
            })
        };

        let driver = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let presence = monitor.subscribe(&settings.port, move |port, change| {
                if change != PresenceChange::Removed {
                    return;
                }
                if let Some(driver) = weak.upgrade() {
                    info!(%port, "keypad removed");
                    driver.dispose();
                }
            });

            Self {
                emitter: CommandEmitter::new(Arc::clone(&transport), cancel.clone()),
                settings,
                transport,
                frames,
                keys,
                cancel,
                disposed: Mutex::new(false),
                presence: Mutex::new(Some(presence)),
                _key_wiring: key_wiring,
            }
        });

        let events = match driver.transport.open() {
            Ok(events) => events,
            Err(e) => {
                warn!(port = %driver.settings.port, "transport open failed: {e}");
                driver.dispose();
                return Err(e.into());
            }
        };

        tokio::spawn(receive_loop(
            Arc::downgrade(&driver),
            events,
            driver.cancel.clone(),
        ));

        info!(port = %driver.settings.port, "keypad driver opened");
        Ok(driver)
    }

    /// Opens a driver on a [`SerialTransport`] built from `settings`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_serial(
        settings: SerialSettings,
        monitor: &PresenceMonitor,
    ) -> Result<Arc<Self>, DriverError> {
        let transport = Arc::new(SerialTransport::new(settings.clone()));
        Self::open(settings, transport, monitor)
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Sends an empty NOP frame.
    pub async fn ping(&self) -> Result<(), EmitError> {
        self.after_emit(self.emitter.ping().await)
    }

    /// Sends `command` with `data` (truncated to 16 bytes).
    pub async fn submit(&self, command: u8, data: &[u8]) -> Result<(), EmitError> {
        self.after_emit(self.emitter.submit(command, data).await)
    }

    /// Sends a typed firmware command.  Replies arrive on the frame stream.
    pub async fn send(&self, command: &Command) -> Result<(), EmitError> {
        self.after_emit(self.emitter.send(command).await)
    }

    fn after_emit(&self, result: Result<(), EmitError>) -> Result<(), EmitError> {
        if let Err(EmitError::Transport(e)) = &result {
            warn!(port = %self.settings.port, "write failed, closing driver: {e}");
            self.dispose();
        }
        result
    }

    // ── Events and queries ───────────────────────────────────────────────────

    /// Calls `handler` for every key state change, on the receive task.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_key_state<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        self.keys.subscribe(handler)
    }

    /// Calls `handler` for every valid frame received, key notifications
    /// and command replies alike.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_frames<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.frames.subscribe(handler)
    }

    pub fn key_state(&self, key: Key) -> Option<KeyState> {
        self.keys.state_of(key)
    }

    pub fn key_states(&self) -> HashMap<Key, KeyState> {
        self.keys.snapshot()
    }

    pub fn pressed_keys(&self) -> Vec<Key> {
        self.keys.pressed()
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn port(&self) -> &str {
        &self.settings.port
    }

    pub fn state(&self) -> DriverState {
        if self.cancel.is_cancelled() {
            DriverState::Disposed
        } else {
            DriverState::Active
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state() == DriverState::Active
    }

    /// Token cancelled when the driver is torn down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once the driver has started tearing down.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Tears the driver down.  Safe to call any number of times from any
    /// thread; only the first call does anything.
    pub fn dispose(&self) {
        let mut disposed = lock(&self.disposed);
        if *disposed {
            return;
        }
        *disposed = true;

        debug!(port = %self.settings.port, "disposing keypad driver");
        self.cancel.cancel();

        let presence = lock(&self.presence).take();
        drop(presence);

        self.emitter.close();

        if let Err(e) = self.transport.close() {
            warn!(port = %self.settings.port, "transport close failed: {e}");
        }
        info!(port = %self.settings.port, "keypad driver closed");
    }
}

impl Drop for KeypadDriver {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for KeypadDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypadDriver")
            .field("port", &self.settings.port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Feeds transport bytes through the parser and publishes frames until the
/// driver is cancelled or the transport stops.
async fn receive_loop(
    driver: Weak<KeypadDriver>,
    mut events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut parser = FrameParser::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(driver) = driver.upgrade() else {
            break;
        };

        match event {
            Some(TransportEvent::Received(bytes)) => {
                for frame in parser.push(&bytes) {
                    driver.frames.publish(&frame);
                }
            }
            Some(TransportEvent::Failed(reason)) => {
                warn!(port = %driver.port(), %reason, "transport failed");
                driver.dispose();
                break;
            }
            None => {
                warn!(port = %driver.port(), "transport event stream ended");
                driver.dispose();
                break;
            }
        }
    }
    debug!("receive task stopped");
}
