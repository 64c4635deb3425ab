//! In-memory transport for tests.
//!
//! Records every write, lets tests inject received bytes and failures, and
//! can simulate a port that refuses to open, writes that fail, slow writes
//! and a close that errors.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY};
use crate::application::events::lock;

/// One entry of the write log.  A `Begin` is always followed by its `End`
/// unless another write interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMark {
    Begin(Vec<u8>),
    End(Vec<u8>),
}

/// A mock implementation of [`Transport`].
#[derive(Default)]
pub struct MockTransport {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_log: Mutex<Vec<WriteMark>>,
    write_delay: Mutex<Duration>,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `bytes` as if read from the port.  Returns `false` when the
    /// transport is not open or the receiver is gone.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        self.push_event(TransportEvent::Received(bytes.to_vec()))
    }

    /// Reports a port failure to the driver.
    pub fn inject_failure(&self, reason: &str) -> bool {
        self.push_event(TransportEvent::Failed(reason.to_string()))
    }

    /// Drops the event sender, closing the channel without a `Failed` event.
    pub fn disconnect(&self) {
        lock(&self.events).take();
    }

    fn push_event(&self, event: TransportEvent) -> bool {
        let sender = lock(&self.events).clone();
        match sender {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Every successfully written frame, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.writes).clone()
    }

    /// Begin/End marks of every write attempt.
    pub fn write_log(&self) -> Vec<WriteMark> {
        lock(&self.write_log).clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Makes every write take at least `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        *lock(&self.write_delay) = delay;
    }

    pub fn is_open(&self) -> bool {
        lock(&self.events).is_some()
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn open(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Open {
                port: "mock".to_string(),
                reason: "simulated open failure".to_string(),
            });
        }

        let mut events = lock(&self.events);
        if events.is_some() {
            return Err(TransportError::AlreadyOpen);
        }
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *events = Some(tx);
        Ok(rx)
    }

    async fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }

        lock(&self.write_log).push(WriteMark::Begin(frame.to_vec()));
        let delay = *lock(&self.write_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )))
        } else {
            lock(&self.writes).push(frame.to_vec());
            Ok(())
        };
        lock(&self.write_log).push(WriteMark::End(frame.to_vec()));
        result
    }

    fn close(&self) -> Result<(), TransportError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.events).take();
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated close failure",
            )));
        }
        Ok(())
    }
}
