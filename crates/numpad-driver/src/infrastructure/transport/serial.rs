//! `tokio-serial` backed transport.
//!
//! Opening the port splits the stream into two tasks:
//!
//! - a **reader** that forwards every chunk it reads as
//!   [`TransportEvent::Received`] and reports end-of-stream or an I/O error
//!   as a single [`TransportEvent::Failed`];
//! - a **writer** that owns the write half and services write requests one at
//!   a time, answering each over a oneshot channel.
//!
//! Both tasks watch a cancellation token that belongs to the open port, so
//! [`SerialTransport::close`] stops them without waiting for the next byte.

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use numpad_core::domain::{Parity, SerialSettings, StopBits};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_serial::{DataBits, FlowControl, SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY};
use crate::application::events::lock;

/// Size of one read from the port.  Frames are at most 21 bytes.
const READ_CHUNK: usize = 256;

type WriteRequest = (Vec<u8>, oneshot::Sender<io::Result<()>>);

/// Handles to the tasks of an open port.
struct Connection {
    writes: mpsc::Sender<WriteRequest>,
    stop: CancellationToken,
}

/// Serial port transport configured from [`SerialSettings`].
pub struct SerialTransport {
    settings: SerialSettings,
    connection: Mutex<Option<Connection>>,
}

/// Line parameters in `tokio-serial` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub data_bits: DataBits,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
}

/// Translates `settings` into `tokio-serial` line parameters.
///
/// # Errors
///
/// [`TransportError::Unsupported`] for data bits outside 5..=8, mark or
/// space parity, and stop bits `none` or `one_point_five`.
pub fn line_config(settings: &SerialSettings) -> Result<LineConfig, TransportError> {
    let data_bits = match settings.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => {
            return Err(TransportError::Unsupported(format!(
                "data_bits must be one of 5, 6, 7, 8 (got {other})"
            )))
        }
    };
    let parity = match settings.parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
        other => {
            return Err(TransportError::Unsupported(format!(
                "parity must be none, odd or even (got {other:?})"
            )))
        }
    };
    let stop_bits = match settings.stop_bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
        other => {
            return Err(TransportError::Unsupported(format!(
                "stop_bits must be one or two (got {other:?})"
            )))
        }
    };
    Ok(LineConfig {
        data_bits,
        parity,
        stop_bits,
    })
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            connection: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        lock(&self.connection).is_some()
    }

    fn open_stream(&self) -> Result<SerialStream, TransportError> {
        let line = line_config(&self.settings)?;
        tokio_serial::new(self.settings.port.as_str(), self.settings.baud_rate)
            .data_bits(line.data_bits)
            .parity(line.parity)
            .stop_bits(line.stop_bits)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::Open {
                port: self.settings.port.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn open(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let mut connection = lock(&self.connection);
        if connection.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let stream = self.open_stream()?;
        let (read_half, write_half) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (write_tx, write_rx) = mpsc::channel::<WriteRequest>(1);
        let stop = CancellationToken::new();

        tokio::spawn(read_loop(
            read_half,
            event_tx,
            stop.clone(),
            self.settings.port.clone(),
        ));
        tokio::spawn(write_loop(write_half, write_rx, stop.clone()));

        info!(
            port = %self.settings.port,
            baud_rate = self.settings.baud_rate,
            "serial port opened"
        );
        *connection = Some(Connection {
            writes: write_tx,
            stop,
        });
        Ok(event_rx)
    }

    async fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        let writes = lock(&self.connection)
            .as_ref()
            .map(|c| c.writes.clone())
            .ok_or(TransportError::NotOpen)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        writes
            .send((frame.to_vec(), reply_tx))
            .await
            .map_err(|_| TransportError::NotOpen)?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(e)),
            // Writer stopped before answering.
            Err(_) => Err(TransportError::NotOpen),
        }
    }

    fn close(&self) -> Result<(), TransportError> {
        if let Some(connection) = lock(&self.connection).take() {
            connection.stop.cancel();
            info!(port = %self.settings.port, "serial port closed");
        }
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Some(connection) = lock(&self.connection).take() {
            connection.stop.cancel();
        }
    }
}

// ── Port tasks ────────────────────────────────────────────────────────────────

async fn read_loop(
    mut reader: tokio::io::ReadHalf<SerialStream>,
    events: mpsc::Sender<TransportEvent>,
    stop: CancellationToken,
    port: String,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            result = reader.read(&mut buf) => match result {
                Ok(0) => TransportEvent::Failed("end of stream".to_string()),
                Ok(n) => TransportEvent::Received(buf[..n].to_vec()),
                Err(e) => TransportEvent::Failed(e.to_string()),
            },
        };

        let failed = matches!(event, TransportEvent::Failed(_));
        if let TransportEvent::Failed(reason) = &event {
            warn!(%port, %reason, "serial read failed");
        }
        if events.send(event).await.is_err() || failed {
            break;
        }
    }
    debug!(%port, "serial reader stopped");
}

async fn write_loop(
    mut writer: tokio::io::WriteHalf<SerialStream>,
    mut requests: mpsc::Receiver<WriteRequest>,
    stop: CancellationToken,
) {
    loop {
        let (bytes, reply) = tokio::select! {
            _ = stop.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        // The submitter may have been cancelled meanwhile.
        let _ = reply.send(result);
    }
    debug!("serial writer stopped");
}
