//! Serial port enumeration.
//!
//! The presence monitor and settings discovery both need the list of USB
//! serial ports currently attached.  [`DeviceEnumerator`] is the seam; the
//! production implementation asks `serialport`, tests substitute a fake.

use numpad_core::domain::DeviceInfo;
use serialport::SerialPortType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("failed to enumerate serial ports: {0}")]
    Platform(String),
}

/// Lists the USB serial ports attached to the host.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceEnumerator: Send + Sync {
    /// Returns one entry per USB serial port.  Ports without USB identity
    /// (built-in UARTs, Bluetooth, PCI) are not reported.
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, EnumerationError>;
}

/// [`DeviceEnumerator`] backed by `serialport::available_ports`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnumerator;

impl DeviceEnumerator for SystemEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, EnumerationError> {
        let ports =
            serialport::available_ports().map_err(|e| EnumerationError::Platform(e.to_string()))?;

        Ok(ports
            .into_iter()
            .filter_map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => Some(DeviceInfo {
                    port_name: port.port_name,
                    vendor_id: format!("{:04x}", usb.vid),
                    product_id: format!("{:04x}", usb.pid),
                    caption: usb.product.unwrap_or_default(),
                }),
                _ => None,
            })
            .collect())
    }
}
