//! Serial line settings for a keypad port.
//!
//! The keypad is a CDC-ACM device, so the line settings are mostly
//! ceremonial: the USB link ignores baud rate and framing bits.  They are
//! still validated because the platform serial API rejects nonsense values
//! before the device ever sees them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::device::{DeviceInfo, RecognitionInfo};

/// Reason a [`SerialSettings`] value cannot be used to open a port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("port name is empty")]
    EmptyPort,

    #[error("baud rate must be positive")]
    InvalidBaudRate,

    #[error("data bits must be positive")]
    InvalidDataBits,

    #[error("stop bits must not be `none`")]
    NoStopBits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    /// Not a usable setting; rejected by [`SerialSettings::validate`].
    None,
    #[default]
    One,
    OnePointFive,
    Two,
}

/// Everything needed to open the keypad's serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub stop_bits: StopBits,
    /// Model the port was recognised as, when found by [`scan_all`](Self::scan_all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionInfo>,
}

fn default_port() -> String {
    "COM1".to_string()
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_data_bits() -> u8 {
    8
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            parity: Parity::default(),
            data_bits: default_data_bits(),
            stop_bits: StopBits::default(),
            recognition: None,
        }
    }
}

impl SerialSettings {
    /// Default settings for `port`.
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Returns default settings for every device that matches a whitelist
    /// entry, grouped by entry in whitelist order.
    pub fn scan_all(devices: &[DeviceInfo]) -> Vec<Self> {
        RecognitionInfo::whitelist()
            .into_iter()
            .flat_map(|entry| {
                devices
                    .iter()
                    .filter(|dev| dev.matches(&entry))
                    .map(|dev| Self {
                        recognition: Some(entry.clone()),
                        ..Self::for_port(dev.port_name.clone())
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Checks that the settings can be used to open a port.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in the order: empty (or whitespace)
    /// port name, stop bits `none`, zero baud rate, zero data bits.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port.trim().is_empty() {
            return Err(SettingsError::EmptyPort);
        }
        if self.stop_bits == StopBits::None {
            return Err(SettingsError::NoStopBits);
        }
        if self.baud_rate == 0 {
            return Err(SettingsError::InvalidBaudRate);
        }
        if self.data_bits == 0 {
            return Err(SettingsError::InvalidDataBits);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Compares the line parameters only; `recognition` is ignored.
    pub fn is_same(&self, other: &SerialSettings) -> bool {
        self.port == other.port
            && self.baud_rate == other.baud_rate
            && self.parity == other.parity
            && self.data_bits == other.data_bits
            && self.stop_bits == other.stop_bits
    }
}
