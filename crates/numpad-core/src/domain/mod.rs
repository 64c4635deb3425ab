//! Domain entities: which serial ports are keypads, and how to open them.
//!
//! # What is "domain" here? (for beginners)
//!
//! Domain code holds the rules that make this driver what it is, with no
//! imports from OS APIs or async runtimes.  Enumerating ports and opening
//! them happens in `numpad-driver`'s infrastructure layer; this module only
//! decides *which* enumerated port is a keypad and *whether* a set of line
//! settings is usable.  That keeps it testable on any machine, with or
//! without a keypad plugged in.

pub mod device;
pub mod settings;

pub use device::{DeviceInfo, RecognitionInfo, ANY_PRODUCT};
pub use settings::{Parity, SerialSettings, SettingsError, StopBits};
