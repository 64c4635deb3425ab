//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML file that holds the
//! driver's log level, presence polling interval and, optionally, the serial
//! settings of a preferred keypad port.  A missing file is not an error; the
//! defaults apply.

pub mod config;
