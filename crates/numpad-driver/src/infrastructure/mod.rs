//! Infrastructure layer for the keypad driver.
//!
//! Contains OS-facing adapters: the serial transport, USB port enumeration
//! with the presence monitor built on it, and configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `numpad_core`.  The application layer reaches in for the seams it is
//! written against (the [`transport::Transport`] trait and the
//! [`presence::PresenceMonitor`] service); the only concrete adapter it names
//! is [`transport::serial::SerialTransport`], in `KeypadDriver::open_serial`.

pub mod presence;
pub mod storage;
pub mod transport;
