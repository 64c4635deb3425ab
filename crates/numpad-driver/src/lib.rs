//! numpad-driver library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::driver::{DriverError, DriverState, KeypadDriver};
pub use application::emit_command::EmitError;
pub use application::events::Subscription;
pub use infrastructure::presence::{PresenceChange, PresenceMonitor};
