//! Application layer of the keypad driver.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the wire protocol in `numpad_core`
//! (pure byte handling, no I/O) and the infrastructure (serial ports, USB
//! enumeration, files).  Code here:
//!
//! - **Orchestrates** the protocol types to fulfil a goal, e.g. "tell me
//!   whenever a key changes state".
//! - **Depends on seams** such as the `Transport` trait, so tests can run the
//!   whole driver against an in-memory transport.
//!
//! # Sub-modules
//!
//! - **`driver`**       – `KeypadDriver`, which owns one open port and ties
//!   everything below together.
//! - **`emit_command`** – Serializes outgoing frames, one write at a time.
//! - **`track_keys`**   – Remembers the last state of every key and publishes
//!   changes.
//! - **`events`**       – The small publish/subscribe hub the others share.

pub mod driver;
pub mod emit_command;
pub mod events;
pub mod track_keys;
