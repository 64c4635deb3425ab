//! Key state tracking.
//!
//! Consumes decoded frames, keeps the last reported state of every key and
//! republishes key notifications as typed [`KeyEvent`]s.
//!
//! Key ids and states are not validated: whatever the firmware reports is
//! stored, including ids outside the known table (`Key::Unknown`).  Entries
//! are never removed; a key that has not been reported yet has no entry.

use std::collections::HashMap;
use std::sync::Mutex;

use numpad_core::keys::{Key, KeyEvent, KeyState};
use numpad_core::protocol::Frame;
use tracing::debug;

use super::events::{lock, EventHub, Subscription};

/// Last known state per key, plus the key-event stream.
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    states: Mutex<HashMap<Key, KeyState>>,
    events: EventHub<KeyEvent>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded frame.
    ///
    /// Returns the event when the frame was a key notification (command
    /// `0xFE` with at least two data bytes); every other frame is ignored and
    /// yields `None`.  Subscribers are notified after the map is updated and
    /// its lock released.
    pub fn handle_frame(&self, frame: &Frame) -> Option<KeyEvent> {
        let event = KeyEvent::from_frame(frame)?;

        lock(&self.states).insert(event.key, event.state);
        debug!(key = %event.key, state = ?event.state, "key state changed");

        self.events.publish(&event);
        Some(event)
    }

    /// Last reported state of `key`, if it has been reported at all.
    pub fn state_of(&self, key: Key) -> Option<KeyState> {
        lock(&self.states).get(&key).copied()
    }

    /// Copy of the whole key state map.
    pub fn snapshot(&self) -> HashMap<Key, KeyState> {
        lock(&self.states).clone()
    }

    /// Keys currently down (`Rise` or `High`), sorted by id.
    pub fn pressed(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = lock(&self.states)
            .iter()
            .filter(|(_, state)| state.is_down())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }
}
