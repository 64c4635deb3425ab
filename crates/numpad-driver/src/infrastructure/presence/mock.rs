//! Settable enumerator for integration tests.
//!
//! Unlike a `mockall` mock, a [`FakeEnumerator`] can be shared with the
//! presence thread and changed while it runs: plug and unplug devices by
//! editing the list.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use numpad_core::domain::DeviceInfo;

use super::enumerator::{DeviceEnumerator, EnumerationError};
use crate::application::events::lock;

#[derive(Debug, Default)]
pub struct FakeEnumerator {
    devices: Mutex<Vec<DeviceInfo>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        let fake = Self::new();
        fake.set_devices(devices);
        fake
    }

    /// Replaces the attached device list.
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *lock(&self.devices) = devices;
    }

    /// Simulates plugging in `device`.
    pub fn plug(&self, device: DeviceInfo) {
        lock(&self.devices).push(device);
    }

    /// Simulates unplugging the device on `port_name`.
    pub fn unplug(&self, port_name: &str) {
        lock(&self.devices).retain(|d| d.port_name != port_name);
    }

    /// While set, every enumeration fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeviceEnumerator for FakeEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, EnumerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EnumerationError::Platform("simulated failure".to_string()));
        }
        Ok(lock(&self.devices).clone())
    }
}
