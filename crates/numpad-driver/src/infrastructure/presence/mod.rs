//! Device presence monitoring.
//!
//! Serial port APIs do not tell an open handle that its USB device was
//! unplugged; reads may simply stall.  The presence monitor polls the port
//! list instead and tells interested drivers when their port appears or
//! disappears.
//!
//! # One thread for everyone
//!
//! A [`PresenceMonitor`] owns a registry of `port name → callbacks` and one
//! background thread (`numpad-presence`) that serves all of them.  The thread
//! starts with the first subscription and exits on the first tick that finds
//! the registry empty; a later subscription starts it again.
//!
//! Each tick:
//!
//! 1. stop if nobody is subscribed;
//! 2. enumerate ports (on failure, log and skip the tick);
//! 3. diff the port names against the previous tick;
//! 4. copy the callbacks of every changed port under the lock;
//! 5. invoke insertion callbacks, then removal callbacks, outside the lock.
//!
//! Callbacks therefore run on the monitor thread and must not block for long.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use numpad_core::domain::DeviceInfo;
use tracing::{debug, error, warn};

use crate::application::events::{lock, Subscription};

pub mod enumerator;
pub mod mock;

pub use enumerator::{DeviceEnumerator, EnumerationError, SystemEnumerator};

/// Time between two enumerations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to a watched port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceChange {
    Inserted,
    Removed,
}

/// Port names that appeared and disappeared between two enumerations, each
/// sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDelta {
    pub inserted: Vec<String>,
    pub removed: Vec<String>,
}

impl PortDelta {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Symmetric difference of two port name sets.
pub fn diff_ports(previous: &HashSet<String>, current: &HashSet<String>) -> PortDelta {
    let mut inserted: Vec<String> = current.difference(previous).cloned().collect();
    let mut removed: Vec<String> = previous.difference(current).cloned().collect();
    inserted.sort();
    removed.sort();
    PortDelta { inserted, removed }
}

type PresenceCallback = Arc<dyn Fn(&str, PresenceChange) + Send + Sync>;

#[derive(Default)]
struct Registry {
    subscribers: HashMap<String, Vec<(u64, PresenceCallback)>>,
    next_id: u64,
    running: bool,
}

struct MonitorInner {
    enumerator: Arc<dyn DeviceEnumerator>,
    interval: Duration,
    registry: Mutex<Registry>,
}

impl MonitorInner {
    fn unsubscribe(&self, port: &str, id: u64) {
        let removed = {
            let mut registry = lock(&self.registry);
            let Some(callbacks) = registry.subscribers.get_mut(port) else {
                return;
            };
            let removed = callbacks
                .iter()
                .position(|(cid, _)| *cid == id)
                .map(|i| callbacks.remove(i));
            if callbacks.is_empty() {
                registry.subscribers.remove(port);
            }
            removed
        };
        drop(removed);
    }

    fn callbacks_for(&self, ports: &[String]) -> Vec<(String, Vec<PresenceCallback>)> {
        let registry = lock(&self.registry);
        ports
            .iter()
            .filter_map(|port| {
                registry.subscribers.get(port).map(|cbs| {
                    let cbs = cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect();
                    (port.clone(), cbs)
                })
            })
            .collect()
    }
}

/// Shared presence monitor handle.
///
/// Construct one per process and hand clones to every driver.
#[derive(Clone)]
pub struct PresenceMonitor {
    inner: Arc<MonitorInner>,
}

impl PresenceMonitor {
    /// Creates a monitor polling `enumerator` every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>) -> Self {
        Self::with_interval(enumerator, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(enumerator: Arc<dyn DeviceEnumerator>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                enumerator,
                interval,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Monitor backed by the host's serial port list.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemEnumerator))
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Enumerates ports once, outside the polling loop.
    pub fn enumerate(&self) -> Result<Vec<DeviceInfo>, EnumerationError> {
        self.inner.enumerator.enumerate()
    }

    /// Calls `callback` whenever `port` appears or disappears, until the
    /// returned [`Subscription`] is dropped.
    ///
    /// Starts the polling thread if it is not running.
    #[must_use = "dropping the subscription stops monitoring immediately"]
    pub fn subscribe<F>(&self, port: &str, callback: F) -> Subscription
    where
        F: Fn(&str, PresenceChange) + Send + Sync + 'static,
    {
        let (id, start) = {
            let mut registry = lock(&self.inner.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .subscribers
                .entry(port.to_string())
                .or_default()
                .push((id, Arc::new(callback)));
            let start = !registry.running;
            registry.running = true;
            (id, start)
        };

        if start {
            self.spawn_loop();
        }
        debug!(%port, "presence subscription added");

        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let port = port.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(&port, id);
                debug!(%port, "presence subscription removed");
            }
        })
    }

    /// Total number of live subscriptions across all ports.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.registry)
            .subscribers
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Whether the polling thread is running (or about to start).
    pub fn is_running(&self) -> bool {
        lock(&self.inner.registry).running
    }

    /// Runs one tick against `known`, the port set seen by the previous tick.
    ///
    /// Returns `false` when the registry was empty and the loop should stop;
    /// `running` has been cleared in that case.
    pub fn poll_once(&self, known: &mut HashSet<String>) -> bool {
        {
            let mut registry = lock(&self.inner.registry);
            if registry.subscribers.is_empty() {
                registry.running = false;
                return false;
            }
        }

        let current: HashSet<String> = match self.inner.enumerator.enumerate() {
            Ok(devices) => devices.into_iter().map(|d| d.port_name).collect(),
            Err(e) => {
                warn!("presence tick skipped: {e}");
                return true;
            }
        };

        let delta = diff_ports(known, &current);
        *known = current;
        if delta.is_empty() {
            return true;
        }
        debug!(inserted = ?delta.inserted, removed = ?delta.removed, "serial ports changed");

        let inserted = self.inner.callbacks_for(&delta.inserted);
        let removed = self.inner.callbacks_for(&delta.removed);

        for (port, callbacks) in inserted {
            for callback in callbacks {
                callback(&port, PresenceChange::Inserted);
            }
        }
        for (port, callbacks) in removed {
            for callback in callbacks {
                callback(&port, PresenceChange::Removed);
            }
        }
        true
    }

    fn spawn_loop(&self) {
        let monitor = self.clone();
        let spawned = thread::Builder::new()
            .name("numpad-presence".to_string())
            .spawn(move || {
                let mut known = HashSet::new();
                loop {
                    thread::sleep(monitor.inner.interval);
                    if !monitor.poll_once(&mut known) {
                        break;
                    }
                }
                debug!("presence monitor stopped");
            });

        if let Err(e) = spawned {
            error!("failed to spawn presence monitor thread: {e}");
            lock(&self.inner.registry).running = false;
        }
    }
}

impl std::fmt::Debug for PresenceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceMonitor")
            .field("interval", &self.inner.interval)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
