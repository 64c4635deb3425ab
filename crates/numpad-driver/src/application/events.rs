//! Publish/subscribe plumbing shared by the driver and the presence monitor.
//!
//! An [`EventHub`] is a list of handlers.  [`EventHub::publish`] calls each of
//! them synchronously, on the publishing thread, in subscription order.  The
//! handler list is copied under the lock and invoked after the lock is
//! released, so a handler may subscribe, unsubscribe or publish again without
//! deadlocking.
//!
//! Every subscription is represented by a [`Subscription`] value.  Dropping it
//! removes the handler; there is no separate "unsubscribe" call to forget.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every structure guarded this way stays consistent across a panic in a
/// subscriber callback because callbacks never run under the lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct HubInner<E> {
    handlers: Mutex<Vec<(u64, Handler<E>)>>,
    next_id: AtomicU64,
}

/// Multicast event source.
///
/// Cloning an `EventHub` yields another handle to the same handler list.
pub struct EventHub<E> {
    inner: Arc<HubInner<E>>,
}

impl<E: 'static> EventHub<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `handler`; it stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.handlers).push((id, Arc::new(handler)));

        let weak: Weak<HubInner<E>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let removed = {
                    let mut handlers = lock(&inner.handlers);
                    handlers
                        .iter()
                        .position(|(hid, _)| *hid == id)
                        .map(|i| handlers.remove(i))
                };
                // Handler captures are dropped outside the lock.
                drop(removed);
            }
        })
    }

    /// Invokes every registered handler with `event`.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = lock(&self.inner.handlers)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.handlers).len()
    }
}

impl<E: 'static> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventHub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub").finish_non_exhaustive()
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// Handle that keeps a registration alive.
///
/// Dropping it runs the unregistration exactly once.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wraps `release`, which runs when the subscription is dropped.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unsubscribes now.  Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
