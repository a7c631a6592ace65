use std::sync::{atomic::{AtomicU64, AtomicU8, Ordering}, Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use crate::session::SessionEvent;

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// External subscribers of a session, notified in subscription order.
///
/// Callbacks run without the observer list locked, so an observer may subscribe,
/// unsubscribe or cancel the session from inside its callback. Each delivery
/// holds a reentrant gate that the final event also takes, so once the final
/// event is delivered no other thread is still inside a callback.
#[derive(Default)]
pub(crate) struct ObserverSet {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    observers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
    status: AtomicU8,
    delivery: ReentrantMutex<()>,
}

impl Inner {
    fn is_open(&self) -> bool {
        self.status.load(Ordering::Acquire) == OPEN
    }

    fn remove(&self, id: u64) {
        self.observers.lock().retain(|(observer_id, _)| *observer_id != id);
    }

    fn snapshot(&self) -> Vec<Callback> {
        self.observers.lock().iter().map(|(_, callback)| callback.clone()).collect()
    }
}

impl ObserverSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, callback: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            set: Arc::downgrade(&self.inner),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// Delivers `event` unless the set has started closing. Delivery stops
    /// midway if a callback closes the set.
    pub(crate) fn emit(&self, event: &SessionEvent) {
        for callback in self.inner.snapshot() {
            let _gate = self.inner.delivery.lock();
            if !self.inner.is_open() {
                return;
            }
            callback(event);
        }
    }

    /// Delivers `event` as the last one and closes the set. Only the first call has any effect.
    pub(crate) fn emit_final(&self, event: &SessionEvent) {
        let _gate = self.inner.delivery.lock();
        if self.inner.status.compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }

        for callback in self.inner.snapshot() {
            callback(event);
        }

        self.inner.status.store(CLOSED, Ordering::Release);
    }
}

/// Keeps an observer registered. Dropping it (or calling `dispose`) unregisters the observer.
#[must_use = "the observer is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    set: Weak<Inner>,
}

impl Subscription {
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}
