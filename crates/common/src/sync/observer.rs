//! Service-scoped publish/subscribe
//!
//! Each service (offline queue, sync manager) owns its own [`Subscribers`]
//! list; consumers subscribe to the instance they were handed instead of a
//! process-wide event bus.
//!
//! Notification takes a snapshot of the listener list and releases the lock
//! before calling listeners, so a listener may subscribe or unsubscribe from
//! inside a callback. A listener added during a notification is first called
//! on the next one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Typed listener list.
pub struct Subscribers<E> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Self { listeners: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Register `listener`; it is called synchronously on every notification.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Listener<E>> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Drop every listener (service teardown).
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("listeners", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn notifies_every_listener() {
        let subs = Subscribers::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            subs.subscribe(move |n| {
                total.fetch_add(*n as usize, Ordering::SeqCst);
            });
        }

        subs.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subs = Subscribers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = subs.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subs.notify(&());
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        subs.notify(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(subs.is_empty());
    }

    #[test]
    fn listener_may_subscribe_during_notification() {
        let subs = Arc::new(Subscribers::<()>::new());
        let inner = Arc::clone(&subs);
        subs.subscribe(move |()| {
            inner.subscribe(|()| {});
        });

        subs.notify(&());
        assert_eq!(subs.len(), 2);
    }
}
