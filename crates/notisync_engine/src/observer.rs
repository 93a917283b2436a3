//! Observer lists with per-listener fault isolation.
//!
//! Both the transport supervisor (decoded push events, connection state)
//! and the notification store ("store changed") fan out through an
//! [`ObserverList`]. A listener that panics is logged and skipped; the
//! remaining listeners still receive the event and the owner's state is
//! left untouched.

use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Handle returned by [`ObserverList::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A thread-safe list of callbacks.
pub struct ObserverList<T> {
    observers: RwLock<Vec<(ObserverId, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> ObserverList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback.
    pub fn add(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Unregisters a callback. Returns false if `id` was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Returns true if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Delivers `event` to every callback exactly once.
    ///
    /// Callbacks run on the caller's thread, outside the list's lock, so they
    /// may add or remove observers. Returns the number of callbacks that
    /// completed without panicking.
    pub fn notify(&self, event: &T) -> usize {
        let snapshot: Vec<(ObserverId, Callback<T>)> = self.observers.read().clone();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(observer = id.0, "observer panicked; continuing fan-out"),
            }
        }
        delivered
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn delivers_to_every_observer_once() {
        let list = ObserverList::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            list.add(move |value: &u32| seen.lock().push((tag, *value)));
        }

        assert_eq!(list.notify(&7), 3);
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let list = ObserverList::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        list.add(move |value: &u32| first.lock().push(*value));
        list.add(|_: &u32| panic!("listener bug"));
        let last = Arc::clone(&seen);
        list.add(move |value: &u32| last.lock().push(*value * 10));

        assert_eq!(list.notify(&1), 2);
        assert_eq!(list.notify(&2), 2);
        assert_eq!(*seen.lock(), vec![1, 10, 2, 20]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn remove_unsubscribes() {
        let list = ObserverList::<u32>::new();
        let count = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&count);
        let id = list.add(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        list.notify(&0);
        assert!(list.remove(id));
        assert!(!list.remove(id));
        list.notify(&0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn observers_may_unsubscribe_during_fan_out() {
        let list = Arc::new(ObserverList::<u32>::new());
        let slot: Arc<Mutex<Option<ObserverId>>> = Arc::new(Mutex::new(None));

        let list_ref = Arc::clone(&list);
        let slot_ref = Arc::clone(&slot);
        let id = list.add(move |_: &u32| {
            if let Some(id) = slot_ref.lock().take() {
                list_ref.remove(id);
            }
        });
        *slot.lock() = Some(id);

        assert_eq!(list.notify(&0), 1);
        assert!(list.is_empty());
    }
}
