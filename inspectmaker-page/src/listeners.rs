//! Named listener tables with exact add/remove pairing.
//!
//! A listener is identified by the `(event name, ListenerId)` pair it was
//! registered with, mirroring `addEventListener` / `removeEventListener`.
//! Dispatch snapshots the matching callbacks before invoking them, so a
//! callback may add or remove listeners (including itself) while running.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Callback invoked for every dispatched event of the registered name.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: ListenerId,
    name: String,
    callback: Callback<E>,
}

/// A set of listeners keyed by event name.
pub struct ListenerSet<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<E>>>,
}

impl<E> ListenerSet<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback` for events named `name`.
    pub fn add(&self, name: &str, callback: Callback<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(Entry {
            id,
            name: name.to_string(),
            callback,
        });
        id
    }

    /// Remove the listener registered as `(name, id)`.
    ///
    /// Returns `false` when no such pair exists; a wrong name never removes
    /// a listener registered under another one.
    pub fn remove(&self, name: &str, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| !(entry.id == id && entry.name == name));
        entries.len() != before
    }

    /// Invoke every listener registered for `name`. Returns how many ran.
    pub fn dispatch(&self, name: &str, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    /// Number of listeners registered for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.name == name)
            .count()
    }

    /// Number of listeners across all names.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<E> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback<u32>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (
            hits,
            Arc::new(move |_: &u32| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_dispatch_only_reaches_matching_name() {
        let set = ListenerSet::new();
        let (clicks, on_click) = counter();
        let (keys, on_key) = counter();
        set.add("click", on_click);
        set.add("keydown", on_key);

        assert_eq!(set.dispatch("click", &0), 1);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(keys.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_requires_exact_pair() {
        let set = ListenerSet::new();
        let (_, cb) = counter();
        let id = set.add("ready", cb);

        assert!(!set.remove("custom:ready", id));
        assert_eq!(set.count("ready"), 1);
        assert!(set.remove("ready", id));
        assert!(set.is_empty());
        assert!(!set.remove("ready", id));
    }

    #[test]
    fn test_listener_may_remove_itself_during_dispatch() {
        let set = Arc::new(ListenerSet::<u32>::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let (set2, slot2) = (Arc::clone(&set), Arc::clone(&slot));
        let id = set.add(
            "once",
            Arc::new(move |_| {
                if let Some(id) = *slot2.lock() {
                    set2.remove("once", id);
                }
            }),
        );
        *slot.lock() = Some(id);

        assert_eq!(set.dispatch("once", &1), 1);
        assert_eq!(set.dispatch("once", &2), 0);
    }
}
