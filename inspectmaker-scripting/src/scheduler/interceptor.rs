//! Reference-counted interception of patchable page globals.
//!
//! Scripts never patch a global themselves. Each one registers a subscriber
//! with the [`InterceptorRegistry`] for that capability; the registry
//! installs the real patch on the first registration and undoes it when the
//! last [`Registration`] is dropped. Disarm order therefore never matters.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Undoes an installed patch.
pub type RestoreFn = Box<dyn FnOnce() + Send>;

/// Callback receiving every intercepted event.
pub type Subscriber<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct RegistryState<E> {
    next_id: u64,
    subscribers: Vec<(u64, Subscriber<E>)>,
    restore: Option<RestoreFn>,
}

/// One registry per patched capability.
pub struct InterceptorRegistry<E> {
    capability: &'static str,
    state: Arc<Mutex<RegistryState<E>>>,
}

impl<E: 'static> InterceptorRegistry<E> {
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            state: Arc::new(Mutex::new(RegistryState {
                next_id: 1,
                subscribers: Vec::new(),
                restore: None,
            })),
        }
    }

    /// Add `subscriber`. On the first registration `install` is called with a
    /// [`Dispatcher`] to wire into the patch, and must return how to undo it.
    pub fn register<F>(&self, subscriber: Subscriber<E>, install: F) -> Registration
    where
        F: FnOnce(Dispatcher<E>) -> RestoreFn,
    {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, subscriber));
        if state.restore.is_none() {
            let dispatcher = Dispatcher {
                state: Arc::downgrade(&self.state),
            };
            state.restore = Some(install(dispatcher));
            log::debug!("Installed {} interceptor", self.capability);
        }
        drop(state);

        let shared = Arc::clone(&self.state);
        let capability = self.capability;
        Registration {
            capability,
            unregister: Some(Box::new(move || {
                let restore = {
                    let mut state = shared.lock();
                    state.subscribers.retain(|(sid, _)| *sid != id);
                    if state.subscribers.is_empty() {
                        state.restore.take()
                    } else {
                        None
                    }
                };
                if let Some(restore) = restore {
                    restore();
                    log::debug!("Restored {} interceptor", capability);
                }
            })),
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the patch is currently installed.
    pub fn is_installed(&self) -> bool {
        self.state.lock().restore.is_some()
    }
}

/// Handle the installed patch uses to reach the current subscribers.
pub struct Dispatcher<E> {
    state: Weak<Mutex<RegistryState<E>>>,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            state: Weak::clone(&self.state),
        }
    }
}

impl<E> Dispatcher<E> {
    /// Deliver `event` to every subscriber registered right now.
    pub fn dispatch(&self, event: &E) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let subscribers: Vec<Subscriber<E>> = state
            .lock()
            .subscribers
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}

/// A live subscription. Dropping it unregisters the subscriber.
pub struct Registration {
    capability: &'static str,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    pub fn capability(&self) -> &'static str {
        self.capability
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("capability", &self.capability)
            .finish()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        registry: InterceptorRegistry<u32>,
        installs: Arc<AtomicUsize>,
        restores: Arc<AtomicUsize>,
        dispatcher: Arc<Mutex<Option<Dispatcher<u32>>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                registry: InterceptorRegistry::new("test"),
                installs: Arc::new(AtomicUsize::new(0)),
                restores: Arc::new(AtomicUsize::new(0)),
                dispatcher: Arc::new(Mutex::new(None)),
            }
        }

        fn register(&self, hits: &Arc<AtomicUsize>) -> Registration {
            let h = Arc::clone(hits);
            let installs = Arc::clone(&self.installs);
            let restores = Arc::clone(&self.restores);
            let slot = Arc::clone(&self.dispatcher);
            self.registry.register(
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
                move |dispatcher| {
                    installs.fetch_add(1, Ordering::SeqCst);
                    *slot.lock() = Some(dispatcher);
                    Box::new(move || {
                        restores.fetch_add(1, Ordering::SeqCst);
                    })
                },
            )
        }

        fn fire(&self) {
            if let Some(dispatcher) = self.dispatcher.lock().clone() {
                dispatcher.dispatch(&1);
            }
        }
    }

    #[test]
    fn test_patch_installed_once_and_restored_on_last_drop() {
        let harness = Harness::new();
        let (a, b) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));

        let first = harness.register(&a);
        let second = harness.register(&b);
        assert_eq!(harness.installs.load(Ordering::SeqCst), 1);
        assert_eq!(harness.registry.len(), 2);

        drop(first);
        assert_eq!(harness.restores.load(Ordering::SeqCst), 0);
        assert!(harness.registry.is_installed());

        harness.fire();
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);

        drop(second);
        assert_eq!(harness.restores.load(Ordering::SeqCst), 1);
        assert!(!harness.registry.is_installed());
        assert!(harness.registry.is_empty());
    }

    #[test]
    fn test_reinstalls_after_full_release() {
        let harness = Harness::new();
        let hits = Arc::new(AtomicUsize::new(0));
        drop(harness.register(&hits));
        let _again = harness.register(&hits);
        assert_eq!(harness.installs.load(Ordering::SeqCst), 2);
        assert_eq!(harness.restores.load(Ordering::SeqCst), 1);
    }
}
