//! Patchable page globals.
//!
//! A [`GlobalSlot`] stands in for a writable global such as
//! `window.XMLHttpRequest` or `history.pushState`: page code always calls
//! whatever is currently installed, and the native value is kept aside so the
//! slot can be put back exactly as it was.

use std::sync::Arc;

use parking_lot::Mutex;

pub struct GlobalSlot<T: ?Sized> {
    original: Arc<T>,
    current: Mutex<Arc<T>>,
}

impl<T: ?Sized> GlobalSlot<T> {
    pub fn new(original: Arc<T>) -> Self {
        Self {
            current: Mutex::new(Arc::clone(&original)),
            original,
        }
    }

    /// The value page code sees right now.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.current.lock())
    }

    /// The native value the slot was created with.
    pub fn original(&self) -> Arc<T> {
        Arc::clone(&self.original)
    }

    /// Install `value`, returning the value it replaced.
    pub fn replace(&self, value: Arc<T>) -> Arc<T> {
        std::mem::replace(&mut *self.current.lock(), value)
    }

    /// Put the native value back.
    pub fn restore(&self) {
        *self.current.lock() = Arc::clone(&self.original);
    }

    /// Whether something other than the native value is installed.
    pub fn is_patched(&self) -> bool {
        !Arc::ptr_eq(&self.current.lock(), &self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Native;
    impl Greeter for Native {
        fn greet(&self) -> &'static str {
            "native"
        }
    }

    struct Patched;
    impl Greeter for Patched {
        fn greet(&self) -> &'static str {
            "patched"
        }
    }

    #[test]
    fn test_replace_and_restore() {
        let slot: GlobalSlot<dyn Greeter> = GlobalSlot::new(Arc::new(Native));
        assert!(!slot.is_patched());

        let previous = slot.replace(Arc::new(Patched));
        assert_eq!(previous.greet(), "native");
        assert_eq!(slot.get().greet(), "patched");
        assert!(slot.is_patched());

        slot.restore();
        assert_eq!(slot.get().greet(), "native");
        assert!(!slot.is_patched());
    }
}
