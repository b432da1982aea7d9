//! The browser's native "execute code in page" capability.

/// Shape of the native API a page exposes to the isolated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeApi {
    /// Promise-based call under the `browser.*` namespace.
    Promise,
    /// Callback-based call under `chrome.*`, keyed by the active tab id.
    /// `None` means the tab could not be resolved.
    Callback { tab_id: Option<i64> },
}

impl NativeApi {
    pub fn is_promise_based(&self) -> bool {
        matches!(self, Self::Promise)
    }
}
