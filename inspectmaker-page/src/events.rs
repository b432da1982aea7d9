//! Event payloads carried by the page's listener tables.

use serde_json::Value;

/// A DOM event dispatched on the document or the window.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub name: String,
    /// `CustomEvent.detail`, `PopStateEvent.state`, or `null`.
    pub detail: Value,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }
}

/// Where a window message came from, as seen through `event.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Posted by this window (main world or isolated world).
    Window,
    /// Posted by another frame or window.
    Foreign,
}

/// A `message` event delivered on the window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    pub source: MessageSource,
    pub data: Value,
}

impl WindowMessage {
    pub fn is_from_window(&self) -> bool {
        self.source == MessageSource::Window
    }

    /// The message's `action` field, if it carries one.
    pub fn action(&self) -> Option<&str> {
        self.data.get("action").and_then(Value::as_str)
    }
}

/// One batch of `childList` mutations observed under the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationRecord {
    /// Markup of each added node, descendants included.
    pub added_nodes: Vec<String>,
}
