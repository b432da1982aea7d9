//! Session history: `pushState`, `replaceState`, and back/forward traversal.

use serde_json::Value;

use crate::Page;

/// A `history.pushState`-shaped method. Page code always calls the one
/// currently installed in the page's slot.
pub trait StateMethod: Send + Sync {
    fn call(&self, page: &Page, state: Value, url: Option<&str>);
}

/// Native `history.pushState`.
#[derive(Debug, Default)]
pub struct NativePushState;

impl StateMethod for NativePushState {
    fn call(&self, page: &Page, state: Value, url: Option<&str>) {
        page.commit_history(HistoryOp::Push, state, url);
    }
}

/// Native `history.replaceState`.
#[derive(Debug, Default)]
pub struct NativeReplaceState;

impl StateMethod for NativeReplaceState {
    fn call(&self, page: &Page, state: Value, url: Option<&str>) {
        page.commit_history(HistoryOp::Replace, state, url);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryOp {
    Push,
    Replace,
}

#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub url: String,
    pub state: Value,
}

/// The joint session history of one document.
#[derive(Debug)]
pub(crate) struct HistoryStack {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl HistoryStack {
    pub fn new(url: &str) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: url.to_string(),
                state: Value::Null,
            }],
            index: 0,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, entry: HistoryEntry) {
        if let Some(current) = self.entries.get_mut(self.index) {
            *current = entry;
        }
    }

    /// Move by `delta` entries; `None` when that would leave the stack.
    pub fn traverse(&mut self, delta: isize) -> Option<HistoryEntry> {
        let target = self.index.checked_add_signed(delta)?;
        let entry = self.entries.get(target)?.clone();
        self.index = target;
        Some(entry)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Resolve `target` against `base` the way a URL argument to `pushState` is.
pub fn resolve_url(base: &str, target: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    let origin_end = base
        .find("://")
        .map(|scheme| {
            let rest = scheme + 3;
            base[rest..].find('/').map_or(base.len(), |slash| rest + slash)
        })
        .unwrap_or(0);
    let origin = &base[..origin_end];
    let without_fragment = base.split('#').next().unwrap_or(base);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);

    if target.starts_with('/') {
        format!("{origin}{target}")
    } else if target.starts_with('#') {
        format!("{without_fragment}{target}")
    } else if target.starts_with('?') {
        format!("{without_query}{target}")
    } else if target.is_empty() {
        without_fragment.to_string()
    } else {
        let dir_end = without_query
            .rfind('/')
            .filter(|slash| *slash >= origin_end)
            .map_or(without_query.len(), |slash| slash + 1);
        let dir = &without_query[..dir_end];
        if dir.len() == origin_end {
            format!("{dir}/{target}")
        } else {
            format!("{dir}{target}")
        }
    }
}
