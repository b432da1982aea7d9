//! The actual page patches installed by the interceptor registries.

use std::sync::Arc;

use inspectmaker_page::{Page, RequestFactory, StateMethod, XhrCompletion, XhrRequest};
use serde_json::Value;

use super::interceptor::{Dispatcher, RestoreFn};

/// Which navigation-state method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

/// A programmatic history change, reported after the native call completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryChange {
    pub method: HistoryMethod,
    pub url: String,
}

/// `XMLHttpRequest` replacement: every request it opens reports its
/// completion to the dispatcher.
struct InterceptingRequestFactory {
    inner: Arc<dyn RequestFactory>,
    dispatcher: Dispatcher<XhrCompletion>,
}

impl RequestFactory for InterceptingRequestFactory {
    fn open(&self, method: &str, url: &str) -> XhrRequest {
        let mut request = self.inner.open(method, url);
        let dispatcher = self.dispatcher.clone();
        request.add_load_listener(move |completion| dispatcher.dispatch(completion));
        request
    }
}

/// `pushState` / `replaceState` replacement: calls through, then reports.
struct InterceptingStateMethod {
    inner: Arc<dyn StateMethod>,
    method: HistoryMethod,
    dispatcher: Dispatcher<HistoryChange>,
}

impl StateMethod for InterceptingStateMethod {
    fn call(&self, page: &Page, state: Value, url: Option<&str>) {
        self.inner.call(page, state, url);
        self.dispatcher.dispatch(&HistoryChange {
            method: self.method,
            url: page.url(),
        });
    }
}

pub(crate) fn install_network_patch(page: &Page, dispatcher: Dispatcher<XhrCompletion>) -> RestoreFn {
    let slot = page.xhr_slot();
    let previous = slot.get();
    slot.replace(Arc::new(InterceptingRequestFactory {
        inner: Arc::clone(&previous),
        dispatcher,
    }));

    let page = page.clone();
    Box::new(move || {
        page.xhr_slot().replace(previous);
    })
}

pub(crate) fn install_history_patch(page: &Page, dispatcher: Dispatcher<HistoryChange>) -> RestoreFn {
    let push_previous = page.push_state_slot().get();
    let replace_previous = page.replace_state_slot().get();
    page.push_state_slot().replace(Arc::new(InterceptingStateMethod {
        inner: Arc::clone(&push_previous),
        method: HistoryMethod::PushState,
        dispatcher: dispatcher.clone(),
    }));
    page.replace_state_slot().replace(Arc::new(InterceptingStateMethod {
        inner: Arc::clone(&replace_previous),
        method: HistoryMethod::ReplaceState,
        dispatcher,
    }));

    let page = page.clone();
    Box::new(move || {
        page.push_state_slot().replace(push_previous);
        page.replace_state_slot().replace(replace_previous);
    })
}
