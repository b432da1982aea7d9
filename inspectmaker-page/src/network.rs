//! The page's network request constructor.
//!
//! Page code creates requests through whatever [`RequestFactory`] currently
//! occupies the `XMLHttpRequest` slot. A wrapper factory can therefore attach
//! its own `load` listener to every request the page makes, which is how
//! request interception works in a browser.

use std::fmt;

/// Constructor for page network requests (`new XMLHttpRequest()` + `open`).
pub trait RequestFactory: Send + Sync {
    fn open(&self, method: &str, url: &str) -> XhrRequest;
}

/// The built-in constructor.
#[derive(Debug, Default)]
pub struct NativeRequestFactory;

impl RequestFactory for NativeRequestFactory {
    fn open(&self, method: &str, url: &str) -> XhrRequest {
        XhrRequest::new(method, url)
    }
}

/// Snapshot of a finished request, as a `load` listener sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhrCompletion {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_text: String,
}

type LoadListener = Box<dyn FnOnce(&XhrCompletion) + Send>;

/// An opened request waiting for its response.
pub struct XhrRequest {
    method: String,
    url: String,
    load_listeners: Vec<LoadListener>,
}

impl XhrRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            load_listeners: Vec::new(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn add_load_listener(&mut self, listener: impl FnOnce(&XhrCompletion) + Send + 'static) {
        self.load_listeners.push(Box::new(listener));
    }

    /// Deliver the response, firing `load` listeners in registration order.
    pub fn complete(self, status: u16, response_text: impl Into<String>) -> XhrCompletion {
        let completion = XhrCompletion {
            method: self.method,
            url: self.url,
            status,
            response_text: response_text.into(),
        };
        for listener in self.load_listeners {
            listener(&completion);
        }
        completion
    }
}

impl fmt::Debug for XhrRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XhrRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("load_listeners", &self.load_listeners.len())
            .finish()
    }
}
