//! Host page model for the InspectMaker injection engine.
//!
//! A [`Page`] is one loaded document as an extension's isolated world sees
//! it: document and window events, a window message bus shared with the
//! page's own scripts, DOM mutation notifications, patchable globals
//! (`XMLHttpRequest`, `history.pushState`, `history.replaceState`), script
//! element insertion, and optionally a native "execute in page" API.
//!
//! The page's main world is a real JavaScript engine running on a dedicated
//! thread. The isolated world never calls into it directly; it can only
//! insert script elements, post window messages, or use the native API.

pub mod dom;
pub mod error;
pub mod events;
pub mod history;
pub mod listeners;
pub mod native;
pub mod network;
pub mod page;
pub mod slot;
mod world;

pub use dom::NodeSelector;
pub use error::PageError;
pub use events::{DomEvent, MessageSource, MutationRecord, WindowMessage};
pub use history::{NativePushState, NativeReplaceState, StateMethod, resolve_url};
pub use listeners::{ListenerId, ListenerSet};
pub use native::NativeApi;
pub use network::{NativeRequestFactory, RequestFactory, XhrCompletion, XhrRequest};
pub use page::{
    DEFAULT_USER_AGENT, ElementId, Page, PageBuilder, PageStats, ScriptElement, ScriptLoad,
};
pub use slot::GlobalSlot;
pub use world::Evaluation;
