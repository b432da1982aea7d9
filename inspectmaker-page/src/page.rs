//! One document instance and everything attached to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::PageError;
use crate::events::{DomEvent, MessageSource, MutationRecord, WindowMessage};
use crate::history::{
    HistoryEntry, HistoryOp, HistoryStack, NativePushState, NativeReplaceState, StateMethod,
    resolve_url,
};
use crate::listeners::{ListenerId, ListenerSet};
use crate::native::NativeApi;
use crate::network::{NativeRequestFactory, RequestFactory, XhrRequest};
use crate::slot::GlobalSlot;
use crate::world::{Evaluation, MESSAGE_EVENT, MainWorld, WorldRequest};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const MUTATION_EVENT: &str = "childList";

/// Identifies a `<script>` element inserted into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

/// A `<script>` element to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptElement {
    /// `<script src=...>`, loaded from the page's resources.
    External { src: String },
    /// `<script>text</script>`, run on insertion.
    Inline { text: String },
}

/// Pending `load` (or `error`) of an inserted script element.
#[derive(Debug)]
pub struct ScriptLoad {
    id: ElementId,
    receiver: oneshot::Receiver<Result<(), PageError>>,
}

impl ScriptLoad {
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Resolves once the element has run, or with the reason it could not.
    pub async fn loaded(self) -> Result<(), PageError> {
        self.receiver
            .await
            .unwrap_or(Err(PageError::WorldUnavailable))
    }
}

/// Counts of everything page-side that can be attributed to listeners,
/// observers, patches and injected elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageStats {
    pub document_listeners: usize,
    pub window_listeners: usize,
    pub message_listeners: usize,
    pub mutation_observers: usize,
    pub patched_globals: usize,
    pub script_elements: usize,
}

/// Builder for [`Page`].
pub struct PageBuilder {
    url: String,
    user_agent: String,
    resources: HashMap<String, String>,
    native_api: Option<NativeApi>,
}

impl PageBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resources: HashMap::new(),
            native_api: None,
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Expose `source` to the page at `url` (a web-accessible resource).
    pub fn resource(mut self, url: impl Into<String>, source: impl Into<String>) -> Self {
        self.resources.insert(url.into(), source.into());
        self
    }

    pub fn native_api(mut self, api: NativeApi) -> Self {
        self.native_api = Some(api);
        self
    }

    pub fn build(self) -> Page {
        let messages = Arc::new(ListenerSet::new());
        let world = MainWorld::spawn(Arc::clone(&messages));
        let history = HistoryStack::new(&self.url);
        Page {
            inner: Arc::new(PageInner {
                location: RwLock::new(self.url),
                user_agent: self.user_agent,
                document: ListenerSet::new(),
                window: ListenerSet::new(),
                messages,
                observers: ListenerSet::new(),
                xhr: GlobalSlot::new(Arc::new(NativeRequestFactory)),
                push_state: GlobalSlot::new(Arc::new(NativePushState)),
                replace_state: GlobalSlot::new(Arc::new(NativeReplaceState)),
                history: Mutex::new(history),
                scripts: Mutex::new(HashMap::new()),
                next_element: AtomicU64::new(1),
                resources: self.resources,
                native_api: self.native_api,
                discarded: AtomicBool::new(false),
                world,
            }),
        }
    }
}

struct PageInner {
    location: RwLock<String>,
    user_agent: String,
    document: ListenerSet<DomEvent>,
    window: ListenerSet<DomEvent>,
    messages: Arc<ListenerSet<WindowMessage>>,
    observers: ListenerSet<MutationRecord>,
    xhr: GlobalSlot<dyn RequestFactory>,
    push_state: GlobalSlot<dyn StateMethod>,
    replace_state: GlobalSlot<dyn StateMethod>,
    history: Mutex<HistoryStack>,
    scripts: Mutex<HashMap<ElementId, ScriptElement>>,
    next_element: AtomicU64,
    resources: HashMap<String, String>,
    native_api: Option<NativeApi>,
    discarded: AtomicBool,
    world: MainWorld,
}

/// A document loaded in a tab. Cloning yields another handle to the same
/// document.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url())
            .field("discarded", &self.is_discarded())
            .finish_non_exhaustive()
    }
}

impl Page {
    /// A page at `url` with default user agent, no resources and no native API.
    pub fn new(url: impl Into<String>) -> Self {
        PageBuilder::new(url).build()
    }

    pub fn builder(url: impl Into<String>) -> PageBuilder {
        PageBuilder::new(url)
    }

    // ── Location ───────────────────────────────────────────────────────

    pub fn url(&self) -> String {
        self.inner.location.read().clone()
    }

    /// Change the location without a history entry (a hash change or a
    /// `location.replace` within the same document).
    pub fn navigate(&self, url: &str) {
        let resolved = resolve_url(&self.url(), url);
        self.inner.history.lock().replace(HistoryEntry {
            url: resolved.clone(),
            state: Value::Null,
        });
        *self.inner.location.write() = resolved;
    }

    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    // ── Document and window events ─────────────────────────────────────

    pub fn add_document_listener(
        &self,
        name: &str,
        callback: impl Fn(&DomEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.document.add(name, Arc::new(callback))
    }

    pub fn remove_document_listener(&self, name: &str, id: ListenerId) -> bool {
        self.inner.document.remove(name, id)
    }

    /// Dispatch `event` on the document. Returns how many listeners ran.
    pub fn dispatch_document_event(&self, event: DomEvent) -> usize {
        if self.is_discarded() {
            return 0;
        }
        self.inner.document.dispatch(&event.name, &event)
    }

    pub fn add_window_listener(
        &self,
        name: &str,
        callback: impl Fn(&DomEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.window.add(name, Arc::new(callback))
    }

    pub fn remove_window_listener(&self, name: &str, id: ListenerId) -> bool {
        self.inner.window.remove(name, id)
    }

    pub fn dispatch_window_event(&self, event: DomEvent) -> usize {
        if self.is_discarded() {
            return 0;
        }
        self.inner.window.dispatch(&event.name, &event)
    }

    // ── Window messaging ───────────────────────────────────────────────

    pub fn add_message_listener(
        &self,
        callback: impl Fn(&WindowMessage) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.messages.add(MESSAGE_EVENT, Arc::new(callback))
    }

    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.inner.messages.remove(MESSAGE_EVENT, id)
    }

    /// `window.postMessage(data, '*')` from the isolated world.
    ///
    /// # Errors
    /// [`PageError::Discarded`] once the page has been unloaded; the message
    /// reaches nobody.
    pub fn post_message(&self, data: Value) -> Result<(), PageError> {
        self.deliver(data, MessageSource::Window)
    }

    /// A message arriving from another frame.
    pub fn post_foreign_message(&self, data: Value) -> Result<(), PageError> {
        self.deliver(data, MessageSource::Foreign)
    }

    fn deliver(&self, data: Value, source: MessageSource) -> Result<(), PageError> {
        if self.is_discarded() {
            return Err(PageError::Discarded);
        }
        let message = WindowMessage {
            source,
            data: data.clone(),
        };
        self.inner.messages.dispatch(MESSAGE_EVENT, &message);
        if let Err(e) = self.inner.world.send(WorldRequest::Deliver { data, source }) {
            log::warn!("Window message not delivered to main world: {}", e);
        }
        Ok(())
    }

    // ── DOM mutations ──────────────────────────────────────────────────

    pub fn observe_mutations(
        &self,
        callback: impl Fn(&MutationRecord) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.observers.add(MUTATION_EVENT, Arc::new(callback))
    }

    pub fn disconnect_observer(&self, id: ListenerId) -> bool {
        self.inner.observers.remove(MUTATION_EVENT, id)
    }

    /// Append `markup` to the body as one added node. Returns how many
    /// observers were notified.
    pub fn append_html(&self, markup: &str) -> usize {
        if self.is_discarded() {
            return 0;
        }
        let record = MutationRecord {
            added_nodes: vec![markup.to_string()],
        };
        self.inner.observers.dispatch(MUTATION_EVENT, &record)
    }

    // ── Patchable globals ──────────────────────────────────────────────

    /// `window.XMLHttpRequest`.
    pub fn xhr_slot(&self) -> &GlobalSlot<dyn RequestFactory> {
        &self.inner.xhr
    }

    /// `history.pushState`.
    pub fn push_state_slot(&self) -> &GlobalSlot<dyn StateMethod> {
        &self.inner.push_state
    }

    /// `history.replaceState`.
    pub fn replace_state_slot(&self) -> &GlobalSlot<dyn StateMethod> {
        &self.inner.replace_state
    }

    /// Open a request through whatever constructor page code currently sees.
    pub fn open_request(&self, method: &str, url: &str) -> XhrRequest {
        self.inner.xhr.get().open(method, url)
    }

    // ── History ────────────────────────────────────────────────────────

    pub fn push_state(&self, state: Value, url: Option<&str>) {
        let method = self.inner.push_state.get();
        method.call(self, state, url);
    }

    pub fn replace_state(&self, state: Value, url: Option<&str>) {
        let method = self.inner.replace_state.get();
        method.call(self, state, url);
    }

    pub(crate) fn commit_history(&self, op: HistoryOp, state: Value, url: Option<&str>) {
        let resolved = match url {
            Some(url) => resolve_url(&self.url(), url),
            None => self.url(),
        };
        let entry = HistoryEntry {
            url: resolved.clone(),
            state,
        };
        {
            let mut history = self.inner.history.lock();
            match op {
                HistoryOp::Push => history.push(entry),
                HistoryOp::Replace => history.replace(entry),
            }
        }
        *self.inner.location.write() = resolved;
    }

    /// `history.back()`. Returns false when there is no previous entry.
    pub fn history_back(&self) -> bool {
        self.traverse_history(-1)
    }

    /// `history.forward()`. Returns false when there is no next entry.
    pub fn history_forward(&self) -> bool {
        self.traverse_history(1)
    }

    fn traverse_history(&self, delta: isize) -> bool {
        let Some(entry) = self.inner.history.lock().traverse(delta) else {
            return false;
        };
        *self.inner.location.write() = entry.url;
        self.dispatch_window_event(DomEvent::new("popstate", entry.state));
        true
    }

    // ── Script elements ────────────────────────────────────────────────

    /// Insert a `<script>` element. External sources resolve against the
    /// page's resources; an unknown `src` fails the load.
    pub fn insert_script(&self, element: ScriptElement) -> ScriptLoad {
        let id = ElementId(self.inner.next_element.fetch_add(1, Ordering::Relaxed));
        let (reply, receiver) = oneshot::channel();

        if self.is_discarded() {
            let _ = reply.send(Err(PageError::Discarded));
            return ScriptLoad { id, receiver };
        }

        let source = match &element {
            ScriptElement::Inline { text } => Ok(text.clone()),
            ScriptElement::External { src } => self
                .inner
                .resources
                .get(src)
                .cloned()
                .ok_or_else(|| PageError::ResourceNotFound(src.clone())),
        };
        self.inner.scripts.lock().insert(id, element);

        match source {
            Ok(source) => {
                if let Err(e) = self.inner.world.send(WorldRequest::RunScript { source, reply }) {
                    log::warn!("Script element {} not run: {}", id, e);
                }
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
        ScriptLoad { id, receiver }
    }

    pub fn remove_script(&self, id: ElementId) -> bool {
        self.inner.scripts.lock().remove(&id).is_some()
    }

    pub fn script_element_count(&self) -> usize {
        self.inner.scripts.lock().len()
    }

    // ── Main world ─────────────────────────────────────────────────────

    /// Evaluate `code` as a program in the main world; `context` is visible
    /// to it as `context`.
    pub async fn evaluate(
        &self,
        code: &str,
        context: Option<&Value>,
    ) -> Result<Evaluation, PageError> {
        if self.is_discarded() {
            return Err(PageError::Discarded);
        }
        let (reply, receiver) = oneshot::channel();
        self.inner.world.send(WorldRequest::Evaluate {
            code: code.to_string(),
            context: context.cloned(),
            reply,
        })?;
        receiver.await.map_err(|_| PageError::WorldUnavailable)
    }

    pub fn native_api(&self) -> Option<NativeApi> {
        self.inner.native_api
    }

    /// Whether the isolated world sees a promise-based `browser.*` namespace.
    pub fn has_browser_namespace(&self) -> bool {
        self.inner
            .native_api
            .is_some_and(|api| api.is_promise_based())
    }

    /// Run `code` in the page through the native browser API.
    pub async fn execute_native(
        &self,
        code: &str,
        context: Option<&Value>,
    ) -> Result<Evaluation, PageError> {
        match self.inner.native_api {
            None => Err(PageError::NativeApi(
                "Page exposes no script execution API".to_string(),
            )),
            Some(NativeApi::Callback { tab_id: None }) => {
                Err(PageError::NativeApi("No tab with the given id".to_string()))
            }
            Some(_) => self.evaluate(code, context).await,
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    pub fn stats(&self) -> PageStats {
        let inner = &self.inner;
        PageStats {
            document_listeners: inner.document.len(),
            window_listeners: inner.window.len(),
            message_listeners: inner.messages.len(),
            mutation_observers: inner.observers.len(),
            patched_globals: [
                inner.xhr.is_patched(),
                inner.push_state.is_patched(),
                inner.replace_state.is_patched(),
            ]
            .into_iter()
            .filter(|patched| *patched)
            .count(),
            script_elements: inner.scripts.lock().len(),
        }
    }

    /// Leave the page: `beforeunload` listeners run, then the document is
    /// discarded and its main world stops.
    pub fn unload(&self) {
        if self.is_discarded() {
            return;
        }
        self.dispatch_window_event(DomEvent::new("beforeunload", Value::Null));
        self.inner.discarded.store(true, Ordering::SeqCst);
        let _ = self.inner.world.send(WorldRequest::Shutdown);
        log::debug!("Page {} discarded", self.url());
    }

    pub fn is_discarded(&self) -> bool {
        self.inner.discarded.load(Ordering::SeqCst)
    }
}
