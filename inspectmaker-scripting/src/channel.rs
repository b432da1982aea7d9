//! Correlates bridge replies with the calls waiting for them.
//!
//! Every call gets a fresh `callId`. One window `message` listener serves all
//! in-flight calls: it is installed when the first call opens and removed
//! when the last one closes. A reply settles its call only when the message
//! comes from the page's own window, is a `result`, and carries both the
//! call's `callId` and its `scriptId`; anything else is ignored.
//!
//! Unloading the page closes every call still waiting: its reply can no
//! longer arrive, so [`PendingReply::wait`] fails with
//! [`BridgeError::ChannelClosed`] instead of waiting forever.

use std::collections::HashMap;
use std::sync::Arc;

use inspectmaker_config::ScriptId;
use inspectmaker_page::{ListenerId, Page, WindowMessage};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::BridgeError;
use crate::protocol::{BridgeMessage, ExecutionResult};

const UNLOAD_EVENT: &str = "beforeunload";

struct PendingCall {
    script_id: ScriptId,
    reply: oneshot::Sender<ExecutionResult>,
}

#[derive(Default)]
struct ChannelState {
    pending: HashMap<String, PendingCall>,
    listener: Option<ListenerId>,
    unload_listener: Option<ListenerId>,
}

/// Per-page registry of in-flight bridge calls.
#[derive(Clone)]
pub struct ResultChannel {
    page: Page,
    state: Arc<Mutex<ChannelState>>,
}

impl ResultChannel {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            state: Arc::new(Mutex::new(ChannelState::default())),
        }
    }

    /// Register a new call for `script_id` and start listening for its reply.
    pub fn open(&self, script_id: ScriptId) -> PendingReply {
        let call_id = Uuid::new_v4().to_string();
        let (reply, receiver) = oneshot::channel();

        let mut state = self.state.lock();
        if self.page.is_discarded() {
            log::debug!("Page is discarded; call for script {} closed at once", script_id);
            drop(reply);
        } else {
            state
                .pending
                .insert(call_id.clone(), PendingCall { script_id, reply });
        }
        if state.listener.is_none() && !state.pending.is_empty() {
            let shared = Arc::clone(&self.state);
            let id = self
                .page
                .add_message_listener(move |message| settle(&shared, message));
            state.listener = Some(id);

            let shared = Arc::clone(&self.state);
            let id = self
                .page
                .add_window_listener(UNLOAD_EVENT, move |_| close_all(&shared));
            state.unload_listener = Some(id);
            log::debug!("Result listener installed");
        }
        drop(state);

        PendingReply {
            call_id,
            script_id,
            receiver,
            channel: self.clone(),
        }
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_listening(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    fn close(&self, call_id: &str) {
        let mut state = self.state.lock();
        state.pending.remove(call_id);
        if state.pending.is_empty()
            && let Some(id) = state.listener.take()
        {
            self.page.remove_message_listener(id);
            if let Some(id) = state.unload_listener.take() {
                self.page.remove_window_listener(UNLOAD_EVENT, id);
            }
            log::debug!("Result listener removed");
        }
    }
}

/// Drop every pending sender; each waiting call then sees its channel close.
fn close_all(state: &Mutex<ChannelState>) {
    let closed: Vec<PendingCall> = state.lock().pending.drain().map(|(_, call)| call).collect();
    if !closed.is_empty() {
        log::warn!("Page unloading; closing {} pending call(s)", closed.len());
    }
}

fn settle(state: &Mutex<ChannelState>, message: &WindowMessage) {
    if !message.is_from_window() || message.action() != Some("result") {
        return;
    }
    let (script_id, call_id, result) = match serde_json::from_value(message.data.clone()) {
        Ok(BridgeMessage::Result {
            script_id,
            call_id,
            success,
            result,
            error,
        }) => {
            let outcome = if success {
                ExecutionResult::ok(result)
            } else {
                ExecutionResult::failure(error.unwrap_or_else(|| "Unknown error".to_string()))
            };
            (script_id, call_id, outcome)
        }
        Ok(_) => return,
        Err(e) => {
            log::debug!("Ignoring malformed result message: {}", e);
            return;
        }
    };

    let mut state = state.lock();
    let matches = state
        .pending
        .get(&call_id)
        .is_some_and(|call| call.script_id == script_id);
    if !matches {
        return;
    }
    if let Some(call) = state.pending.remove(&call_id) {
        let _ = call.reply.send(result);
    }
}

/// One in-flight call. Dropping it, settled or not, unregisters the call.
pub struct PendingReply {
    call_id: String,
    script_id: ScriptId,
    receiver: oneshot::Receiver<ExecutionResult>,
    channel: ResultChannel,
}

impl PendingReply {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn script_id(&self) -> ScriptId {
        self.script_id
    }

    /// Wait for the matching reply. Settles exactly once; a thrown exception
    /// comes back as [`BridgeError::Execution`].
    pub async fn wait(mut self) -> Result<Option<String>, BridgeError> {
        let result = (&mut self.receiver)
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        if result.success {
            Ok(result.output)
        } else {
            Err(BridgeError::Execution(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.channel.close(&self.call_id);
    }
}
