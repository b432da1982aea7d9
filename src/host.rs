//! Line-oriented JSON command host.
//!
//! Reads one command object per line and writes one reply object per line.
//! Engine actions (`executeScript`, `initializeScripts`, `injectScript`,
//! `removeInjection`) go to the [`LifecycleManager`]; `page.*` actions drive
//! the simulated page so its life can be scripted from outside. Commands run
//! concurrently, so replies may arrive out of order: a `requestId` on the
//! command is echoed on its reply.
//!
//! Trigger activity is written to the same stream as
//! `{"event": "fired" | "executed", ...}` lines.

use std::sync::Arc;
use std::time::Duration;

use inspectmaker_page::{DomEvent, Page};
use inspectmaker_scripting::{CommandReply, LifecycleManager, TriggerEvent};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// How long in-flight commands may finish after input ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EventTarget {
    #[default]
    Document,
    Window,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

/// Page-simulation actions.
#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
enum PageAction {
    #[serde(rename = "page.dispatchEvent")]
    DispatchEvent {
        event: String,
        #[serde(default)]
        detail: Value,
        #[serde(default)]
        target: EventTarget,
    },
    #[serde(rename = "page.appendHtml")]
    AppendHtml { html: String },
    #[serde(rename = "page.navigate")]
    Navigate { url: String },
    #[serde(rename = "page.pushState")]
    PushState {
        #[serde(default)]
        state: Value,
        url: Option<String>,
    },
    #[serde(rename = "page.replaceState")]
    ReplaceState {
        #[serde(default)]
        state: Value,
        url: Option<String>,
    },
    #[serde(rename = "page.back")]
    Back,
    #[serde(rename = "page.request")]
    Request {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default, rename = "responseText")]
        response_text: String,
    },
    #[serde(rename = "page.unload")]
    Unload,
}

/// Serves commands for one page.
#[derive(Clone)]
pub struct CommandHost {
    manager: Arc<LifecycleManager>,
}

impl CommandHost {
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    fn page(&self) -> &Page {
        self.manager.page()
    }

    /// Handle one input line and build its reply, `requestId` included.
    pub async fn handle_line(&self, line: &str) -> Value {
        let command: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return reply_value(CommandReply::error(format!("Malformed command: {e}")), None),
        };
        let request_id = command.get("requestId").cloned();
        let reply = self.handle_command(command).await;
        reply_value(reply, request_id)
    }

    /// Handle one command object.
    pub async fn handle_command(&self, command: Value) -> CommandReply {
        let is_page_action = command
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|action| action.starts_with("page."));
        if !is_page_action {
            return self.manager.handle_value(command).await;
        }
        match serde_json::from_value::<PageAction>(command) {
            Ok(action) => self.handle_page_action(action),
            Err(e) => CommandReply::error(format!("Invalid page action: {e}")),
        }
    }

    fn handle_page_action(&self, action: PageAction) -> CommandReply {
        let page = self.page();
        if page.is_discarded() {
            return CommandReply::error("Page has been unloaded");
        }
        match action {
            PageAction::DispatchEvent {
                event,
                detail,
                target,
            } => {
                let dom_event = DomEvent::new(event, detail);
                let reached = match target {
                    EventTarget::Document => page.dispatch_document_event(dom_event),
                    EventTarget::Window => page.dispatch_window_event(dom_event),
                };
                CommandReply::with_message(format!("Dispatched to {reached} listener(s)"))
            }
            PageAction::AppendHtml { html } => {
                let notified = page.append_html(&html);
                CommandReply::with_message(format!("Notified {notified} observer(s)"))
            }
            PageAction::Navigate { url } => {
                page.navigate(&url);
                CommandReply::with_message(format!("Location is {}", page.url()))
            }
            PageAction::PushState { state, url } => {
                page.push_state(state, url.as_deref());
                CommandReply::with_message(format!("Location is {}", page.url()))
            }
            PageAction::ReplaceState { state, url } => {
                page.replace_state(state, url.as_deref());
                CommandReply::with_message(format!("Location is {}", page.url()))
            }
            PageAction::Back => {
                if page.history_back() {
                    CommandReply::with_message(format!("Location is {}", page.url()))
                } else {
                    CommandReply::error("No previous history entry")
                }
            }
            PageAction::Request {
                method,
                url,
                status,
                response_text,
            } => {
                let completion = page.open_request(&method, &url).complete(status, response_text);
                CommandReply::with_message(format!(
                    "{} {} completed with {}",
                    completion.method, completion.url, completion.status
                ))
            }
            PageAction::Unload => {
                page.unload();
                CommandReply::with_message("Page unloaded")
            }
        }
    }

    /// Serve until `reader` ends. Replies and trigger events are written to
    /// `writer`, one JSON object per line.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut events: Option<mpsc::UnboundedReceiver<TriggerEvent>>,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
        let mut lines = reader.lines();
        let mut in_flight = JoinSet::new();
        let mut input_open = true;

        while input_open || !in_flight.is_empty() {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) if line.trim().is_empty() => {}
                        Some(line) => {
                            let host = self.clone();
                            let out = out_tx.clone();
                            in_flight.spawn(async move {
                                let _ = out.send(host.handle_line(&line).await);
                            });
                        }
                        None => {
                            input_open = false;
                            log::debug!("Input closed; waiting for {} command(s)", in_flight.len());
                            let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                                while in_flight.join_next().await.is_some() {}
                            })
                            .await;
                            if drained.is_err() {
                                log::warn!("Abandoning {} unanswered command(s)", in_flight.len());
                                in_flight.abort_all();
                            }
                            in_flight.detach_all();
                        }
                    }
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                Some(reply) = out_rx.recv() => write_line(&mut writer, &reply).await?,
                Some(event) = recv_event(&mut events) => write_line(&mut writer, &event_value(&event)).await?,
                else => break,
            }
        }

        while let Ok(reply) = out_rx.try_recv() {
            write_line(&mut writer, &reply).await?;
        }
        if let Some(events) = events.as_mut() {
            while let Ok(event) = events.try_recv() {
                write_line(&mut writer, &event_value(&event)).await?;
            }
        }
        writer.flush().await?;
        Ok(())
    }
}

async fn recv_event(events: &mut Option<mpsc::UnboundedReceiver<TriggerEvent>>) -> Option<TriggerEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn reply_value(reply: CommandReply, request_id: Option<Value>) -> Value {
    let mut value = serde_json::to_value(reply).unwrap_or_else(|e| {
        json!({ "success": false, "error": format!("Failed to encode reply: {e}") })
    });
    if let (Some(id), Some(object)) = (request_id, value.as_object_mut()) {
        object.insert("requestId".to_string(), id);
    }
    value
}

/// Wire form of a trigger event.
pub fn event_value(event: &TriggerEvent) -> Value {
    match event {
        TriggerEvent::Fired { script_id, kind } => json!({
            "event": "fired",
            "scriptId": script_id,
            "kind": kind.as_str(),
        }),
        TriggerEvent::Executed { script_id, result } => {
            let mut value = json!({ "event": "executed", "scriptId": script_id });
            if let (Some(object), Ok(Value::Object(result))) =
                (value.as_object_mut(), serde_json::to_value(result))
            {
                object.extend(result);
            }
            value
        }
    }
}
