//! The page's main-world JavaScript context.
//!
//! `boa_engine::Context` is not `Send`, so the world lives on its own thread
//! and is driven entirely by [`WorldRequest`] messages. After every request
//! the thread drains what page code posted with `window.postMessage` and
//! delivers it to both the Rust message bus and the main world's own
//! `message` listeners, then forwards `console.*` output to the log.

use std::sync::Arc;
use std::thread;

use boa_engine::{Context, Source};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::PageError;
use crate::events::{MessageSource, WindowMessage};
use crate::listeners::ListenerSet;

const PRELUDE: &str = include_str!("world_prelude.js");

/// Event name used for window messages on the Rust message bus.
pub(crate) const MESSAGE_EVENT: &str = "message";

/// Upper bound on message ping-pong rounds handled in one flush.
const MAX_DELIVERY_ROUNDS: usize = 64;

/// Outcome of evaluating code in the main world.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Evaluation {
    pub success: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Evaluation {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

pub(crate) enum WorldRequest {
    Evaluate {
        code: String,
        context: Option<Value>,
        reply: oneshot::Sender<Evaluation>,
    },
    RunScript {
        source: String,
        reply: oneshot::Sender<Result<(), PageError>>,
    },
    Deliver {
        data: Value,
        source: MessageSource,
    },
    Shutdown,
}

pub(crate) struct MainWorld {
    sender: mpsc::UnboundedSender<WorldRequest>,
}

impl MainWorld {
    pub fn spawn(bus: Arc<ListenerSet<WindowMessage>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let spawned = thread::Builder::new()
            .name("main-world".to_string())
            .spawn(move || run(bus, receiver));
        if let Err(e) = spawned {
            log::error!("Failed to start main world thread: {}", e);
        }
        Self { sender }
    }

    pub fn send(&self, request: WorldRequest) -> Result<(), PageError> {
        self.sender
            .send(request)
            .map_err(|_| PageError::WorldUnavailable)
    }
}

fn run(bus: Arc<ListenerSet<WindowMessage>>, mut receiver: mpsc::UnboundedReceiver<WorldRequest>) {
    let mut world = WorldHost::new(bus);
    while let Some(request) = receiver.blocking_recv() {
        match request {
            WorldRequest::Shutdown => break,
            WorldRequest::Evaluate {
                code,
                context,
                reply,
            } => {
                let outcome = world.evaluate(&code, context.as_ref());
                world.flush();
                let _ = reply.send(outcome);
            }
            WorldRequest::RunScript { source, reply } => {
                world.run_script(&source);
                world.flush();
                let _ = reply.send(Ok(()));
            }
            WorldRequest::Deliver { data, source } => {
                world.deliver_to_scripts(&data, source);
                world.flush();
            }
        }
    }
    log::debug!("Main world stopped");
}

#[derive(Deserialize)]
struct ConsoleLine {
    level: String,
    text: String,
}

struct WorldHost {
    context: Context,
    bus: Arc<ListenerSet<WindowMessage>>,
}

impl WorldHost {
    fn new(bus: Arc<ListenerSet<WindowMessage>>) -> Self {
        let mut context = Context::default();
        if let Err(e) = context.eval(Source::from_bytes(PRELUDE)) {
            log::error!("Main world prelude failed: {}", e);
        }
        Self { context, bus }
    }

    fn eval_to_string(&mut self, source: &str) -> Result<String, String> {
        let value = self
            .context
            .eval(Source::from_bytes(source))
            .map_err(|e| e.to_string())?;
        value
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or_else(|| "Main world returned a non-string value".to_string())
    }

    fn evaluate(&mut self, code: &str, context: Option<&Value>) -> Evaluation {
        let code_literal = match serde_json::to_string(code) {
            Ok(literal) => literal,
            Err(e) => return Evaluation::failure(e.to_string()),
        };
        let context_literal = context.map_or_else(|| "undefined".to_string(), Value::to_string);
        let call = format!("__evaluate({code_literal}, {context_literal})");
        match self.eval_to_string(&call) {
            Ok(json) => serde_json::from_str(&json)
                .unwrap_or_else(|e| Evaluation::failure(format!("Malformed evaluation result: {e}"))),
            Err(e) => Evaluation::failure(e),
        }
    }

    /// Run a `<script>` element's source. Uncaught errors are reported on
    /// the console, as a browser does; they never fail the load.
    fn run_script(&mut self, source: &str) {
        if let Err(e) = self.context.eval(Source::from_bytes(source)) {
            log::warn!(target: "main_world", "Uncaught {}", e);
        }
    }

    fn deliver_to_scripts(&mut self, data: &Value, source: MessageSource) {
        let literal = match serde_json::to_string(&data.to_string()) {
            Ok(literal) => literal,
            Err(e) => {
                log::warn!("Dropping undeliverable window message: {}", e);
                return;
            }
        };
        let call = format!(
            "__dispatchMessage({literal}, {})",
            source == MessageSource::Foreign
        );
        if let Err(e) = self.context.eval(Source::from_bytes(&call)) {
            log::warn!("Main world message dispatch failed: {}", e);
        }
    }

    fn drain_outbox(&mut self) -> Vec<Value> {
        match self.eval_to_string("__drainOutbox()") {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Malformed main world outbox: {}", e);
                Vec::new()
            }),
            Err(e) => {
                log::warn!("Failed to drain main world outbox: {}", e);
                Vec::new()
            }
        }
    }

    /// Deliver everything page code posted, including messages posted by
    /// listeners reacting to earlier ones.
    fn flush(&mut self) {
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let posted = self.drain_outbox();
            if posted.is_empty() {
                break;
            }
            for data in posted {
                let message = WindowMessage {
                    source: MessageSource::Window,
                    data,
                };
                self.bus.dispatch(MESSAGE_EVENT, &message);
                self.deliver_to_scripts(&message.data, MessageSource::Window);
            }
        }
        self.drain_console();
    }

    fn drain_console(&mut self) {
        let lines: Vec<ConsoleLine> = match self.eval_to_string("__drainConsole()") {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to drain main world console: {}", e);
                return;
            }
        };
        for line in lines {
            match line.level.as_str() {
                "error" => log::error!(target: "main_world", "{}", line.text),
                "warn" => log::warn!(target: "main_world", "{}", line.text),
                "debug" => log::debug!(target: "main_world", "{}", line.text),
                _ => log::info!(target: "main_world", "{}", line.text),
            }
        }
    }
}
