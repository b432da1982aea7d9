//! Trigger scheduling.
//!
//! [`TriggerScheduler`] owns every [`ActiveInjection`] of one page. Arming
//! picks a strategy from the script's [`TriggerMode`]:
//!
//! | mode | resource | fires |
//! |---|---|---|
//! | instantaneous | none | once, immediately |
//! | delayed | pending timer | once, after the delay |
//! | eventBased | document listener | on every dispatch |
//! | persistent | repeating timer | every interval |
//! | urlBased | repeating timer polling the location | on every change |
//! | elementCreated | mutation observer | on every matching added node |
//! | ajaxInterceptor | network interceptor registration | on every matching completed request |
//! | historyStateChanged | history interceptor registration + `popstate` listener | on every change |
//!
//! Each armed trigger owns at most one worker task. Page-side callbacks never
//! run a script themselves; they forward a fire signal to that task, so
//! aborting the task and releasing the resource is a complete disarm.

mod injection;
mod interceptor;
mod patches;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inspectmaker_config::{ScriptDefinition, ScriptId, TriggerKind, TriggerMode};
use inspectmaker_page::{NodeSelector, Page, XhrCompletion};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::bridge::ExecutionBridge;
use crate::protocol::ExecutionResult;

pub use injection::{ActiveInjection, ResourceHandle};
pub use interceptor::{Dispatcher, InterceptorRegistry, Registration, RestoreFn, Subscriber};
pub use patches::{HistoryChange, HistoryMethod};

/// Trigger activity, reported on the optional event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    /// A trigger fired and an execution was sent to the page.
    Fired { script_id: ScriptId, kind: TriggerKind },
    /// An execution started by a trigger finished.
    Executed {
        script_id: ScriptId,
        result: ExecutionResult,
    },
}

/// Result of an arm request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Armed,
    /// The script already had an active injection; nothing changed.
    AlreadyArmed,
    /// Disabled scripts are never armed.
    Disabled,
}

/// Runs one script whenever its trigger fires.
#[derive(Clone)]
struct Runner {
    bridge: Arc<ExecutionBridge>,
    script: Arc<ScriptDefinition>,
    events: Option<mpsc::UnboundedSender<TriggerEvent>>,
}

impl Runner {
    fn emit(&self, event: TriggerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Send one execution to the page without waiting for it.
    fn fire(&self, context: Option<Value>) {
        let script_id = self.script.id;
        let kind = self.script.trigger.kind();
        log::info!("Trigger {} fired for script {}", kind, script_id);
        self.emit(TriggerEvent::Fired { script_id, kind });

        let runner = self.clone();
        tokio::spawn(async move {
            let result = runner.bridge.execute(&runner.script, context).await;
            runner.emit(TriggerEvent::Executed { script_id, result });
        });
    }
}

/// Worker for listener-style triggers: runs the script once per signal.
fn spawn_forwarder(mut fires: mpsc::UnboundedReceiver<Option<Value>>, runner: Runner) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(context) = fires.recv().await {
            runner.fire(context);
        }
    })
}

fn repeating(period: Duration) -> time::Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Arms and disarms the triggers of one page.
///
/// Must be used from within a Tokio runtime: arming spawns worker tasks.
pub struct TriggerScheduler {
    page: Page,
    bridge: Arc<ExecutionBridge>,
    url_poll_interval: Duration,
    network: InterceptorRegistry<XhrCompletion>,
    history: InterceptorRegistry<HistoryChange>,
    active: Mutex<HashMap<ScriptId, ActiveInjection>>,
    events: Option<mpsc::UnboundedSender<TriggerEvent>>,
}

impl TriggerScheduler {
    pub fn new(bridge: Arc<ExecutionBridge>, url_poll_interval: Duration) -> Self {
        Self {
            page: bridge.page().clone(),
            bridge,
            url_poll_interval,
            network: InterceptorRegistry::new("XMLHttpRequest"),
            history: InterceptorRegistry::new("history"),
            active: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Report trigger activity on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TriggerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    /// Arm `script`. Idempotent per script id.
    pub fn arm(&self, script: &ScriptDefinition) -> ArmOutcome {
        if !script.enabled {
            log::debug!("Script {} is disabled; not arming", script.id);
            return ArmOutcome::Disabled;
        }
        let mut active = self.active.lock();
        if active.contains_key(&script.id) {
            log::debug!("Script {} is already armed", script.id);
            return ArmOutcome::AlreadyArmed;
        }

        let runner = Runner {
            bridge: Arc::clone(&self.bridge),
            script: Arc::new(script.clone()),
            events: self.events.clone(),
        };
        let injection = self.start(runner);
        log::info!(
            "Armed script {} ({}) on {}",
            script.id,
            injection.kind(),
            self.page.url()
        );
        active.insert(script.id, injection);
        ArmOutcome::Armed
    }

    fn start(&self, runner: Runner) -> ActiveInjection {
        let script_id = runner.script.id;
        let kind = runner.script.trigger.kind();
        let (resource, worker) = match runner.script.trigger.clone() {
            TriggerMode::Instantaneous => {
                runner.fire(None);
                (ResourceHandle::None, None)
            }
            TriggerMode::Delayed { delay } => {
                let worker = tokio::spawn(async move {
                    time::sleep(delay).await;
                    runner.fire(None);
                });
                (ResourceHandle::PendingTimer, Some(worker))
            }
            TriggerMode::Persistent { interval } => {
                let worker = tokio::spawn(async move {
                    let mut ticker = repeating(interval);
                    loop {
                        ticker.tick().await;
                        runner.fire(None);
                    }
                });
                (ResourceHandle::RepeatingTimer, Some(worker))
            }
            TriggerMode::UrlBased => {
                let page = self.page.clone();
                let period = self.url_poll_interval;
                // Baseline is the location at arm time, not at the worker's first poll.
                let mut last = page.url();
                let worker = tokio::spawn(async move {
                    let mut ticker = repeating(period);
                    loop {
                        ticker.tick().await;
                        let current = page.url();
                        if current != last {
                            log::debug!("Location changed: {} -> {}", last, current);
                            last = current;
                            runner.fire(None);
                        }
                    }
                });
                (ResourceHandle::RepeatingTimer, Some(worker))
            }
            TriggerMode::EventBased { trigger: None } => {
                log::warn!("Script {} has no event trigger; armed without a listener", script_id);
                (ResourceHandle::None, None)
            }
            TriggerMode::EventBased {
                trigger: Some(trigger),
            } => {
                let event_name = trigger.event_name().to_string();
                let (tx, rx) = mpsc::unbounded_channel();
                let id = self.page.add_document_listener(&event_name, move |_| {
                    let _ = tx.send(None);
                });
                let worker = spawn_forwarder(rx, runner);
                (ResourceHandle::Listener { event_name, id }, Some(worker))
            }
            TriggerMode::ElementCreated { selector } => match NodeSelector::parse(&selector) {
                Ok(selector) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let id = self.page.observe_mutations(move |record| {
                        for markup in &record.added_nodes {
                            if selector.matches_markup(markup) {
                                let _ = tx.send(None);
                            }
                        }
                    });
                    let worker = spawn_forwarder(rx, runner);
                    (ResourceHandle::Observer(id), Some(worker))
                }
                Err(e) => {
                    log::warn!("Script {}: {}; it will never run", script_id, e);
                    (ResourceHandle::None, None)
                }
            },
            TriggerMode::AjaxInterceptor { url_filter } => {
                let (tx, rx) = mpsc::unbounded_channel();
                let subscriber: Subscriber<XhrCompletion> = Arc::new(move |done: &XhrCompletion| {
                    if url_filter
                        .as_deref()
                        .is_some_and(|filter| !done.url.contains(filter))
                    {
                        return;
                    }
                    let _ = tx.send(Some(json!({
                        "url": done.url,
                        "method": done.method,
                        "status": done.status,
                        "responseText": done.response_text,
                    })));
                });
                let page = self.page.clone();
                let registration = self.network.register(subscriber, move |dispatcher| {
                    patches::install_network_patch(&page, dispatcher)
                });
                let worker = spawn_forwarder(rx, runner);
                (ResourceHandle::NetworkInterceptor(registration), Some(worker))
            }
            TriggerMode::HistoryStateChanged => {
                let (tx, rx) = mpsc::unbounded_channel();
                let on_change = tx.clone();
                let subscriber: Subscriber<HistoryChange> = Arc::new(move |_: &HistoryChange| {
                    let _ = on_change.send(None);
                });
                let page = self.page.clone();
                let registration = self.history.register(subscriber, move |dispatcher| {
                    patches::install_history_patch(&page, dispatcher)
                });
                let popstate = self.page.add_window_listener("popstate", move |_| {
                    let _ = tx.send(None);
                });
                let worker = spawn_forwarder(rx, runner);
                (
                    ResourceHandle::HistoryInterceptor {
                        registration,
                        popstate,
                    },
                    Some(worker),
                )
            }
        };
        ActiveInjection::new(script_id, kind, resource, worker)
    }

    /// Disarm one script. Returns false (and does nothing) when it was not armed.
    pub fn disarm(&self, script_id: ScriptId) -> bool {
        let removed = self.active.lock().remove(&script_id);
        match removed {
            Some(injection) => {
                injection.release(&self.page);
                log::info!("Disarmed script {}", script_id);
                true
            }
            None => false,
        }
    }

    /// Disarm every armed script. Returns how many were armed.
    pub fn disarm_all(&self) -> usize {
        let drained: Vec<ActiveInjection> = self.active.lock().drain().map(|(_, i)| i).collect();
        let count = drained.len();
        for injection in drained {
            injection.release(&self.page);
        }
        if count > 0 {
            log::info!("Disarmed {} script(s)", count);
        }
        count
    }

    pub fn is_armed(&self, script_id: ScriptId) -> bool {
        self.active.lock().contains_key(&script_id)
    }

    pub fn armed_ids(&self) -> Vec<ScriptId> {
        let mut ids: Vec<ScriptId> = self.active.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn armed_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Trigger kind of an armed script.
    pub fn armed_kind(&self, script_id: ScriptId) -> Option<TriggerKind> {
        self.active.lock().get(&script_id).map(ActiveInjection::kind)
    }

    /// Live network interceptor registrations.
    pub fn network_interceptors(&self) -> usize {
        self.network.len()
    }

    /// Live history interceptor registrations.
    pub fn history_interceptors(&self) -> usize {
        self.history.len()
    }
}

impl Drop for TriggerScheduler {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
