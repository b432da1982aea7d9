//! Shared integration test helpers for inspectmaker.
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{engine, script};
//! ```
//!
//! The `#![allow(dead_code)]` below suppresses warnings when only a subset
//! of helpers is used by a given test file.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use inspectmaker::build_page;
use inspectmaker::config::{EngineSettings, ScriptDefinition, ScriptId, TriggerMode, UrlPattern};
use inspectmaker::page::Page;
use inspectmaker::scripting::{
    ExecutionBridge, ExecutionResult, LifecycleManager, TriggerEvent, TriggerScheduler,
};
use tokio::sync::mpsc;

/// Location most tests load their page at.
pub const PAGE_URL: &str = "https://shop.example.com/cart";

/// How long a test waits for an execution before giving up.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// A page at `url` serving the bridge script from the default resource URL.
pub fn page_at(url: &str) -> Page {
    build_page(url, &EngineSettings::default())
}

/// An enabled script with the given trigger and no URL restrictions.
pub fn script(id: ScriptId, code: &str, trigger: TriggerMode) -> ScriptDefinition {
    ScriptDefinition::new(id, code, trigger)
}

/// Like [`script`], restricted to `patterns`.
pub fn script_for(
    id: ScriptId,
    code: &str,
    trigger: TriggerMode,
    patterns: &[&str],
) -> ScriptDefinition {
    let mut script = script(id, code, trigger);
    script.url_patterns = patterns.iter().map(|p| UrlPattern::new(*p)).collect();
    script
}

/// A scheduler for `page` with its trigger events routed to a receiver.
pub fn scheduler_for(page: &Page) -> (TriggerScheduler, mpsc::UnboundedReceiver<TriggerEvent>) {
    let settings = EngineSettings::default();
    let bridge = Arc::new(ExecutionBridge::new(
        page.clone(),
        settings
            .browser
            .resolve(page.user_agent(), page.has_browser_namespace()),
        settings.bridge_resource_url.clone(),
    ));
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = TriggerScheduler::new(bridge, settings.url_poll_interval()).with_events(tx);
    (scheduler, rx)
}

/// Everything a lifecycle test needs: the page, its manager and the
/// manager's trigger events.
pub struct Engine {
    pub page: Page,
    pub manager: Arc<LifecycleManager>,
    pub events: mpsc::UnboundedReceiver<TriggerEvent>,
}

/// A manager on a fresh page at `url`, sourcing `scripts`.
pub fn engine(url: &str, scripts: Vec<ScriptDefinition>) -> Engine {
    engine_with(url, scripts, &EngineSettings::default())
}

pub fn engine_with(url: &str, scripts: Vec<ScriptDefinition>, settings: &EngineSettings) -> Engine {
    let page = build_page(url, settings);
    let (tx, events) = mpsc::unbounded_channel();
    let manager = Arc::new(LifecycleManager::with_events(
        page.clone(),
        settings,
        Arc::new(scripts),
        tx,
    ));
    Engine {
        page,
        manager,
        events,
    }
}

/// Wait for the next `Executed` event, skipping `Fired` ones.
pub async fn next_execution(
    events: &mut mpsc::UnboundedReceiver<TriggerEvent>,
) -> (ScriptId, ExecutionResult) {
    tokio::time::timeout(EXECUTION_TIMEOUT, async {
        loop {
            match events.recv().await {
                Some(TriggerEvent::Executed { script_id, result }) => return (script_id, result),
                Some(TriggerEvent::Fired { .. }) => continue,
                None => panic!("Trigger event channel closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for an execution")
}

/// Ids of the `Fired` events received so far, without waiting.
pub fn drain_fired(events: &mut mpsc::UnboundedReceiver<TriggerEvent>) -> Vec<ScriptId> {
    let mut fired = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TriggerEvent::Fired { script_id, .. } = event {
            fired.push(script_id);
        }
    }
    fired
}

/// Let spawned workers observe signals sent from synchronous callbacks.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
