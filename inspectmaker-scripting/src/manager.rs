//! Per-page lifecycle of armed scripts.
//!
//! [`LifecycleManager`] is what the outer process talks to. It reads the
//! script list from a [`ScriptSource`], filters it against the page URL and
//! drives the [`TriggerScheduler`]. When the page fires `beforeunload`, every
//! armed script is disarmed before the document goes away.

use std::sync::{Arc, Weak};

use inspectmaker_config::{
    BrowserKind, EngineSettings, MatchMode, ScriptDefinition, ScriptId, url_matches,
};
use inspectmaker_page::{ListenerId, Page};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::bridge::ExecutionBridge;
use crate::protocol::{Command, CommandReply, ExecutionResult};
use crate::scheduler::{ArmOutcome, TriggerEvent, TriggerScheduler};

/// Storage collaborator: the current script list.
pub trait ScriptSource: Send + Sync {
    /// Enabled scripts, in stored order.
    ///
    /// # Errors
    /// Returns a description of why the list could not be read.
    fn active_scripts(&self) -> Result<Vec<ScriptDefinition>, String>;
}

/// A fixed, in-memory script list.
impl ScriptSource for Vec<ScriptDefinition> {
    fn active_scripts(&self) -> Result<Vec<ScriptDefinition>, String> {
        Ok(self.iter().filter(|s| s.enabled).cloned().collect())
    }
}

/// Registry of the scripts armed on one page.
pub struct LifecycleManager {
    page: Page,
    scheduler: Arc<TriggerScheduler>,
    source: Arc<dyn ScriptSource>,
    match_mode: MatchMode,
    unload_listener: ListenerId,
}

impl LifecycleManager {
    /// Create a manager for `page`. Must be called from within a Tokio runtime.
    pub fn new(page: Page, settings: &EngineSettings, source: Arc<dyn ScriptSource>) -> Self {
        Self::build(page, settings, source, None)
    }

    /// Like [`new`](Self::new), also reporting trigger activity on `events`.
    pub fn with_events(
        page: Page,
        settings: &EngineSettings,
        source: Arc<dyn ScriptSource>,
        events: mpsc::UnboundedSender<TriggerEvent>,
    ) -> Self {
        Self::build(page, settings, source, Some(events))
    }

    fn build(
        page: Page,
        settings: &EngineSettings,
        source: Arc<dyn ScriptSource>,
        events: Option<mpsc::UnboundedSender<TriggerEvent>>,
    ) -> Self {
        let browser = settings
            .browser
            .resolve(page.user_agent(), page.has_browser_namespace());
        log::info!("Browser detected as {}", browser);

        let bridge = Arc::new(ExecutionBridge::new(
            page.clone(),
            browser,
            settings.bridge_resource_url.clone(),
        ));
        let mut scheduler = TriggerScheduler::new(bridge, settings.url_poll_interval());
        if let Some(events) = events {
            scheduler = scheduler.with_events(events);
        }
        let scheduler = Arc::new(scheduler);

        let weak: Weak<TriggerScheduler> = Arc::downgrade(&scheduler);
        let unload_listener = page.add_window_listener("beforeunload", move |_| {
            if let Some(scheduler) = weak.upgrade() {
                log::info!("Page unloading; disarming all scripts");
                scheduler.disarm_all();
            }
        });

        Self {
            page,
            scheduler,
            source,
            match_mode: settings.url_matching,
            unload_listener,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    pub fn browser(&self) -> BrowserKind {
        self.scheduler.bridge().browser()
    }

    /// Scripts from the source whose URL patterns match the page.
    ///
    /// # Errors
    /// Propagates the source's error.
    pub fn matching_scripts(&self) -> Result<Vec<ScriptDefinition>, String> {
        let url = self.page.url();
        let scripts = self.source.active_scripts()?;
        Ok(scripts
            .into_iter()
            .filter(|script| url_matches(&url, &script.url_patterns, self.match_mode))
            .collect())
    }

    /// Arm every enabled script matching the page. Returns how many were
    /// newly armed.
    ///
    /// # Errors
    /// Returns the source's error; nothing is armed in that case.
    pub fn initialize_scripts(&self) -> Result<usize, String> {
        let scripts = self.matching_scripts().inspect_err(|e| {
            log::error!("Failed to load scripts: {}", e);
        })?;
        let armed = scripts
            .iter()
            .filter(|script| self.scheduler.arm(script) == ArmOutcome::Armed)
            .count();
        log::info!(
            "Initialized {} of {} matching script(s) on {}",
            armed,
            scripts.len(),
            self.page.url()
        );
        Ok(armed)
    }

    /// Arm one script. Idempotent.
    pub fn inject_script(&self, script: &ScriptDefinition) -> ArmOutcome {
        self.scheduler.arm(script)
    }

    /// Disarm one script. Idempotent; returns whether it was armed.
    pub fn remove_injection(&self, script_id: ScriptId) -> bool {
        self.scheduler.disarm(script_id)
    }

    /// Run `script` once, leaving any armed trigger untouched.
    pub async fn execute_script(&self, script: &ScriptDefinition) -> ExecutionResult {
        self.scheduler.bridge().execute(script, None).await
    }

    /// Handle one command. Every command gets exactly one reply.
    pub async fn handle(&self, command: Command) -> CommandReply {
        match command {
            Command::ExecuteScript { script } => self.execute_script(&script).await.into(),
            Command::InitializeScripts => match self.initialize_scripts() {
                Ok(_) => CommandReply::ok(),
                Err(e) => CommandReply::error(format!("Failed to load scripts: {e}")),
            },
            Command::InjectScript { script } => {
                let message = match self.inject_script(&script) {
                    ArmOutcome::Armed => format!("Script {} injected", script.id),
                    ArmOutcome::AlreadyArmed => format!("Script {} is already injected", script.id),
                    ArmOutcome::Disabled => {
                        format!("Script {} is disabled and was not injected", script.id)
                    }
                };
                CommandReply::with_message(message)
            }
            Command::RemoveInjection { script_id } => {
                let message = if self.remove_injection(script_id) {
                    format!("Injection of script {script_id} removed")
                } else {
                    format!("Script {script_id} was not injected")
                };
                CommandReply::with_message(message)
            }
        }
    }

    /// Handle a raw command object, replying with an error for a missing or
    /// unknown `action` and for a malformed payload.
    pub async fn handle_value(&self, value: Value) -> CommandReply {
        let Some(action) = value.get("action").and_then(Value::as_str) else {
            return CommandReply::error("Missing action");
        };
        if !Command::ACTIONS.contains(&action) {
            return CommandReply::error(format!("Unknown action: {action}"));
        }
        let action = action.to_string();
        match serde_json::from_value::<Command>(value) {
            Ok(command) => self.handle(command).await,
            Err(e) => CommandReply::error(format!("Invalid {action} command: {e}")),
        }
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.page
            .remove_window_listener("beforeunload", self.unload_listener);
    }
}
