//! Per-script record of what an armed trigger holds.

use inspectmaker_config::{ScriptId, TriggerKind};
use inspectmaker_page::{ListenerId, Page};
use tokio::task::JoinHandle;

use super::interceptor::Registration;

/// The one page-side resource an armed trigger owns.
#[derive(Debug)]
pub enum ResourceHandle {
    /// Nothing to undo (instantaneous, or an inert trigger).
    None,
    /// The worker task is sleeping until the run.
    PendingTimer,
    /// The worker task ticks until disarmed.
    RepeatingTimer,
    /// A document listener; removal needs the exact name it was added under.
    Listener { event_name: String, id: ListenerId },
    /// A DOM mutation observer.
    Observer(ListenerId),
    /// A subscription to the network interceptor.
    NetworkInterceptor(Registration),
    /// A subscription to the history interceptor plus the `popstate` listener.
    HistoryInterceptor {
        registration: Registration,
        popstate: ListenerId,
    },
}

/// One armed script.
#[derive(Debug)]
pub struct ActiveInjection {
    script_id: ScriptId,
    kind: TriggerKind,
    resource: ResourceHandle,
    worker: Option<JoinHandle<()>>,
}

impl ActiveInjection {
    pub(crate) fn new(
        script_id: ScriptId,
        kind: TriggerKind,
        resource: ResourceHandle,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            script_id,
            kind,
            resource,
            worker,
        }
    }

    pub fn script_id(&self) -> ScriptId {
        self.script_id
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    /// Stop the worker and undo the resource. Executions already sent to the
    /// page are not recalled.
    pub(crate) fn release(self, page: &Page) {
        if let Some(worker) = self.worker {
            worker.abort();
        }
        match self.resource {
            ResourceHandle::None | ResourceHandle::PendingTimer | ResourceHandle::RepeatingTimer => {}
            ResourceHandle::Listener { event_name, id } => {
                if !page.remove_document_listener(&event_name, id) {
                    log::warn!(
                        "Listener for '{}' of script {} was already gone",
                        event_name,
                        self.script_id
                    );
                }
            }
            ResourceHandle::Observer(id) => {
                page.disconnect_observer(id);
            }
            ResourceHandle::NetworkInterceptor(registration) => drop(registration),
            ResourceHandle::HistoryInterceptor {
                registration,
                popstate,
            } => {
                page.remove_window_listener("popstate", popstate);
                drop(registration);
            }
        }
        log::debug!("Released {} trigger of script {}", self.kind, self.script_id);
    }
}
