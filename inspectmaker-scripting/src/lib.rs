//! Trigger/injection engine for InspectMaker.
//!
//! Attaches script definitions to a [`Page`](inspectmaker_page::Page) and runs
//! them in its main world according to their trigger mode:
//!
//! - [`manager`] - per-page lifecycle and the outer-process command envelope
//! - [`scheduler`] - the eight trigger strategies and their resources
//! - [`bridge`] - carries code into the main world and returns its result
//! - [`channel`] - correlates bridge replies with their calls
//! - [`protocol`] - wire types for both protocols

pub mod bridge;
pub mod channel;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod scheduler;

pub use bridge::{BRIDGE_SCRIPT, ExecutionBridge};
pub use channel::{PendingReply, ResultChannel};
pub use error::BridgeError;
pub use manager::{LifecycleManager, ScriptSource};
pub use protocol::{BridgeMessage, Command, CommandReply, ExecutionRequest, ExecutionResult};
pub use scheduler::{ActiveInjection, ArmOutcome, ResourceHandle, TriggerEvent, TriggerScheduler};
