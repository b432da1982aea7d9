//! Configuration layer for the InspectMaker injection engine.
//!
//! This crate owns every piece of data the engine reads but never writes:
//!
//! - [`script`] - script definitions and their trigger modes
//! - [`browser`] - browser families and bridge method preferences
//! - [`matcher`] - URL pattern eligibility checks
//! - [`settings`] - engine settings loaded from `config.yaml`
//! - [`defaults`] - default values used by serde and by the trigger strategies

pub mod browser;
pub mod defaults;
pub mod error;
pub mod matcher;
pub mod script;
pub mod settings;

pub use browser::{BridgeMethod, BrowserKind, BrowserSetting};
pub use error::ConfigError;
pub use matcher::{MatchMode, pattern_to_regex, url_matches};
pub use script::{EventTrigger, ScriptDefinition, ScriptId, TriggerKind, TriggerMode, UrlPattern};
pub use settings::EngineSettings;
