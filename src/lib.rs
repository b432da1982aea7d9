//! InspectMaker: attach user scripts to a page and run them automatically.
//!
//! The engine lives in the workspace crates, re-exported here:
//!
//! - [`config`] - script definitions, URL matching, engine settings
//! - [`page`] - the page model and its JavaScript main world
//! - [`scripting`] - trigger scheduler, execution bridge, lifecycle manager
//!
//! This crate adds the outer process: the [`cli`], the stdio command
//! [`host`], JSON script [`storage`] and the [`debug`] log bridge.

pub use inspectmaker_config as config;
pub use inspectmaker_page as page;
pub use inspectmaker_scripting as scripting;

pub mod cli;
pub mod debug;
pub mod host;
pub mod storage;

use inspectmaker_config::EngineSettings;
use inspectmaker_page::Page;
use inspectmaker_scripting::BRIDGE_SCRIPT;

/// A page at `url` exposing the bridge script at the configured resource URL.
pub fn build_page(url: &str, settings: &EngineSettings) -> Page {
    Page::builder(url)
        .resource(settings.bridge_resource_url.clone(), BRIDGE_SCRIPT)
        .build()
}
