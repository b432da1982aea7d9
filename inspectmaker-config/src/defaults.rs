//! Default value functions.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes and by the
//! trigger strategies when a script leaves a parameter unset.

use std::time::Duration;

// ── Primitive helpers ──────────────────────────────────────────────────────

pub fn bool_true() -> bool {
    true
}

// ── Trigger parameters ─────────────────────────────────────────────────────

/// `delayed` mode wait when `delayTime` is missing or zero.
pub const DELAY_TIME_MS: u64 = 1000;

/// `persistent` mode period when `persistentInterval` is missing or zero.
pub const PERSISTENT_INTERVAL_MS: u64 = 5000;

/// `elementCreated` mode selector when `targetSelector` is missing or blank.
pub const TARGET_SELECTOR: &str = "div";

pub fn delay_time() -> Duration {
    Duration::from_millis(DELAY_TIME_MS)
}

pub fn persistent_interval() -> Duration {
    Duration::from_millis(PERSISTENT_INTERVAL_MS)
}

pub fn target_selector() -> String {
    TARGET_SELECTOR.to_string()
}

// ── Engine settings ────────────────────────────────────────────────────────

pub fn bridge_resource_url() -> String {
    "chrome-extension://inspectmaker/js/inject.js".to_string()
}

pub fn url_poll_interval_ms() -> u64 {
    1000
}

pub fn log_level() -> String {
    "info".to_string()
}
