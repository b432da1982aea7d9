//! Script definitions as stored by the extension.
//!
//! The stored form is a flat JSON object with one optional field per trigger
//! parameter (`delayTime`, `eventTrigger`, ...). In Rust the trigger is a
//! [`TriggerMode`] where each variant carries only its own parameters; the
//! conversion happens in the [`ScriptRecord`] wire type.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::{BridgeMethod, BrowserKind};
use crate::defaults;

/// Stable script identifier assigned by storage.
pub type ScriptId = u64;

/// Prefix selecting a user-defined DOM event name in `eventTrigger`.
pub const CUSTOM_EVENT_PREFIX: &str = "custom:";

/// A user script and the policy deciding when it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScriptRecord", into = "ScriptRecord")]
pub struct ScriptDefinition {
    pub id: ScriptId,
    pub name: String,
    pub code: String,
    pub enabled: bool,
    pub trigger: TriggerMode,
    pub url_patterns: Vec<UrlPattern>,
    pub browser_specific_injection: HashMap<BrowserKind, BridgeMethod>,
}

impl ScriptDefinition {
    /// Create an enabled script with no URL restrictions.
    pub fn new(id: ScriptId, code: impl Into<String>, trigger: TriggerMode) -> Self {
        Self {
            id,
            name: String::new(),
            code: code.into(),
            enabled: true,
            trigger,
            url_patterns: Vec::new(),
            browser_specific_injection: HashMap::new(),
        }
    }

    /// Bridge method this script prefers on `browser` (standard when unset).
    pub fn bridge_method(&self, browser: BrowserKind) -> BridgeMethod {
        self.browser_specific_injection
            .get(&browser)
            .copied()
            .unwrap_or_default()
    }
}

/// When a script runs. Parameters are already resolved to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerMode {
    /// Run once, as soon as the script is armed.
    Instantaneous,
    /// Run once after `delay`.
    Delayed { delay: Duration },
    /// Run on every dispatch of a document event. `None` arms nothing.
    EventBased { trigger: Option<EventTrigger> },
    /// Run every `interval`.
    Persistent { interval: Duration },
    /// Run whenever the page location changes.
    UrlBased,
    /// Run whenever an added node, or one of its descendants, matches `selector`.
    ElementCreated { selector: String },
    /// Run after each completed network request whose URL contains `url_filter`.
    AjaxInterceptor { url_filter: Option<String> },
    /// Run after `pushState`, `replaceState` and `popstate`.
    HistoryStateChanged,
}

impl TriggerMode {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerMode::Instantaneous => TriggerKind::Instantaneous,
            TriggerMode::Delayed { .. } => TriggerKind::Delayed,
            TriggerMode::EventBased { .. } => TriggerKind::EventBased,
            TriggerMode::Persistent { .. } => TriggerKind::Persistent,
            TriggerMode::UrlBased => TriggerKind::UrlBased,
            TriggerMode::ElementCreated { .. } => TriggerKind::ElementCreated,
            TriggerMode::AjaxInterceptor { .. } => TriggerKind::AjaxInterceptor,
            TriggerMode::HistoryStateChanged => TriggerKind::HistoryStateChanged,
        }
    }

    /// Delayed trigger; a zero delay means the default.
    pub fn delayed_ms(ms: u64) -> Self {
        TriggerMode::Delayed {
            delay: millis_or(ms, defaults::DELAY_TIME_MS),
        }
    }

    /// Persistent trigger; a zero interval means the default.
    pub fn persistent_ms(ms: u64) -> Self {
        TriggerMode::Persistent {
            interval: millis_or(ms, defaults::PERSISTENT_INTERVAL_MS),
        }
    }

    pub fn event(trigger: &str) -> Self {
        TriggerMode::EventBased {
            trigger: EventTrigger::parse(trigger),
        }
    }

    pub fn element_created(selector: &str) -> Self {
        TriggerMode::ElementCreated {
            selector: non_blank(Some(selector)).unwrap_or_else(defaults::target_selector),
        }
    }

    pub fn ajax(url_filter: Option<&str>) -> Self {
        TriggerMode::AjaxInterceptor {
            url_filter: non_blank(url_filter),
        }
    }
}

/// Name-only view of [`TriggerMode`], matching the stored `injectionMode` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Instantaneous,
    Delayed,
    EventBased,
    Persistent,
    UrlBased,
    ElementCreated,
    AjaxInterceptor,
    HistoryStateChanged,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Instantaneous => "instantaneous",
            TriggerKind::Delayed => "delayed",
            TriggerKind::EventBased => "eventBased",
            TriggerKind::Persistent => "persistent",
            TriggerKind::UrlBased => "urlBased",
            TriggerKind::ElementCreated => "elementCreated",
            TriggerKind::AjaxInterceptor => "ajaxInterceptor",
            TriggerKind::HistoryStateChanged => "historyStateChanged",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "instantaneous" => TriggerKind::Instantaneous,
            "delayed" => TriggerKind::Delayed,
            "eventBased" => TriggerKind::EventBased,
            "persistent" => TriggerKind::Persistent,
            "urlBased" => TriggerKind::UrlBased,
            "elementCreated" => TriggerKind::ElementCreated,
            "ajaxInterceptor" => TriggerKind::AjaxInterceptor,
            "historyStateChanged" => TriggerKind::HistoryStateChanged,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document event an `eventBased` script listens for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTrigger {
    /// A native DOM event such as `click`.
    Native(String),
    /// A user-defined event, written `custom:<name>` in storage.
    Custom(String),
}

impl EventTrigger {
    /// Parse a stored `eventTrigger`; blank values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix(CUSTOM_EVENT_PREFIX) {
            Some(name) => Some(EventTrigger::Custom(name.to_string())),
            None => Some(EventTrigger::Native(raw.to_string())),
        }
    }

    /// Event name actually registered on the document.
    pub fn event_name(&self) -> &str {
        match self {
            EventTrigger::Native(name) | EventTrigger::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTrigger::Native(name) => f.write_str(name),
            EventTrigger::Custom(name) => write!(f, "{CUSTOM_EVENT_PREFIX}{name}"),
        }
    }
}

/// One entry of a script's `urlPatterns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UrlPatternRecord")]
pub struct UrlPattern {
    pub text: String,
    pub enabled: bool,
}

impl UrlPattern {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enabled: true,
        }
    }

    pub fn disabled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enabled: false,
        }
    }
}

/// Stored pattern: either a bare string or `{text, enabled}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UrlPatternRecord {
    Text(String),
    Entry {
        #[serde(default)]
        text: String,
        #[serde(default)]
        enabled: Option<bool>,
    },
}

impl From<UrlPatternRecord> for UrlPattern {
    fn from(record: UrlPatternRecord) -> Self {
        match record {
            UrlPatternRecord::Text(text) => UrlPattern::new(text),
            UrlPatternRecord::Entry { text, enabled } => UrlPattern {
                text,
                enabled: enabled.unwrap_or(true),
            },
        }
    }
}

/// Flat storage layout of a script definition.
///
/// Mode parameters are read leniently: numbers may arrive as strings from
/// form inputs, and anything unusable falls back to the mode default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptRecord {
    id: ScriptId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default)]
    code: String,
    #[serde(default = "crate::defaults::bool_true")]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    injection_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    persistent_interval: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ajax_url_filter: Option<String>,
    #[serde(default)]
    url_patterns: Vec<UrlPattern>,
    #[serde(default)]
    browser_specific_injection: HashMap<BrowserKind, BridgeMethod>,
}

impl From<ScriptRecord> for ScriptDefinition {
    fn from(record: ScriptRecord) -> Self {
        let mode = record.injection_mode.as_deref().unwrap_or("instantaneous");
        let kind = TriggerKind::parse(mode).unwrap_or_else(|| {
            log::warn!(
                "Script {}: unknown injection mode {:?}, running it instantaneously",
                record.id,
                mode
            );
            TriggerKind::Instantaneous
        });

        let trigger = match kind {
            TriggerKind::Instantaneous => TriggerMode::Instantaneous,
            TriggerKind::Delayed => TriggerMode::delayed_ms(lenient_millis(&record.delay_time)),
            TriggerKind::EventBased => TriggerMode::EventBased {
                trigger: record.event_trigger.as_deref().and_then(EventTrigger::parse),
            },
            TriggerKind::Persistent => {
                TriggerMode::persistent_ms(lenient_millis(&record.persistent_interval))
            }
            TriggerKind::UrlBased => TriggerMode::UrlBased,
            TriggerKind::ElementCreated => TriggerMode::ElementCreated {
                selector: non_blank(record.target_selector.as_deref())
                    .unwrap_or_else(defaults::target_selector),
            },
            TriggerKind::AjaxInterceptor => TriggerMode::ajax(record.ajax_url_filter.as_deref()),
            TriggerKind::HistoryStateChanged => TriggerMode::HistoryStateChanged,
        };

        ScriptDefinition {
            id: record.id,
            name: record.name,
            code: record.code,
            enabled: record.enabled,
            trigger,
            url_patterns: record.url_patterns,
            browser_specific_injection: record.browser_specific_injection,
        }
    }
}

impl From<ScriptDefinition> for ScriptRecord {
    fn from(script: ScriptDefinition) -> Self {
        let mut record = ScriptRecord {
            id: script.id,
            name: script.name,
            code: script.code,
            enabled: script.enabled,
            injection_mode: Some(script.trigger.kind().as_str().to_string()),
            delay_time: None,
            event_trigger: None,
            persistent_interval: None,
            target_selector: None,
            ajax_url_filter: None,
            url_patterns: script.url_patterns,
            browser_specific_injection: script.browser_specific_injection,
        };
        match script.trigger {
            TriggerMode::Delayed { delay } => {
                record.delay_time = Some(Value::from(delay.as_millis() as u64));
            }
            TriggerMode::EventBased { trigger } => {
                record.event_trigger = trigger.map(|t| t.to_string());
            }
            TriggerMode::Persistent { interval } => {
                record.persistent_interval = Some(Value::from(interval.as_millis() as u64));
            }
            TriggerMode::ElementCreated { selector } => record.target_selector = Some(selector),
            TriggerMode::AjaxInterceptor { url_filter } => record.ajax_url_filter = url_filter,
            TriggerMode::Instantaneous
            | TriggerMode::UrlBased
            | TriggerMode::HistoryStateChanged => {}
        }
        record
    }
}

/// Milliseconds from a stored number or numeric string; 0 when unusable.
fn lenient_millis(value: &Option<Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

fn millis_or(ms: u64, default_ms: u64) -> Duration {
    Duration::from_millis(if ms == 0 { default_ms } else { ms })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
