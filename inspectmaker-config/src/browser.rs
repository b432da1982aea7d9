//! Browser families and the bridge methods a script may prefer on each.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Browser family hosting the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Edge,
    Safari,
    Unknown,
}

impl BrowserKind {
    /// Detect the browser family the way a content script does.
    ///
    /// A promise-style `browser` namespace means a Gecko browser; otherwise the
    /// user agent decides. `Edg` is checked before `Chrome` because Edge also
    /// advertises Chrome.
    pub fn detect(user_agent: &str, has_browser_namespace: bool) -> Self {
        if has_browser_namespace {
            return BrowserKind::Firefox;
        }
        if user_agent.contains("Edg") {
            BrowserKind::Edge
        } else if user_agent.contains("Chrome") {
            BrowserKind::Chrome
        } else if user_agent.contains("Safari") {
            BrowserKind::Safari
        } else {
            BrowserKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Edge => "edge",
            BrowserKind::Safari => "safari",
            BrowserKind::Unknown => "unknown",
        }
    }
}

impl From<String> for BrowserKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "chrome" => BrowserKind::Chrome,
            "firefox" => BrowserKind::Firefox,
            "edge" => BrowserKind::Edge,
            "safari" => BrowserKind::Safari,
            _ => BrowserKind::Unknown,
        }
    }
}

impl From<BrowserKind> for String {
    fn from(kind: BrowserKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How code is carried into the page's main world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BridgeMethod {
    /// Native "execute in page" browser API, falling back to [`BridgeMethod::Standard`].
    BrowserApi,
    /// Inline `<script>` element carrying the code itself.
    EvalInjection,
    /// Externally loaded bridge script driven by window messages.
    #[default]
    Standard,
}

impl BridgeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeMethod::BrowserApi => "browser-api",
            BridgeMethod::EvalInjection => "eval-injection",
            BridgeMethod::Standard => "standard",
        }
    }
}

/// Unrecognised method names select the standard bridge.
impl From<String> for BridgeMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "browser-api" => BridgeMethod::BrowserApi,
            "eval-injection" => BridgeMethod::EvalInjection,
            _ => BridgeMethod::Standard,
        }
    }
}

impl From<BridgeMethod> for String {
    fn from(method: BridgeMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for BridgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser selection in the engine settings: a fixed family or detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserSetting {
    #[default]
    Auto,
    Chrome,
    Firefox,
    Edge,
    Safari,
    Unknown,
}

impl BrowserSetting {
    /// Resolve to a concrete family, detecting when set to `auto`.
    pub fn resolve(&self, user_agent: &str, has_browser_namespace: bool) -> BrowserKind {
        match self {
            BrowserSetting::Auto => BrowserKind::detect(user_agent, has_browser_namespace),
            BrowserSetting::Chrome => BrowserKind::Chrome,
            BrowserSetting::Firefox => BrowserKind::Firefox,
            BrowserSetting::Edge => BrowserKind::Edge,
            BrowserSetting::Safari => BrowserKind::Safari,
            BrowserSetting::Unknown => BrowserKind::Unknown,
        }
    }
}
