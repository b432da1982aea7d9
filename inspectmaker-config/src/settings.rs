//! Engine settings: browser selection, bridge resource, polling and matching.
//!
//! Stored as YAML at `~/.config/inspectmaker/config.yaml` (the platform config
//! directory on Windows). Every field has a default so a partial or missing
//! file still yields a usable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserSetting;
use crate::error::ConfigError;
use crate::matcher::MatchMode;

/// Settings shared by every page instance of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Browser family, or `auto` to detect it from the page.
    #[serde(default)]
    pub browser: BrowserSetting,

    /// URL at which the host exposes the standard bridge script to pages.
    #[serde(default = "crate::defaults::bridge_resource_url")]
    pub bridge_resource_url: String,

    /// Polling period of `urlBased` triggers, in milliseconds.
    #[serde(default = "crate::defaults::url_poll_interval_ms")]
    pub url_poll_interval_ms: u64,

    /// How URL patterns are tested against the page location.
    #[serde(default)]
    pub url_matching: MatchMode,

    /// Default log level (`off`, `error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "crate::defaults::log_level")]
    pub log_level: String,

    /// Script list used by the CLI when `--scripts` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts_path: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            browser: BrowserSetting::default(),
            bridge_resource_url: crate::defaults::bridge_resource_url(),
            url_poll_interval_ms: crate::defaults::url_poll_interval_ms(),
            url_matching: MatchMode::default(),
            log_level: crate::defaults::log_level(),
            scripts_path: None,
        }
    }
}

impl EngineSettings {
    /// Load settings from the default path, writing defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        log::info!("Config path: {:?}", path);
        if path.exists() {
            Self::load_from(&path)
        } else {
            log::info!("No config found, creating default at {:?}", path);
            let settings = Self::default();
            if let Err(e) = settings.save_to(&path) {
                log::warn!("Failed to write default config: {e}");
            }
            Ok(settings)
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: EngineSettings = serde_yaml_ng::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to `path` atomically (temp file, then rename).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml_ng::to_string(self)?;
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge_resource_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "bridge_resource_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Polling period of `urlBased` triggers; zero means the default.
    pub fn url_poll_interval(&self) -> Duration {
        let ms = match self.url_poll_interval_ms {
            0 => crate::defaults::url_poll_interval_ms(),
            ms => ms,
        };
        Duration::from_millis(ms)
    }

    /// Parsed `log_level`, falling back to `Info` for unknown names.
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Get the configuration file path (XDG convention outside Windows).
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir()
                .map(|dir| dir.join("inspectmaker"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir()
                .map(|home| home.join(".config").join("inspectmaker"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }
}
