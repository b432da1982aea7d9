//! Typed error variants for the inspectmaker-config crate.

use thiserror::Error;

/// Errors that can occur when loading or saving engine settings or script lists.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing a file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file contained invalid YAML.
    #[error("YAML parse error in config: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A script list contained invalid JSON.
    #[error("JSON parse error in script list: {0}")]
    Json(#[from] serde_json::Error),

    /// A field value failed semantic validation.
    #[error("Config validation error: {0}")]
    Validation(String),
}
