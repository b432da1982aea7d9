//! Read-only script storage backed by a JSON file.
//!
//! The file holds the extension's stored script list, either as a bare array
//! of script definitions or as an export object `{ "scripts": [...] }`. It is
//! re-read on every request so edits show up on the next page load.

use std::fs;
use std::path::{Path, PathBuf};

use inspectmaker_config::ScriptDefinition;
use inspectmaker_scripting::ScriptSource;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredScripts {
    List(Vec<ScriptDefinition>),
    Export { scripts: Vec<ScriptDefinition> },
}

/// Script list stored in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonScriptStore {
    path: PathBuf,
}

impl JsonScriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored script, enabled or not, in stored order.
    pub fn load(&self) -> Result<Vec<ScriptDefinition>, StorageError> {
        let content = fs::read_to_string(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let stored: StoredScripts =
            serde_json::from_str(&content).map_err(|source| StorageError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(match stored {
            StoredScripts::List(scripts) | StoredScripts::Export { scripts } => scripts,
        })
    }
}

impl ScriptSource for JsonScriptStore {
    fn active_scripts(&self) -> Result<Vec<ScriptDefinition>, String> {
        let scripts = self.load().map_err(|e| e.to_string())?;
        log::debug!(
            "Loaded {} script(s) from {}",
            scripts.len(),
            self.path.display()
        );
        Ok(scripts.into_iter().filter(|script| script.enabled).collect())
    }
}
