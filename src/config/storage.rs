//! Persistent preference storage
//!
//! A small JSON key-value store. The registry keeps the ordered list of
//! known repository paths under [`SAVED_REPOSITORIES_KEY`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

use super::Config;

/// Key under which the known repository paths are stored
pub const SAVED_REPOSITORIES_KEY: &str = "savedRepositories";

/// Key-value preference store persisted as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceStore {
    /// Stored values by key
    #[serde(default)]
    values: BTreeMap<String, Value>,

    /// Path to save to (not serialized, set at load time)
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl PreferenceStore {
    /// Create an empty, unbacked store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from the default location
    pub fn load() -> Result<Self> {
        let path = Config::preferences_file_path()?;
        Self::load_from(&path)
    }

    /// Load the store from a specific path
    ///
    /// A missing file yields an empty store that will be written there.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                values: BTreeMap::new(),
                path: Some(path.to_path_buf()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to read preferences file: {}", e))
        })?;

        let mut store: PreferenceStore = serde_json::from_str(&content).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to parse preferences file: {}", e))
        })?;
        store.path = Some(path.to_path_buf());

        Ok(store)
    }

    /// Save to the remembered location (no-op for an unbacked store)
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Save the store to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create preferences directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to serialize preferences: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to write preferences file: {}", e))
        })?;

        Ok(())
    }

    /// Read a list of strings; missing or mistyped keys read as empty
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace a list of strings
    pub fn set_string_list<I, S>(&mut self, key: &str, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = items.into_iter().map(|s| Value::String(s.into())).collect();
        self.values.insert(key.to_string(), Value::Array(list));
    }
}
