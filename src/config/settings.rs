//! User configuration settings
//!
//! Layered configuration: defaults → config file → environment variables

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Git executable (bare name resolved on PATH, or an absolute path)
    pub git_binary: PathBuf,

    /// Per-command timeout in seconds (0 = no timeout)
    pub command_timeout_secs: u64,

    /// Maximum concurrent git subprocesses
    pub max_concurrent_commands: usize,

    /// Interval in seconds between working tree polls
    pub watch_interval_secs: u64,

    /// Number of entries kept in the status log
    pub status_log_capacity: usize,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path (if set, logs to file instead of stderr)
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
            command_timeout_secs: 300,
            max_concurrent_commands: 8,
            watch_interval_secs: 5,
            status_log_capacity: 20,
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration layering the given file over the defaults
    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // GITFLOW_WATCH_INTERVAL_SECS, GITFLOW_GIT_BINARY, ...
            .merge(Env::prefixed("GITFLOW_"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, reason: &str| -> Result<()> {
            Err(Error::Config(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: reason.to_string(),
            }))
        };

        if self.watch_interval_secs == 0 {
            return invalid("watch_interval_secs", "must be greater than 0");
        }
        if self.max_concurrent_commands == 0 {
            return invalid("max_concurrent_commands", "must be greater than 0");
        }
        if self.status_log_capacity == 0 {
            return invalid("status_log_capacity", "must be greater than 0");
        }
        if self.git_binary.as_os_str().is_empty() {
            return invalid("git_binary", "must not be empty");
        }

        Ok(())
    }

    /// Subprocess deadline, `None` when disabled
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// Working tree poll period
    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Get the preference store path
    pub fn preferences_file_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("preferences.json"))
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = Self::project_dirs()?;

        for dir in [dirs.config_dir(), dirs.data_dir()] {
            std::fs::create_dir_all(dir).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(dir.to_path_buf()))
            })?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }

        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        std::fs::write(&config_path, toml).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "gitflow", "gitflow").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}
