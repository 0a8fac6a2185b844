//! Error types for gitflow
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::repository::RepositoryId;

/// Top-level error type for gitflow
#[derive(Error, Debug)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running the external git binary
///
/// A non-zero exit status is not an error at this level: it is reported
/// through `CommandOutput::exit_code` and classified by the caller.
#[derive(Error, Debug, Clone)]
pub enum GitError {
    #[error("Git is not installed or not in PATH")]
    NotInstalled,

    #[error("Failed to run '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Git command timed out after {0:?}")]
    Timeout(Duration),
}

/// Repository lifecycle errors (open, clone, create, lookup)
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not a valid Git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Repository not found: {0}")]
    NotFound(RepositoryId),

    #[error("Failed to clone: {0}")]
    CloneFailed(String),

    #[error("Failed to initialize repository: {0}")]
    InitFailed(String),

    #[error("Filesystem error at {path}: {reason}")]
    Filesystem { path: PathBuf, reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
