//! gitflow - repository state synchronization engine for a desktop git client
//!
//! The engine runs the `git` binary against working directories, parses its
//! output into a typed model, serializes mutating operations per repository
//! and keeps every opened repository fresh with background polling.
//!
//! # Architecture
//!
//! - **RepositoryRegistry** - opened repositories, selection, persistence
//! - **RepositoryState** - per-repository snapshot and refresh logic
//! - **ChangeWatcher** - periodic re-poll of the working tree changes
//! - **CommandRunner** - the only seam to the `git` subprocess
//!
//! Components share an [`EngineContext`] instead of global state; the
//! presentation layer subscribes to [`event::EventBus`] notifications and
//! reads snapshots.
//!
//! # Modules
//!
//! - [`registry`] - repository registry and status log
//! - [`repository`] - per-repository state, operations and watcher
//! - [`git`] - subprocess runner, output parsers and diffs
//! - [`config`] - configuration and the preference store
//! - [`event`] - engine notifications
//! - [`error`] - error types

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod git;
pub mod registry;
pub mod repository;

pub use config::{Config, PreferenceStore};
pub use context::EngineContext;
pub use error::{Error, Result};
pub use event::{EngineEvent, EventBus};
pub use registry::{RepositoryRegistry, StatusLog};
pub use repository::{
    Operation, OperationOutcome, Outcome, RepositoryId, RepositorySnapshot, RepositoryState,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
