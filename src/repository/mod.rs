//! Per-repository state
//!
//! - `RepositoryState` - snapshot, refresh and change detection
//! - `Operation` - mutating commands with the busy flag lifecycle
//! - `ChangeWatcher` - periodic working tree polling

mod executor;
mod state;
mod types;
mod watcher;

pub use executor::*;
pub use state::RepositoryState;
pub use types::*;
pub use watcher::*;
