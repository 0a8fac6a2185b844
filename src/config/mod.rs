//! Configuration and persistence module
//!
//! Handles:
//! - User configuration (`config.toml` in the platform config directory)
//! - Preference store (`preferences.json` with the known repository paths)

mod settings;
mod storage;

pub use settings::*;
pub use storage::*;
