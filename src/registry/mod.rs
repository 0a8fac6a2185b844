//! Registry of opened repositories and the shared status log

mod manager;
mod status_log;

pub use manager::RepositoryRegistry;
pub use status_log::*;
