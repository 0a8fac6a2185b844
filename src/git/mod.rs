//! Git subprocess layer
//!
//! Everything the engine knows about git goes through here:
//! - `CommandRunner` / `GitCli` - scoped, time-limited subprocess execution
//! - `parser` - typed records from git's text output
//! - `FileDiff` - per-file diff text and statistics

mod diff;
pub mod parser;
mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use diff::*;
pub use runner::*;
