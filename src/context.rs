//! Shared engine context
//!
//! One value handed to every component instead of process-wide globals:
//! configuration, the git runner, the status log and the event bus.

use std::sync::Arc;

use crate::config::Config;
use crate::event::EventBus;
use crate::git::{CommandRunner, GitCli};
use crate::registry::StatusLog;

#[derive(Debug, Clone)]
pub struct EngineContext {
    pub config: Arc<Config>,
    pub runner: Arc<dyn CommandRunner>,
    pub log: StatusLog,
    pub events: EventBus,
}

impl EngineContext {
    /// Context backed by the real git binary
    pub fn new(config: Config) -> Self {
        let runner = Arc::new(GitCli::from_config(&config));
        Self::with_runner(config, runner)
    }

    /// Context with a custom runner
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        let events = EventBus::new();
        let log = StatusLog::new(config.status_log_capacity, events.clone());

        Self {
            config: Arc::new(config),
            runner,
            log,
            events,
        }
    }
}
