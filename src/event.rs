//! Engine notifications
//!
//! The presentation layer subscribes to an [`EventBus`] and re-reads the
//! snapshots it cares about when an event arrives. Events carry ids, not
//! state, so a slow subscriber never observes stale data.

use tokio::sync::broadcast;
use tracing::trace;

use crate::repository::{Outcome, RepositoryId, StatusMessage};

/// Default broadcast buffer per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A repository was added to the registry
    RepositoryOpened { id: RepositoryId },
    /// A repository was removed from the registry
    RepositoryClosed { id: RepositoryId },
    /// The current selection changed
    SelectionChanged { id: Option<RepositoryId> },
    /// A full refresh replaced branches, remotes, changes and stashes
    SnapshotUpdated { id: RepositoryId },
    /// The watcher saw a different change list
    ChangesUpdated { id: RepositoryId },
    /// History was re-read
    CommitsUpdated { id: RepositoryId },
    /// A mutating operation began; the busy flag is set
    OperationStarted { id: RepositoryId, label: String },
    /// A mutating operation ended; the busy flag is cleared
    OperationFinished {
        id: RepositoryId,
        label: String,
        outcome: Outcome,
    },
    /// A status log entry was appended
    StatusLogged(StatusMessage),
}

/// Fan-out channel for [`EngineEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publish to every current observer
    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is fine: nobody is rendering
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
