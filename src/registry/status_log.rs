//! Shared operational status log
//!
//! One log across all repositories, capped to the most recent entries.
//! Entries are stored oldest first; the newest entry is last.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

use crate::event::{EngineEvent, EventBus};
use crate::repository::{Outcome, StatusMessage};

/// Default number of retained entries
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Capped, append-only status log
///
/// Append and trim happen inside one critical section, so concurrent
/// writers from different repositories are serialized.
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: Arc<Mutex<VecDeque<StatusMessage>>>,
    capacity: usize,
    events: EventBus,
}

impl StatusLog {
    pub fn new(capacity: usize, events: EventBus) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            events,
        }
    }

    /// Append an entry, dropping the oldest beyond capacity
    pub fn push(&self, text: impl Into<String>, outcome: Outcome) -> StatusMessage {
        let message = StatusMessage::new(text, outcome);

        match outcome {
            Outcome::Error => error!(status = %message.text),
            _ => info!(status = %message.text),
        }

        {
            let mut entries = self.lock();
            entries.push_back(message.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }

        self.events.emit(EngineEvent::StatusLogged(message.clone()));
        message
    }

    pub fn info(&self, text: impl Into<String>) -> StatusMessage {
        self.push(text, Outcome::Info)
    }

    pub fn success(&self, text: impl Into<String>) -> StatusMessage {
        self.push(text, Outcome::Success)
    }

    pub fn error(&self, text: impl Into<String>) -> StatusMessage {
        self.push(text, Outcome::Error)
    }

    /// Copy of the retained entries, oldest first
    pub fn entries(&self) -> Vec<StatusMessage> {
        self.lock().iter().cloned().collect()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<StatusMessage> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<StatusMessage>> {
        // A panicking writer cannot leave the deque half-updated
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
