//! Periodic working tree polling
//!
//! Each opened repository gets one watcher task. A tick only re-reads
//! `status --porcelain`; branches, remotes and stashes are left to explicit
//! refreshes.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::{RepositoryId, RepositoryState};

/// Starts polling tasks
pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Poll `repo` for working tree changes every `period`
    pub fn start(repo: RepositoryState, period: Duration) -> WatchToken {
        let id = repo.id();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    // Fires on an explicit stop and when the token is dropped
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = repo.refresh_changes().await {
                            warn!(repo = %repo.id(), error = %e, "change poll failed");
                        }
                    }
                }
            }
            debug!(repo = %repo.id(), "watcher stopped");
        });

        debug!(repo = %id, ?period, "watcher started");
        WatchToken {
            repository: id,
            stop: Some(stop_tx),
            handle,
        }
    }
}

/// Owner of a running watcher; dropping it stops the task
#[derive(Debug)]
pub struct WatchToken {
    repository: RepositoryId,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl WatchToken {
    pub fn repository(&self) -> RepositoryId {
        self.repository
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop polling and wait for the task to exit
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!(repo = %self.repository, error = %e, "watcher task ended abnormally");
        }
    }
}
