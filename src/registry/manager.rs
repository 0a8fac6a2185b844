//! Repository registry - the set of opened repositories
//!
//! Owns every `RepositoryState` and its watcher, tracks the current
//! selection, and persists the opened paths so they can be restored on the
//! next start.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use super::StatusLog;
use crate::config::{PreferenceStore, SAVED_REPOSITORIES_KEY};
use crate::context::EngineContext;
use crate::error::{Error, RepositoryError, Result};
use crate::event::EngineEvent;
use crate::git::GitCommand;
use crate::repository::{
    ChangeWatcher, RepositoryId, RepositorySnapshot, RepositoryState, StatusMessage, WatchToken,
};

/// Name of git's metadata directory
const METADATA_DIR: &str = ".git";

struct OpenRepository {
    state: RepositoryState,
    watcher: WatchToken,
}

/// Registry of opened repositories
pub struct RepositoryRegistry {
    ctx: EngineContext,
    /// Open order is kept
    repositories: RwLock<Vec<OpenRepository>>,
    current: RwLock<Option<RepositoryId>>,
    preferences: Mutex<PreferenceStore>,
    last_error: RwLock<Option<String>>,
    /// Number of open/clone/create calls in flight
    loading: AtomicUsize,
}

/// Keeps `is_loading` true while alive
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RepositoryRegistry {
    pub fn new(ctx: EngineContext, preferences: PreferenceStore) -> Self {
        Self {
            ctx,
            repositories: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            preferences: Mutex::new(preferences),
            last_error: RwLock::new(None),
            loading: AtomicUsize::new(0),
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn log(&self) -> &StatusLog {
        &self.ctx.log
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.ctx.events.subscribe()
    }

    /// Open a working directory, or select it if already open
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<RepositoryId> {
        let _loading = LoadingGuard::enter(&self.loading);
        let path = path.as_ref();
        self.ctx
            .log
            .info(format!("Opening repository at {}...", path.display()));

        let path = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        if let Some(id) = self.find_by_path(&path).await {
            debug!(repo = %id, "already open");
            if self.activate(id).await? {
                self.ctx.log.success("Repository opened successfully");
            }
            return Ok(id);
        }

        if !is_repository(&path).await {
            let message = "Not a valid Git repository".to_string();
            self.ctx
                .log
                .error(format!("Failed to open repository: {}", message));
            self.set_error(message).await;
            return Err(RepositoryError::NotARepository(path).into());
        }

        let state = RepositoryState::new(self.ctx.clone(), path.clone());
        let id = state.id();
        {
            let mut repositories = self.repositories.write().await;
            // Another open of the same path may have won the race
            let existing = repositories
                .iter()
                .find(|r| r.state.path() == path)
                .map(|r| r.state.id());
            if let Some(existing) = existing {
                drop(repositories);
                self.select(existing).await?;
                return Ok(existing);
            }
            let watcher = ChangeWatcher::start(state.clone(), self.ctx.config.watch_interval());
            repositories.push(OpenRepository { state, watcher });
        }
        self.ctx.events.emit(EngineEvent::RepositoryOpened { id });
        info!(repo = %id, "repository opened");

        let refreshed = self.activate(id).await?;
        self.persist().await;
        // A failed refresh has already been logged as an error
        if refreshed {
            self.ctx.log.success("Repository opened successfully");
        }
        Ok(id)
    }

    /// Clone `url` into `dest` and open the result
    #[instrument(skip(self, dest), fields(dest = %dest.as_ref().display()))]
    pub async fn clone_repository(
        &self,
        url: &str,
        dest: impl AsRef<Path>,
    ) -> Result<RepositoryId> {
        let _loading = LoadingGuard::enter(&self.loading);
        let dest = dest.as_ref();
        self.ctx.log.info(format!(
            "Cloning repository from {} to {}...",
            url,
            dest.display()
        ));

        let command = GitCommand::global([
            "clone".to_string(),
            url.to_string(),
            dest.to_string_lossy().into_owned(),
        ])
        .merged();

        let output = match self.ctx.runner.run(&command).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                return Err(self.clone_failed(output.text).await);
            }
            Err(e) => {
                return Err(self.clone_failed(e.to_string()).await);
            }
        };
        debug!(output = %output.text.trim(), "clone finished");

        self.ctx.log.success("Repository cloned successfully");
        self.open(dest).await
    }

    async fn clone_failed(&self, output: String) -> Error {
        let output = output.trim().to_string();
        self.ctx
            .log
            .error(format!("Failed to clone repository: {}", output));
        self.set_error(format!("Failed to clone: {}", output)).await;
        RepositoryError::CloneFailed(output).into()
    }

    /// Create `path` if needed, initialize a repository there and open it
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn create(&self, path: impl AsRef<Path>) -> Result<RepositoryId> {
        let _loading = LoadingGuard::enter(&self.loading);
        let path = path.as_ref();
        self.ctx
            .log
            .info(format!("Creating repository at {}...", path.display()));

        if let Err(e) = tokio::fs::create_dir_all(path).await {
            self.ctx
                .log
                .error(format!("Failed to create directory: {}", e));
            self.set_error(format!("Failed to create directory: {}", e))
                .await;
            return Err(RepositoryError::Filesystem {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into());
        }

        let command = GitCommand::in_repo(path, ["init"]).merged();
        let failure = match self.ctx.runner.run(&command).await {
            Ok(output) if output.success() => None,
            Ok(output) => Some(output.text.trim().to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(output) = failure {
            self.ctx
                .log
                .error(format!("Failed to create repository: {}", output));
            self.set_error(format!("Failed to create repository: {}", output))
                .await;
            return Err(RepositoryError::InitFailed(output).into());
        }

        self.ctx.log.success("Repository created successfully");
        self.open(path).await
    }

    /// Make `id` current, refreshing it and loading its history
    pub async fn select(&self, id: RepositoryId) -> Result<()> {
        self.activate(id).await.map(|_| ())
    }

    /// Select `id`, returning whether its refresh succeeded
    async fn activate(&self, id: RepositoryId) -> Result<bool> {
        let state = self.require(id).await?;
        *self.current.write().await = Some(id);

        // Failures are already in the status log
        let refreshed = match state.refresh().await {
            Ok(()) => true,
            Err(e) => {
                self.set_error(e.to_string()).await;
                false
            }
        };
        if let Err(e) = state.fetch_commits().await {
            warn!(repo = %id, error = %e, "failed to load history");
        }

        self.ctx
            .events
            .emit(EngineEvent::SelectionChanged { id: Some(id) });
        Ok(refreshed)
    }

    /// Stop watching and forget a repository
    pub async fn close(&self, id: RepositoryId) -> Result<()> {
        let removed = {
            let mut repositories = self.repositories.write().await;
            let index = repositories
                .iter()
                .position(|r| r.state.id() == id)
                .ok_or(RepositoryError::NotFound(id))?;
            repositories.remove(index)
        };
        removed.watcher.stop().await;

        {
            let mut current = self.current.write().await;
            if *current == Some(id) {
                *current = None;
                self.ctx
                    .events
                    .emit(EngineEvent::SelectionChanged { id: None });
            }
        }

        self.persist().await;
        self.ctx.events.emit(EngineEvent::RepositoryClosed { id });
        info!(repo = %id, "repository closed");
        Ok(())
    }

    /// Restore repositories saved by a previous session
    ///
    /// Paths that no longer hold a repository are skipped. Restored
    /// repositories are refreshed concurrently; nothing is selected.
    #[instrument(skip(self))]
    pub async fn load_saved(&self) -> Vec<RepositoryId> {
        let saved = self
            .preferences
            .lock()
            .await
            .string_list(SAVED_REPOSITORIES_KEY);

        let mut restored = Vec::new();
        for path in saved.into_iter().map(PathBuf::from) {
            if !is_repository(&path).await {
                debug!(path = %path.display(), "skipping saved path without repository");
                continue;
            }
            if self.find_by_path(&path).await.is_some() {
                continue;
            }

            let state = RepositoryState::new(self.ctx.clone(), path);
            let watcher = ChangeWatcher::start(state.clone(), self.ctx.config.watch_interval());
            self.repositories.write().await.push(OpenRepository {
                state: state.clone(),
                watcher,
            });
            self.ctx
                .events
                .emit(EngineEvent::RepositoryOpened { id: state.id() });
            restored.push(state);
        }

        let results = join_all(restored.iter().map(|state| state.refresh())).await;
        for (state, result) in restored.iter().zip(results) {
            if let Err(e) = result {
                warn!(repo = %state.id(), error = %e, "failed to refresh restored repository");
            }
        }

        info!(count = restored.len(), "restored saved repositories");
        restored.iter().map(RepositoryState::id).collect()
    }

    /// Handles to every open repository, in open order
    pub async fn repositories(&self) -> Vec<RepositoryState> {
        self.repositories
            .read()
            .await
            .iter()
            .map(|r| r.state.clone())
            .collect()
    }

    pub async fn snapshots(&self) -> Vec<RepositorySnapshot> {
        let repositories = self.repositories().await;
        let mut snapshots = Vec::with_capacity(repositories.len());
        for repo in &repositories {
            snapshots.push(repo.snapshot().await);
        }
        snapshots
    }

    pub async fn get(&self, id: RepositoryId) -> Option<RepositoryState> {
        self.repositories
            .read()
            .await
            .iter()
            .find(|r| r.state.id() == id)
            .map(|r| r.state.clone())
    }

    pub async fn current_id(&self) -> Option<RepositoryId> {
        *self.current.read().await
    }

    /// The selected repository
    pub async fn current(&self) -> Option<RepositoryState> {
        let id = self.current_id().await?;
        self.get(id).await
    }

    pub fn status_messages(&self) -> Vec<StatusMessage> {
        self.ctx.log.entries()
    }

    pub fn clear_status_messages(&self) {
        self.ctx.log.clear();
    }

    /// Last user-visible error
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub async fn clear_error(&self) {
        *self.last_error.write().await = None;
    }

    /// Whether an open, clone or create is in progress
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Stop every watcher
    pub async fn shutdown(&self) {
        let repositories = std::mem::take(&mut *self.repositories.write().await);
        for repo in repositories {
            repo.watcher.stop().await;
        }
        debug!("registry shut down");
    }

    async fn require(&self, id: RepositoryId) -> Result<RepositoryState> {
        self.get(id)
            .await
            .ok_or_else(|| RepositoryError::NotFound(id).into())
    }

    async fn find_by_path(&self, path: &Path) -> Option<RepositoryId> {
        self.repositories
            .read()
            .await
            .iter()
            .find(|r| r.state.path() == path)
            .map(|r| r.state.id())
    }

    async fn set_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }

    /// Write the open paths to the preference store
    async fn persist(&self) {
        let paths: Vec<String> = self
            .repositories
            .read()
            .await
            .iter()
            .map(|r| r.state.path().to_string_lossy().into_owned())
            .collect();

        let mut preferences = self.preferences.lock().await;
        preferences.set_string_list(SAVED_REPOSITORIES_KEY, paths);
        if let Err(e) = preferences.save() {
            warn!(error = %e, "failed to save repository list");
        }
    }
}

async fn is_repository(path: &Path) -> bool {
    tokio::fs::try_exists(path.join(METADATA_DIR))
        .await
        .unwrap_or(false)
}
