//! Live state of one working directory
//!
//! A [`RepositoryState`] is a cheap, cloneable handle. Every clone shares the
//! same snapshot, so handles given to the UI stay valid across refreshes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};
use xxhash_rust::xxh3::xxh3_64;

use super::{
    Branch, Commit, FileChange, Remote, RepositoryId, RepositorySnapshot, Stash,
    display_name_for,
};
use crate::context::EngineContext;
use crate::error::Result;
use crate::event::EngineEvent;
use crate::git::{FileDiff, GitCommand, parser};

const BRANCH_QUERY: &[&str] = &["branch", "--list", "--all"];
const CURRENT_BRANCH_QUERY: &[&str] = &["symbolic-ref", "--short", "-q", "HEAD"];
const REMOTE_QUERY: &[&str] = &["remote", "-v"];
const STATUS_QUERY: &[&str] = &["status", "--porcelain"];
const STASH_QUERY: &[&str] = &["stash", "list"];
const LOG_QUERY: &[&str] = &["log", parser::LOG_FORMAT, "--date=short"];

/// Everything a full refresh replaces
struct StatusQueries {
    branches: Vec<Branch>,
    current_branch: String,
    remotes: Vec<Remote>,
    changes: Vec<FileChange>,
    changes_digest: u64,
    stashes: Vec<Stash>,
}

/// Handle to one opened repository
#[derive(Debug, Clone)]
pub struct RepositoryState {
    id: RepositoryId,
    path: PathBuf,
    display_name: String,
    pub(super) snapshot: Arc<RwLock<RepositorySnapshot>>,
    /// Held for the whole lifetime of a mutating operation
    pub(super) operation_lock: Arc<Mutex<()>>,
    /// xxh3 of the last porcelain status text applied
    changes_digest: Arc<AtomicU64>,
    /// Bumped by every full refresh, under the snapshot write lock
    generation: Arc<AtomicU64>,
    pub(super) ctx: EngineContext,
}

impl RepositoryState {
    /// Create state for a working directory; nothing is queried yet
    pub fn new(ctx: EngineContext, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = RepositoryId::new();
        let display_name = display_name_for(&path);
        let snapshot = RepositorySnapshot::new(id, path.clone());

        Self {
            id,
            path,
            display_name,
            snapshot: Arc::new(RwLock::new(snapshot)),
            operation_lock: Arc::new(Mutex::new(())),
            changes_digest: Arc::new(AtomicU64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            ctx,
        }
    }

    pub fn id(&self) -> RepositoryId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> RepositorySnapshot {
        self.snapshot.read().await.clone()
    }

    /// Whether a mutating operation is in flight
    pub async fn is_busy(&self) -> bool {
        self.snapshot.read().await.operation_in_progress
    }

    /// Re-read branches, current branch, remotes, changes and stashes
    ///
    /// The five fields are swapped in under one write lock. On a runner
    /// error the snapshot is left untouched.
    #[instrument(skip(self), fields(repo = %self.id))]
    pub async fn refresh(&self) -> Result<()> {
        self.ctx.log.info("Refreshing repository status...");

        let queries = match self.load_status().await {
            Ok(queries) => queries,
            Err(e) => {
                self.ctx
                    .log
                    .error(format!("Failed to refresh repository status: {}", e));
                return Err(e);
            }
        };

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.branches = queries.branches;
            snapshot.current_branch = queries.current_branch;
            snapshot.remotes = queries.remotes;
            snapshot.changes = queries.changes;
            snapshot.stashes = queries.stashes;
            self.changes_digest
                .store(queries.changes_digest, Ordering::SeqCst);
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        self.ctx.log.success("Repository status refreshed");
        self.ctx
            .events
            .emit(EngineEvent::SnapshotUpdated { id: self.id });
        Ok(())
    }

    async fn load_status(&self) -> Result<StatusQueries> {
        let branches = parser::parse_branch_list(&self.query(BRANCH_QUERY).await?);
        let current_branch = parser::parse_current_branch(&self.query(CURRENT_BRANCH_QUERY).await?);
        let remotes = parser::parse_remotes(&self.query(REMOTE_QUERY).await?);
        let status = self.query(STATUS_QUERY).await?;
        let stashes = parser::parse_stash_list(&self.query(STASH_QUERY).await?);

        Ok(StatusQueries {
            branches,
            current_branch,
            remotes,
            changes: parser::parse_status(&status),
            changes_digest: xxh3_64(status.as_bytes()),
            stashes,
        })
    }

    /// Re-read only the working tree changes
    ///
    /// Returns `true` when the change list differs from the last one
    /// applied. Nothing else in the snapshot is touched. The result is
    /// dropped if a full refresh completed while the query was running.
    pub async fn refresh_changes(&self) -> Result<bool> {
        let generation = self.generation.load(Ordering::SeqCst);
        let status = self.query(STATUS_QUERY).await?;
        let digest = xxh3_64(status.as_bytes());

        if digest == self.changes_digest.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let changes = parser::parse_status(&status);

        {
            let mut snapshot = self.snapshot.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(repo = %self.id, "discarding change poll older than last refresh");
                return Ok(false);
            }
            debug!(repo = %self.id, count = changes.len(), "working tree changed");
            snapshot.changes = changes;
            self.changes_digest.store(digest, Ordering::SeqCst);
        }

        self.ctx
            .events
            .emit(EngineEvent::ChangesUpdated { id: self.id });
        Ok(true)
    }

    /// Re-read history, newest first
    ///
    /// Empty output (e.g. no commits yet) keeps the previous list.
    #[instrument(skip(self), fields(repo = %self.id))]
    pub async fn fetch_commits(&self) -> Result<usize> {
        let output = self.query(LOG_QUERY).await?;
        if output.is_empty() {
            debug!("no commits found");
            return Ok(self.snapshot.read().await.commits.len());
        }

        let commits: Vec<Commit> = parser::parse_commit_log(&output);
        let count = commits.len();
        self.snapshot.write().await.commits = commits;

        self.ctx
            .events
            .emit(EngineEvent::CommitsUpdated { id: self.id });
        Ok(count)
    }

    /// Unified diff of one working tree file against the index
    pub async fn file_diff(&self, file: &str) -> Result<FileDiff> {
        let output = self.query(&["diff", "--", file]).await?;
        Ok(FileDiff::from_output(file, output))
    }

    async fn query(&self, args: &[&str]) -> Result<String> {
        let command = GitCommand::in_repo(&self.path, args.iter().copied());
        Ok(self.ctx.runner.run(&command).await?.text)
    }
}
