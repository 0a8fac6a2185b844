//! Mutating git operations
//!
//! Operations run on a background task. The busy flag and label are set
//! before [`RepositoryState::spawn_operation`] returns and cleared only after
//! the continuation has finished, so a refresh triggered by the operation is
//! still covered by the busy indicator.

use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{Outcome, RepositoryState};
use crate::event::EngineEvent;
use crate::git::GitCommand;

/// Default remote for pushes
pub const DEFAULT_REMOTE: &str = "origin";

const ERROR_MARKERS: &[&str] = &["error:", "fatal:"];

/// A named mutating command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Push {
        remote: String,
        branch: Option<String>,
    },
    Commit {
        message: String,
    },
    Stage {
        path: String,
    },
    Unstage {
        path: String,
    },
    StageAll,
    Checkout {
        branch: String,
    },
    /// Creates the branch and switches to it
    CreateBranch {
        name: String,
    },
    CreateStash {
        message: Option<String>,
    },
    ApplyStash {
        index: usize,
    },
    /// Irreversible: working tree edits to `path` are lost
    DiscardChanges {
        path: String,
    },
}

impl Operation {
    /// Push the current branch to the default remote
    pub fn push() -> Self {
        Self::Push {
            remote: DEFAULT_REMOTE.to_string(),
            branch: None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pull => "Pull",
            Self::Push { .. } => "Push",
            Self::Commit { .. } => "Commit",
            Self::Stage { .. } => "Stage file",
            Self::Unstage { .. } => "Unstage file",
            Self::StageAll => "Stage all files",
            Self::Checkout { .. } => "Checkout branch",
            Self::CreateBranch { .. } => "Create branch",
            Self::CreateStash { .. } => "Create stash",
            Self::ApplyStash { .. } => "Apply stash",
            Self::DiscardChanges { .. } => "Discard changes",
        }
    }

    /// Arguments passed to git after `-C <path>`
    pub fn args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            Self::Pull => vec!["pull"],
            Self::Push { remote, branch } => {
                let mut args = vec!["push", remote.as_str()];
                args.extend(branch.as_deref());
                args
            }
            Self::Commit { message } => vec!["commit", "-m", message.as_str()],
            Self::Stage { path } => vec!["add", path.as_str()],
            Self::Unstage { path } => vec!["reset", "HEAD", path.as_str()],
            Self::StageAll => vec!["add", "."],
            Self::Checkout { branch } => vec!["checkout", branch.as_str()],
            Self::CreateBranch { name } => vec!["checkout", "-b", name.as_str()],
            Self::CreateStash { message } => {
                let mut args = vec!["stash", "push"];
                if let Some(message) = message {
                    args.extend(["-m", message.as_str()]);
                }
                args
            }
            Self::ApplyStash { index } => {
                return vec![
                    "stash".to_string(),
                    "apply".to_string(),
                    format!("stash@{{{}}}", index),
                ];
            }
            Self::DiscardChanges { path } => vec!["checkout", "--", path.as_str()],
        };
        args.into_iter().map(String::from).collect()
    }

    /// Whether the operation can lose work
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DiscardChanges { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify command output by git's error markers
///
/// Exit codes are not consulted.
pub fn classify_output(text: &str) -> Outcome {
    if ERROR_MARKERS.iter().any(|marker| text.contains(marker)) {
        Outcome::Error
    } else {
        Outcome::Success
    }
}

/// Result of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub label: String,
    pub outcome: Outcome,
    /// Combined stdout and stderr, or the runner error text
    pub output: String,
    /// `None` when the command never produced an exit status
    pub exit_code: Option<i32>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl RepositoryState {
    /// Start an operation, refreshing the repository when it completes
    pub async fn spawn_operation(&self, op: Operation) -> JoinHandle<OperationOutcome> {
        self.spawn_operation_then(op, |repo| async move {
            if let Err(e) = repo.refresh().await {
                warn!(repo = %repo.id(), error = %e, "refresh after operation failed");
            }
        })
        .await
    }

    /// Start an operation with a custom completion step
    ///
    /// Waits for any operation already running on this repository. Once
    /// this returns the busy flag is set; it is cleared after
    /// `continuation` has run.
    #[instrument(skip(self, op, continuation), fields(repo = %self.id(), op = op.label()))]
    pub async fn spawn_operation_then<F, Fut>(
        &self,
        op: Operation,
        continuation: F,
    ) -> JoinHandle<OperationOutcome>
    where
        F: FnOnce(RepositoryState) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.operation_lock.clone().lock_owned().await;
        let label = op.label();

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.operation_in_progress = true;
            snapshot.operation_label = label.to_string();
        }
        self.ctx
            .log
            .info(format!("Starting operation: {}...", label));
        self.ctx.events.emit(EngineEvent::OperationStarted {
            id: self.id(),
            label: label.to_string(),
        });

        let repo = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let command = GitCommand::in_repo(repo.path(), op.args()).merged();

            let (output, exit_code, outcome) = match repo.ctx.runner.run(&command).await {
                Ok(out) => {
                    let outcome = classify_output(&out.text);
                    (out.text, Some(out.exit_code), outcome)
                }
                Err(e) => (e.to_string(), None, Outcome::Error),
            };
            debug!(%command, ?exit_code, %outcome, "operation finished");

            match outcome {
                Outcome::Error => repo.ctx.log.error(format!("Operation failed: {}", label)),
                _ => repo
                    .ctx
                    .log
                    .success(format!("Operation completed: {}", label)),
            };

            // A panicking continuation must not leave the flag set
            let follow_up = repo.clone();
            if let Err(e) = tokio::spawn(async move { continuation(follow_up).await }).await {
                warn!(repo = %repo.id(), error = %e, "operation continuation failed");
                repo.ctx
                    .log
                    .error(format!("Failed to finish operation: {}", label));
            }

            repo.clear_busy().await;
            repo.ctx.events.emit(EngineEvent::OperationFinished {
                id: repo.id(),
                label: label.to_string(),
                outcome,
            });

            OperationOutcome {
                label: label.to_string(),
                outcome,
                output,
                exit_code,
            }
        })
    }

    async fn clear_busy(&self) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.operation_in_progress = false;
        snapshot.operation_label.clear();
    }

    /// Run an operation to completion, including the refresh
    pub async fn execute(&self, op: Operation) -> OperationOutcome {
        let label = op.label();
        match self.spawn_operation(op).await.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Only reachable if the runner itself panicked
                self.clear_busy().await;
                self.ctx.log.error(format!("Operation failed: {}", label));
                OperationOutcome {
                    label: label.to_string(),
                    outcome: Outcome::Error,
                    output: e.to_string(),
                    exit_code: None,
                }
            }
        }
    }
}
