//! Async git command runner with semaphore-controlled concurrency
//!
//! Provides non-blocking git execution with:
//! - Directory scoping (`-C <path>` always comes first)
//! - Semaphore to limit concurrent subprocesses
//! - Timeout handling (the child is killed when the deadline passes)
//!
//! A non-zero exit is reported through [`CommandOutput::exit_code`], never
//! as an error. Git's own output is the only failure signal it gives us.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::{GitError, Result};

/// Default maximum concurrent git subprocesses
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A git invocation: optional directory scope plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    scope: Option<PathBuf>,
    args: Vec<String>,
    merge_stderr: bool,
}

impl GitCommand {
    /// A command scoped to a working directory
    pub fn in_repo<I, S>(path: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: Some(path.as_ref().to_path_buf()),
            args: args.into_iter().map(Into::into).collect(),
            merge_stderr: false,
        }
    }

    /// An unscoped command (only `clone` needs this)
    pub fn global<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: None,
            args: args.into_iter().map(Into::into).collect(),
            merge_stderr: false,
        }
    }

    /// Append stderr to the captured text (mutating commands)
    pub fn merged(mut self) -> Self {
        self.merge_stderr = true;
        self
    }

    pub fn scope(&self) -> Option<&Path> {
        self.scope.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn merges_stderr(&self) -> bool {
        self.merge_stderr
    }

    /// Full argument vector as passed to the binary
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        if let Some(scope) = &self.scope {
            argv.push("-C".to_string());
            argv.push(scope.display().to_string());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git {}", self.argv().join(" "))
    }
}

/// Captured text and exit status of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout, followed by stderr for merged commands
    pub text: String,
    /// `-1` when the process was terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs git invocations
///
/// The engine only talks to git through this trait, so tests can script
/// the output of each command.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput>;
}

/// Runner backed by the real git binary
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// `None` disables the deadline
    timeout: Option<Duration>,
}

impl GitCli {
    /// Create a runner with default settings
    pub fn new() -> Self {
        Self::with_max_concurrent(DEFAULT_MAX_CONCURRENT)
    }

    /// Create a runner with a custom concurrency limit
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            binary: PathBuf::from("git"),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Create a runner from the user configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_max_concurrent(config.max_concurrent_commands)
            .with_binary(config.git_binary.clone())
            .with_timeout(config.command_timeout())
    }

    /// Use a different git executable
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the command timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Check that git is installed, returning its version line
    pub async fn check_installed(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| GitError::NotInstalled)?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!("git version: {}", version);
            Ok(version)
        } else {
            Err(GitError::NotInstalled.into())
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    #[instrument(skip_all, fields(argv = ?command.argv()))]
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput> {
        // Acquire semaphore permit
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| GitError::SpawnFailed {
                command: command.to_string(),
                reason: "runner is shut down".to_string(),
            })?;

        let mut cmd = Command::new(&self.binary);
        if let Some(scope) = command.scope() {
            cmd.arg("-C").arg(scope);
        }
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("running {}", command);

        let result = match self.timeout {
            Some(limit) => timeout(limit, cmd.output()).await.map_err(|_| {
                warn!("{} timed out after {:?}", command, limit);
                GitError::Timeout(limit)
            })?,
            None => cmd.output().await,
        };

        let output = result.map_err(|e| {
            warn!("failed to spawn {}: {}", command, e);
            GitError::SpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            }
        })?;

        // Undecodable streams degrade to empty text
        let mut text = String::from_utf8(output.stdout).unwrap_or_default();
        if command.merges_stderr() {
            text.push_str(&String::from_utf8(output.stderr).unwrap_or_default());
        }

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, "{} finished", command);

        Ok(CommandOutput { text, exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scoped_argv_starts_with_directory_flag() {
        let command = GitCommand::in_repo("/work/repo", ["status", "--porcelain"]);
        assert_eq!(
            command.argv(),
            vec!["-C", "/work/repo", "status", "--porcelain"]
        );
        assert!(!command.merges_stderr());
    }

    #[test]
    fn test_global_argv_has_no_scope() {
        let command = GitCommand::global(["clone", "https://x/y", "/tmp/y"]).merged();
        assert!(command.scope().is_none());
        assert!(command.merges_stderr());
        insta::assert_snapshot!(command.to_string(), @"git clone https://x/y /tmp/y");
    }

    #[test]
    fn test_runner_settings() {
        let runner = GitCli::with_max_concurrent(2)
            .with_binary("/usr/bin/git")
            .with_timeout(Some(Duration::from_secs(10)));

        assert_eq!(runner.binary(), Path::new("/usr/bin/git"));
        assert_eq!(runner.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_runner_from_config() {
        let config = Config {
            command_timeout_secs: 0,
            ..Config::default()
        };
        let runner = GitCli::from_config(&config);
        assert_eq!(runner.timeout, None);
        assert_eq!(runner.binary(), Path::new("git"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let runner = GitCli::new();

        // Not a repository: git exits 128 and says so on stderr
        let command = GitCommand::in_repo(temp.path(), ["status", "--porcelain"]).merged();
        let output = runner.run(&command).await.unwrap();

        assert!(!output.success());
        assert!(output.text.contains("fatal:"));
    }

    #[tokio::test]
    async fn test_stderr_not_captured_unless_merged() {
        let temp = TempDir::new().unwrap();
        let runner = GitCli::new();

        let command = GitCommand::in_repo(temp.path(), ["status", "--porcelain"]);
        let output = runner.run(&command).await.unwrap();

        assert!(!output.success());
        assert!(output.text.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let runner = GitCli::new().with_binary("/nonexistent/gitflow-test-git");
        let result = runner.run(&GitCommand::global(["--version"])).await;

        assert!(matches!(
            result,
            Err(crate::error::Error::Git(GitError::SpawnFailed { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_slow_command() {
        // `sleep 5` stands in for a hung git process
        let runner = GitCli::new()
            .with_binary("sleep")
            .with_timeout(Some(Duration::from_millis(100)));
        let result = runner.run(&GitCommand::global(["5"])).await;

        assert!(matches!(
            result,
            Err(crate::error::Error::Git(GitError::Timeout(_)))
        ));
    }
}
