//! Core repository model types
//!
//! Typed records produced by the output parsers and the snapshot that
//! groups them for one working directory.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an opened repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId(Uuid);

impl RepositoryId {
    /// Create a new random repository ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use first 8 chars for display
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A local or remote-tracking branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Display name (`origin/main` for remote-tracking branches)
    pub name: String,
    pub is_remote: bool,
    /// Only ever true for a local branch
    pub is_current: bool,
}

impl Branch {
    pub fn local(name: impl Into<String>, is_current: bool) -> Self {
        Self {
            name: name.into(),
            is_remote: false,
            is_current,
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_remote: true,
            is_current: false,
        }
    }
}

/// Direction of a remote URL entry as printed by `git remote -v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    Fetch,
    Push,
    /// No (or an unrecognized) direction marker
    #[default]
    Unknown,
}

impl RemoteKind {
    /// Parse the bare marker (`fetch`, `push`)
    pub fn parse(marker: &str) -> Self {
        match marker {
            "fetch" => Self::Fetch,
            "push" => Self::Push,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Push => "push",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured remote, unique by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
    pub kind: RemoteKind,
}

/// Working tree status of a changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified => write!(f, "modified"),
            Self::Added => write!(f, "added"),
            Self::Deleted => write!(f, "deleted"),
            Self::Renamed => write!(f, "renamed"),
            Self::Untracked => write!(f, "untracked"),
        }
    }
}

/// One entry of `git status --porcelain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root, as printed by git
    pub path: String,
    pub status: FileStatus,
    pub staged: bool,
}

impl FileChange {
    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.path)
    }

    /// Location on disk, for handing to an external diff viewer
    pub fn absolute_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.path)
    }
}

/// A stash entry; `index` is the ordinal in `stash@{index}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub index: usize,
    pub description: String,
}

impl Stash {
    /// The reference git uses for this entry
    pub fn reference(&self) -> String {
        format!("stash@{{{}}}", self.index)
    }
}

/// One history entry, newest first in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

impl Commit {
    /// Abbreviated hash for display
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Outcome classification of a status log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Info,
    Success,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An entry in the operational status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == Outcome::Error
    }
}

/// Read-only view of one repository's state
///
/// `id`, `path` and `display_name` never change for the lifetime of the
/// repository; every other field is replaced by refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub id: RepositoryId,
    pub path: PathBuf,
    pub display_name: String,
    /// Empty when HEAD is detached or unknown
    pub current_branch: String,
    pub branches: Vec<Branch>,
    /// Sorted by name
    pub remotes: Vec<Remote>,
    pub changes: Vec<FileChange>,
    pub stashes: Vec<Stash>,
    pub commits: Vec<Commit>,
    pub operation_in_progress: bool,
    /// Empty unless an operation is in progress
    pub operation_label: String,
}

impl RepositorySnapshot {
    /// Create an empty snapshot for a working directory
    pub fn new(id: RepositoryId, path: PathBuf) -> Self {
        let display_name = display_name_for(&path);
        Self {
            id,
            path,
            display_name,
            current_branch: String::new(),
            branches: Vec::new(),
            remotes: Vec::new(),
            changes: Vec::new(),
            stashes: Vec::new(),
            commits: Vec::new(),
            operation_in_progress: false,
            operation_label: String::new(),
        }
    }

    pub fn staged_changes(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| c.staged)
    }

    pub fn unstaged_changes(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| !c.staged)
    }

    pub fn local_branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter().filter(|b| !b.is_remote)
    }

    pub fn remote_branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter().filter(|b| b.is_remote)
    }

    /// Check if the working tree has no changes
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Last path segment, or the whole path when it has none
pub fn display_name_for(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_id_display() {
        let id = RepositoryId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_file_name_is_last_segment() {
        let change = FileChange {
            path: "src/git/parser.rs".to_string(),
            status: FileStatus::Modified,
            staged: false,
        };
        assert_eq!(change.file_name(), "parser.rs");

        let dir = FileChange {
            path: "vendor/".to_string(),
            status: FileStatus::Untracked,
            staged: false,
        };
        assert_eq!(dir.file_name(), "vendor");
    }

    #[test]
    fn test_absolute_path_joins_root() {
        let change = FileChange {
            path: "docs/readme.md".to_string(),
            status: FileStatus::Added,
            staged: true,
        };
        assert_eq!(
            change.absolute_path(Path::new("/work/repo")),
            PathBuf::from("/work/repo/docs/readme.md")
        );
    }

    #[test]
    fn test_snapshot_display_name() {
        let snapshot = RepositorySnapshot::new(RepositoryId::new(), PathBuf::from("/work/my-repo"));
        assert_eq!(snapshot.display_name, "my-repo");
        assert!(snapshot.is_clean());
        assert!(!snapshot.operation_in_progress);
    }

    #[test]
    fn test_snapshot_splits_staged_and_unstaged() {
        let mut snapshot = RepositorySnapshot::new(RepositoryId::new(), PathBuf::from("/work/repo"));
        snapshot.changes = vec![
            FileChange {
                path: "src/lib.rs".to_string(),
                status: FileStatus::Modified,
                staged: true,
            },
            FileChange {
                path: "notes.txt".to_string(),
                status: FileStatus::Untracked,
                staged: false,
            },
            FileChange {
                path: "README.md".to_string(),
                status: FileStatus::Modified,
                staged: false,
            },
        ];

        let staged: Vec<&str> = snapshot.staged_changes().map(|c| c.path.as_str()).collect();
        let unstaged: Vec<&str> = snapshot
            .unstaged_changes()
            .map(|c| c.path.as_str())
            .collect();

        assert_eq!(staged, vec!["src/lib.rs"]);
        assert_eq!(unstaged, vec!["notes.txt", "README.md"]);
        assert!(!snapshot.is_clean());
    }

    #[test]
    fn test_stash_reference() {
        let stash = Stash {
            index: 2,
            description: "WIP".to_string(),
        };
        assert_eq!(stash.reference(), "stash@{2}");
    }

    #[test]
    fn test_remote_kind_round_trip() {
        assert_eq!(RemoteKind::parse("fetch"), RemoteKind::Fetch);
        assert_eq!(RemoteKind::parse("push"), RemoteKind::Push);
        assert_eq!(RemoteKind::parse(""), RemoteKind::Unknown);
        assert_eq!(RemoteKind::Unknown.as_str(), "");
    }
}
