//! Per-file diff
//!
//! Unified diff text of one working tree file (`git diff -- <path>`),
//! with line statistics for display.

use serde::Serialize;

/// Diff of a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    /// Path relative to the repository root
    pub path: String,
    /// The raw diff output
    pub text: String,
    /// Lines added
    pub lines_added: usize,
    /// Lines removed
    pub lines_removed: usize,
}

impl FileDiff {
    /// Build from `git diff -- <path>` output
    pub fn from_output(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let (lines_added, lines_removed) = count_changed_lines(&text);

        Self {
            path: path.into(),
            text,
            lines_added,
            lines_removed,
        }
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Lines of the diff, for line-by-line rendering
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            "No changes".to_string()
        } else {
            format!("+{} -{} lines", self.lines_added, self.lines_removed)
        }
    }
}

/// Count `+`/`-` body lines, ignoring the `+++`/`---` file headers
fn count_changed_lines(diff: &str) -> (usize, usize) {
    diff.lines().fold((0, 0), |(added, removed), line| {
        if line.starts_with("+++") || line.starts_with("---") {
            (added, removed)
        } else if line.starts_with('+') {
            (added + 1, removed)
        } else if line.starts_with('-') {
            (added, removed + 1)
        } else {
            (added, removed)
        }
    })
}
