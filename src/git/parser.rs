//! Parsers for git's text output
//!
//! Every function here is pure and total: malformed lines are skipped or
//! degrade to empty fields, never to an error. Each parser expects the
//! output of one fixed invocation, listed in its doc comment.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::repository::{Branch, Commit, FileChange, FileStatus, Remote, RemoteKind, Stash};

/// Marker segment of remote-tracking branches in `git branch --all`
const REMOTE_SEGMENT: &str = "remotes/";

/// Field delimiter of the commit log format
pub const LOG_DELIMITER: char = '|';

/// Pretty format matching [`parse_commit_log`]
pub const LOG_FORMAT: &str = "--pretty=format:%H|%s|%an|%ad";

static STASH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^stash@\{\d+\}: ").unwrap());

/// Parse `git branch --list --all`
///
/// A leading `*` marks the checked-out branch. Remote-tracking entries
/// (`remotes/origin/main`) are shown as `origin/main` and are never current.
pub fn parse_branch_list(output: &str) -> Vec<Branch> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let is_marked = line.starts_with('*');
            let name = line.trim_start_matches('*').trim();

            match name.rfind(REMOTE_SEGMENT) {
                Some(pos) => Branch::remote(&name[pos + REMOTE_SEGMENT.len()..]),
                None => Branch::local(name, is_marked),
            }
        })
        .collect()
}

/// Parse `git symbolic-ref --short -q HEAD`
///
/// Returns an empty string for detached or unknown HEAD (no output).
pub fn parse_current_branch(output: &str) -> String {
    output.lines().next().unwrap_or_default().trim().to_string()
}

/// Parse `git remote -v`
///
/// Lines look like `origin\thttps://host/repo.git (fetch)`. Each remote
/// appears once; the fetch URL wins over the push URL, otherwise the last
/// line seen for a name wins. Result is sorted by name.
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: BTreeMap<String, Remote> = BTreeMap::new();

    for line in output.lines() {
        let Some((name, rest)) = line.split_once('\t') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let mut parts = rest.split(' ');
        let url = parts.next().unwrap_or_default().to_string();
        let kind = parts
            .next()
            .map(|marker| RemoteKind::parse(marker.trim_matches(|c| c == '(' || c == ')')))
            .unwrap_or_default();

        let keep_existing = remotes
            .get(name)
            .is_some_and(|existing| existing.kind == RemoteKind::Fetch && kind != RemoteKind::Fetch);
        if !keep_existing {
            remotes.insert(
                name.to_string(),
                Remote {
                    name: name.to_string(),
                    url,
                    kind,
                },
            );
        }
    }

    remotes.into_values().collect()
}

/// Classify a two-character porcelain status code
///
/// Uses substring containment in a fixed priority order:
/// untracked, added-then-deleted, added, deleted, renamed, modified.
/// Anything else reads as modified.
pub fn classify_status_code(code: &str) -> FileStatus {
    if code.contains("??") {
        FileStatus::Untracked
    } else if code.contains("AD") {
        FileStatus::Deleted
    } else if code.contains('A') {
        FileStatus::Added
    } else if code.contains('D') {
        FileStatus::Deleted
    } else if code.contains('R') {
        FileStatus::Renamed
    } else {
        // Covers `M` and every unrecognized code
        FileStatus::Modified
    }
}

/// Whether the index column of a porcelain code records a change
pub fn is_staged(code: &str) -> bool {
    !matches!(code.chars().next(), Some(' ' | '?') | None)
}

/// Parse `git status --porcelain`
///
/// `XY PATH`: the first two characters are the status code, the path
/// starts after the separating space.
pub fn parse_status(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let split = line.char_indices().nth(2).map_or(line.len(), |(i, _)| i);
            let (code, rest) = line.split_at(split);
            let path = rest.strip_prefix(' ').unwrap_or(rest);

            FileChange {
                path: path.to_string(),
                status: classify_status_code(code),
                staged: is_staged(code),
            }
        })
        .collect()
}

/// Parse `git stash list`
///
/// `stash@{N}: ` is stripped; the index is the line's position.
pub fn parse_stash_list(output: &str) -> Vec<Stash> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Stash {
            index,
            description: STASH_PREFIX.replace(line, "").into_owned(),
        })
        .collect()
}

/// Parse `git log --pretty=format:%H|%s|%an|%ad --date=short`
///
/// At most three delimiters split a line: the hash is taken from the left,
/// date and author from the right, so a subject containing `|` survives
/// intact. Missing trailing fields are empty.
pub fn parse_commit_log(output: &str) -> Vec<Commit> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (hash, rest) = line.split_once(LOG_DELIMITER).unwrap_or((line, ""));

            let fields: Vec<&str> = rest.rsplitn(3, LOG_DELIMITER).collect();
            let (message, author, date) = match fields[..] {
                [date, author, message] => (message, author, date),
                [author, message] => (message, author, ""),
                [message] => (message, "", ""),
                _ => ("", "", ""),
            };

            Commit {
                hash: hash.to_string(),
                message: message.to_string(),
                author: author.to_string(),
                date: date.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_branch_list() {
        let output = "* main\n  feature-x\n  remotes/origin/HEAD -> origin/main\n  remotes/origin/main\n";
        let branches = parse_branch_list(output);

        assert_eq!(
            branches,
            vec![
                Branch::local("main", true),
                Branch::local("feature-x", false),
                Branch::remote("origin/HEAD -> origin/main"),
                Branch::remote("origin/main"),
            ]
        );
    }

    #[test]
    fn test_remote_branches_never_current() {
        let branches = parse_branch_list("* remotes/origin/main\n");
        assert_eq!(branches.len(), 1);
        assert!(branches[0].is_remote);
        assert!(!branches[0].is_current);
    }

    #[test]
    fn test_parse_current_branch() {
        assert_eq!(parse_current_branch("main\n"), "main");
        assert_eq!(parse_current_branch("  feature/x  \n"), "feature/x");
        assert_eq!(parse_current_branch(""), "");
    }

    #[test]
    fn test_parse_remotes_prefers_fetch() {
        let fetch_first = "origin\thttps://x/y (fetch)\norigin\thttps://x/y-push (push)\n";
        let push_first = "origin\thttps://x/y-push (push)\norigin\thttps://x/y (fetch)\n";

        for output in [fetch_first, push_first] {
            let remotes = parse_remotes(output);
            assert_eq!(remotes.len(), 1);
            assert_eq!(remotes[0].name, "origin");
            assert_eq!(remotes[0].kind, RemoteKind::Fetch);
            assert_eq!(remotes[0].url, "https://x/y");
        }
    }

    #[test]
    fn test_parse_remotes_last_seen_without_fetch() {
        let output = "mirror\thttps://a (push)\nmirror\thttps://b (push)\n";
        let remotes = parse_remotes(output);
        assert_eq!(remotes.len(), 1);
        assert_eq!(remotes[0].url, "https://b");
    }

    #[test]
    fn test_parse_remotes_sorted_and_tolerant() {
        let output = "upstream\thttps://u (fetch)\ngarbage line\norigin\thttps://o\n";
        let remotes = parse_remotes(output);

        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "origin");
        assert_eq!(remotes[0].kind, RemoteKind::Unknown);
        assert_eq!(remotes[1].name, "upstream");
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify_status_code("??"), FileStatus::Untracked);
        assert_eq!(classify_status_code("AD"), FileStatus::Deleted);
        assert_eq!(classify_status_code("AM"), FileStatus::Added);
        assert_eq!(classify_status_code(" D"), FileStatus::Deleted);
        assert_eq!(classify_status_code("RM"), FileStatus::Renamed);
        assert_eq!(classify_status_code(" M"), FileStatus::Modified);
        assert_eq!(classify_status_code("UU"), FileStatus::Modified);
    }

    #[test]
    fn test_staged_determination() {
        assert!(!is_staged(" M"));
        assert!(is_staged("M "));
        assert!(!is_staged("??"));
        assert!(is_staged("MM"));
    }

    #[test]
    fn test_parse_status() {
        let output = " M src/main.rs\nM  README.md\n?? notes.txt\nR  old.rs -> new.rs\n";
        let changes = parse_status(output);

        assert_eq!(
            changes,
            vec![
                FileChange {
                    path: "src/main.rs".to_string(),
                    status: FileStatus::Modified,
                    staged: false,
                },
                FileChange {
                    path: "README.md".to_string(),
                    status: FileStatus::Modified,
                    staged: true,
                },
                FileChange {
                    path: "notes.txt".to_string(),
                    status: FileStatus::Untracked,
                    staged: false,
                },
                FileChange {
                    path: "old.rs -> new.rs".to_string(),
                    status: FileStatus::Renamed,
                    staged: true,
                },
            ]
        );
    }

    #[test]
    fn test_parse_status_short_line() {
        let changes = parse_status("M");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "");
    }

    #[test]
    fn test_parse_stash_list() {
        let output = "stash@{0}: WIP on main: abc\nstash@{1}: On feature: experiment\n";
        let stashes = parse_stash_list(output);

        assert_eq!(
            stashes,
            vec![
                Stash {
                    index: 0,
                    description: "WIP on main: abc".to_string(),
                },
                Stash {
                    index: 1,
                    description: "On feature: experiment".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_commit_log() {
        let commits = parse_commit_log("abc123|Fix bug|Jane|2025-01-01");
        assert_eq!(
            commits,
            vec![Commit {
                hash: "abc123".to_string(),
                message: "Fix bug".to_string(),
                author: "Jane".to_string(),
                date: "2025-01-01".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_commit_log_subject_with_delimiter() {
        let commits = parse_commit_log("abc123|Fix a|b parsing|Jane|2025-01-01\ndef456|Init|Joe|2024-12-31\n");

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "Fix a|b parsing");
        assert_eq!(commits[0].author, "Jane");
        assert_eq!(commits[0].date, "2025-01-01");
        assert_eq!(commits[1].hash, "def456");
    }

    #[test]
    fn test_parse_commit_log_missing_fields() {
        let commits = parse_commit_log("abc123|Only subject\ndeadbeef");
        assert_eq!(commits[0].message, "Only subject");
        assert_eq!(commits[0].author, "");
        assert_eq!(commits[1].hash, "deadbeef");
        assert_eq!(commits[1].message, "");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_branch_list("").is_empty());
        assert!(parse_remotes("").is_empty());
        assert!(parse_status("").is_empty());
        assert!(parse_stash_list("").is_empty());
        assert!(parse_commit_log("").is_empty());
    }

    fn porcelain_line() -> impl Strategy<Value = String> {
        let code = prop::sample::select(vec![
            " M", "M ", "MM", "A ", "AM", "AD", " D", "D ", "R ", "RM", "??", "UU",
        ]);
        (code, "[a-z][a-z0-9_/.]{0,20}").prop_map(|(code, path)| format!("{} {}", code, path))
    }

    proptest! {
        #[test]
        fn prop_status_parsing_is_idempotent(lines in prop::collection::vec(porcelain_line(), 0..20)) {
            let output = lines.join("\n");
            prop_assert_eq!(parse_status(&output), parse_status(&output));
        }

        #[test]
        fn prop_status_preserves_paths(lines in prop::collection::vec(porcelain_line(), 0..20)) {
            let output = lines.join("\n");
            let changes = parse_status(&output);
            prop_assert_eq!(changes.len(), lines.len());
            for (change, line) in changes.iter().zip(&lines) {
                prop_assert_eq!(&change.path, &line[3..]);
            }
        }

        #[test]
        fn prop_fetch_always_wins(url in "https://[a-z]{1,10}/[a-z]{1,10}", push_first in any::<bool>()) {
            let fetch = format!("origin\t{} (fetch)", url);
            let push = format!("origin\t{}-push (push)", url);
            let output = if push_first {
                format!("{}\n{}\n", push, fetch)
            } else {
                format!("{}\n{}\n", fetch, push)
            };

            let remotes = parse_remotes(&output);
            prop_assert_eq!(remotes.len(), 1);
            prop_assert_eq!(remotes[0].kind, RemoteKind::Fetch);
            prop_assert_eq!(&remotes[0].url, &url);
        }
    }
}
