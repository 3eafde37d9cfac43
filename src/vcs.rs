//! Version-control plumbing: command execution and output parsing
//!
//! This module owns everything that touches raw git (and `gh`) output.
//! Commands run through the [`CommandRunner`] seam so the parsers can be fed
//! canned output in tests, while [`SystemRunner`] spawns real processes in a
//! repository discovered with gix.

pub mod diff;
mod error;
pub mod github;
mod runner;
pub mod status;

pub use diff::{
    changed_files_args, file_diff, hunk_args, list_changed_files, list_hunks, parse_unified_hunks,
};
pub use error::{Result as VcsResult, VcsError};
pub use github::{PullRequest, RepositoryOwner, list_open_prs, pr_list_args};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use status::{parse_status, status};

use serde::{Deserialize, Serialize};

/// Status letter from one column of `git status --porcelain=v1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    /// Both columns `?`
    Untracked,
    Other(char),
}

impl StatusCode {
    /// Map a single porcelain column letter to a status code
    pub fn from_letter(letter: char) -> Self {
        match letter {
            'M' => StatusCode::Modified,
            'A' => StatusCode::Added,
            'D' => StatusCode::Deleted,
            'R' => StatusCode::Renamed,
            'C' => StatusCode::Copied,
            'T' => StatusCode::TypeChanged,
            'U' => StatusCode::Unmerged,
            other => StatusCode::Other(other),
        }
    }

    /// Renames and copies carry a second path
    pub fn is_rename_or_copy(self) -> bool {
        matches!(self, StatusCode::Renamed | StatusCode::Copied)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StatusCode::Modified => write!(f, "M"),
            StatusCode::Added => write!(f, "A"),
            StatusCode::Deleted => write!(f, "D"),
            StatusCode::Renamed => write!(f, "R"),
            StatusCode::Copied => write!(f, "C"),
            StatusCode::TypeChanged => write!(f, "T"),
            StatusCode::Unmerged => write!(f, "U"),
            StatusCode::Untracked => write!(f, "??"),
            StatusCode::Other(c) => write!(f, "{}", c),
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('?'), Some('?'), None) => Ok(StatusCode::Untracked),
            (Some(letter), None, None) => Ok(StatusCode::from_letter(letter)),
            _ => Err(serde::de::Error::custom(format!(
                "invalid status code '{}'",
                s
            ))),
        }
    }
}

/// One side (index or worktree) of a status entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Current path (the new path for renames and copies)
    pub path: String,

    /// Source path, present only for renames and copies
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub old_path: Option<String>,

    /// True for the index side, false for the worktree side
    pub staged: bool,

    pub status: StatusCode,
}

/// Inclusive, 1-based line range on the base side of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// Number of lines shared by two ranges (0 when disjoint)
    pub fn overlap(&self, other: &LineRange) -> u64 {
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        if hi < lo {
            0
        } else {
            u64::from(hi - lo) + 1
        }
    }
}
