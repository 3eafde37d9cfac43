//! Parser for `git status --porcelain=v1 -z`
//!
//! Each record is `XY <path>` terminated by NUL. When either column is a
//! rename or copy, the record's path is the source and the next NUL-terminated
//! chunk holds the destination.

use super::error::{Result, VcsError};
use super::runner::CommandRunner;
use super::{ChangeRecord, StatusCode};
use tracing::{debug, warn};

const UNTRACKED_MARKER: char = '?';

/// Run `git status` and parse the result
pub fn status(runner: &dyn CommandRunner) -> Result<Vec<ChangeRecord>> {
    let args: Vec<String> = ["status", "--porcelain=v1", "-z"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let output = runner.run("git", &args)?;
    if !output.success() {
        return Err(VcsError::command_failed(
            "git status",
            &output.stderr,
            "git status failed".to_string(),
        ));
    }

    if output.truncated {
        warn!("git status output hit the output cap, dropping the partial last record");
    }

    Ok(parse_status(output.complete_stdout('\0')))
}

/// Decode a NUL-delimited porcelain v1 stream.
///
/// Malformed records are dropped; the rest of the stream is still parsed.
pub fn parse_status(stream: &str) -> Vec<ChangeRecord> {
    let chunks: Vec<&str> = stream.split('\0').collect();
    let mut records = Vec::new();

    let mut i = 0;
    while i < chunks.len() {
        let record = chunks[i];
        i += 1;

        if record.is_empty() {
            continue;
        }

        let mut columns = record.chars();
        let (Some(x), Some(y), Some(' ')) = (columns.next(), columns.next(), columns.next())
        else {
            debug!(record, "skipping malformed status record");
            continue;
        };

        // X and Y are ASCII here, so the path starts at byte 3
        let first_path = &record[x.len_utf8() + y.len_utf8() + 1..];
        let index_code = StatusCode::from_letter(x);
        let worktree_code = StatusCode::from_letter(y);

        // One destination chunk serves both columns
        let mut second_path = None;
        if (index_code.is_rename_or_copy() || worktree_code.is_rename_or_copy())
            && let Some(next) = chunks.get(i).filter(|c| !c.is_empty())
        {
            second_path = Some(*next);
            i += 1;
        }

        let untracked = x == UNTRACKED_MARKER && y == UNTRACKED_MARKER;

        if x != ' ' && !untracked {
            records.push(side_record(index_code, true, first_path, second_path));
        }

        if y != ' ' {
            let code = if untracked {
                StatusCode::Untracked
            } else {
                worktree_code
            };
            records.push(side_record(code, false, first_path, second_path));
        }
    }

    records
}

fn side_record(
    status: StatusCode,
    staged: bool,
    first_path: &str,
    second_path: Option<&str>,
) -> ChangeRecord {
    if status.is_rename_or_copy() {
        ChangeRecord {
            path: second_path.unwrap_or(first_path).to_string(),
            old_path: Some(first_path.to_string()),
            staged,
            status,
        }
    } else {
        ChangeRecord {
            path: first_path.to_string(),
            old_path: None,
            staged,
            status,
        }
    }
}
