//! Diff requests against a base ref and the hunk header parser

use super::LineRange;
use super::error::{Result, VcsError};
use super::runner::CommandRunner;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// `@@ -A[,B] +C[,D] @@`; B and D default to 1 when omitted
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^@@\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@")
        .expect("hunk header pattern is valid")
});

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Arguments for a rename-aware, name-only diff of `reference` against `base`
pub fn changed_files_args(base: &str, reference: &str) -> Vec<String> {
    let range = format!("{}..{}", base, reference);
    owned(&[
        "diff",
        "--name-only",
        "--find-renames",
        "--diff-filter=ACMRD",
        &range,
    ])
}

/// Arguments for a zero-context diff of one file
pub fn hunk_args(base: &str, reference: &str, file: &str) -> Vec<String> {
    let range = format!("{}..{}", base, reference);
    owned(&[
        "diff",
        "--unified=0",
        "--no-color",
        "--no-ext-diff",
        &range,
        "--",
        file,
    ])
}

/// List paths changed on `reference` relative to `base`.
///
/// Renames are detected and deletions included. The list is de-duplicated in
/// first-seen order. A non-zero exit is an error.
pub fn list_changed_files(
    runner: &dyn CommandRunner,
    base: &str,
    reference: &str,
) -> Result<Vec<String>> {
    let output = runner.run("git", &changed_files_args(base, reference))?;
    if !output.success() {
        return Err(VcsError::command_failed(
            &format!("git diff {}..{}", base, reference),
            &output.stderr,
            format!("git diff failed for {}", reference),
        ));
    }

    if output.truncated {
        warn!(reference, "changed file list hit the output cap, dropping the partial last line");
    }

    let mut seen = HashSet::new();
    let files: Vec<String> = output
        .complete_stdout('\n')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect();

    debug!(reference, count = files.len(), "listed changed files");
    Ok(files)
}

/// Base-side hunk ranges for one file on `reference` relative to `base`.
///
/// Any failure degrades to an empty list.
pub fn list_hunks(
    runner: &dyn CommandRunner,
    base: &str,
    reference: &str,
    file: &str,
) -> Vec<LineRange> {
    match runner.run("git", &hunk_args(base, reference, file)) {
        Ok(output) if output.success() => parse_unified_hunks(output.complete_stdout('\n')),
        Ok(output) => {
            warn!(reference, file, stderr = %output.stderr.trim(), "git diff failed, treating as no hunks");
            Vec::new()
        }
        Err(e) => {
            warn!(reference, file, error = %e, "could not run git diff, treating as no hunks");
            Vec::new()
        }
    }
}

/// Extract base-side line ranges from zero-context diff text, in header order.
///
/// Pure insertions (zero base lines) produce no range.
pub fn parse_unified_hunks(diff_text: &str) -> Vec<LineRange> {
    HUNK_HEADER
        .captures_iter(diff_text)
        .filter_map(|caps| {
            let start: u32 = caps[1].parse().ok()?;
            let len: u32 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 1,
            };
            if len == 0 || start == 0 {
                return None;
            }
            Some(LineRange {
                start,
                end: start.checked_add(len - 1)?,
            })
        })
        .collect()
}

/// Patch text for one worktree file, staged or unstaged.
///
/// A failing diff still returns whatever it printed (untracked files
/// commonly produce nothing at all).
pub fn file_diff(runner: &dyn CommandRunner, path: &str, staged: bool) -> Result<String> {
    let mut args = owned(&["diff", "--no-color", "--no-ext-diff", "--unified=3"]);
    if staged {
        args.push("--staged".to_string());
    }
    args.push("--".to_string());
    args.push(path.to_string());

    let output = runner.run("git", &args)?;
    if !output.success() && output.stdout.is_empty() {
        return Ok(output.stderr);
    }
    Ok(output.stdout)
}
