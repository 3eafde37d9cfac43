//! Bounded fan-out over the VCS runner and the full analysis pipeline

use super::hunks::{HunkOverlap, score_hunk_overlap};
use super::overlap::{OverlapMatrix, build_overlap_matrix};
use super::{RefFileSet, RefHunkMap};
use crate::vcs::{CommandRunner, VcsError, VcsResult, list_changed_files, list_hunks};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Default base ref when none is given
pub const DEFAULT_BASE: &str = "origin/main";

/// At most this many file listings run at once
pub const DEFAULT_FILE_WORKERS: usize = 3;

/// At most this many per-file hunk listings run at once
pub const DEFAULT_HUNK_WORKERS: usize = 6;

/// Knobs for one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    pub base: String,
    pub file_workers: usize,
    pub hunk_workers: usize,
    /// Also diff every changed file for line-level overlap (slower)
    pub include_hunks: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE.to_string(),
            file_workers: DEFAULT_FILE_WORKERS,
            hunk_workers: DEFAULT_HUNK_WORKERS,
            include_hunks: false,
        }
    }
}

/// Everything one analysis run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub base: String,
    pub refs: Vec<String>,
    pub files_by_ref: RefFileSet,
    pub files: OverlapMatrix,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub hunks: Option<HunkOverlap>,
}

/// Run the whole pipeline for `refs` against `options.base`.
///
/// Only an unreachable runner is fatal; a ref whose listing fails shows up
/// with no files.
pub fn analyze(
    runner: &dyn CommandRunner,
    refs: &[String],
    options: &AnalyzeOptions,
) -> VcsResult<Analysis> {
    probe(runner)?;

    info!(base = %options.base, refs = refs.len(), "analyzing refs");
    let files_by_ref = collect_files(runner, &options.base, refs, options.file_workers);
    let files = build_overlap_matrix(refs, &files_by_ref);

    let hunks = options.include_hunks.then(|| {
        let hunk_map = collect_hunks(
            runner,
            &options.base,
            refs,
            &files_by_ref,
            options.hunk_workers,
        );
        score_hunk_overlap(refs, &files_by_ref, &hunk_map)
    });

    Ok(Analysis {
        base: options.base.clone(),
        refs: refs.to_vec(),
        files_by_ref,
        files,
        hunks,
    })
}

/// Check that the runner can execute git at all
pub fn probe(runner: &dyn CommandRunner) -> VcsResult<()> {
    let output = runner.run("git", &["--version".to_string()])?;
    if !output.success() {
        return Err(VcsError::command_failed(
            "git --version",
            &output.stderr,
            "git is not usable".to_string(),
        ));
    }
    Ok(())
}

/// Changed files per ref, listed by at most `min(limit, refs)` workers.
///
/// A failing ref maps to an empty list and is logged.
pub fn collect_files(
    runner: &dyn CommandRunner,
    base: &str,
    refs: &[String],
    limit: usize,
) -> RefFileSet {
    let workers = limit.max(1).min(refs.len());
    debug!(workers, refs = refs.len(), "listing changed files");

    run_pool(refs.to_vec(), workers, |reference| {
        list_changed_files(runner, base, reference).unwrap_or_else(|e| {
            warn!(reference = %reference, error = %e, "diff failed, treating ref as unchanged");
            Vec::new()
        })
    })
    .into_iter()
    .collect()
}

/// Hunk ranges for every (ref, file) pair, listed by at most
/// `max(1, min(limit, 2 * refs))` workers.
pub fn collect_hunks(
    runner: &dyn CommandRunner,
    base: &str,
    refs: &[String],
    files_by_ref: &RefFileSet,
    limit: usize,
) -> RefHunkMap {
    let tasks: Vec<(String, String)> = refs
        .iter()
        .flat_map(|reference| {
            files_by_ref
                .get(reference)
                .into_iter()
                .flatten()
                .map(move |file| (reference.clone(), file.clone()))
        })
        .collect();

    let workers = limit.min(2 * refs.len()).max(1);
    debug!(workers, tasks = tasks.len(), "listing hunks");

    let mut hunks = RefHunkMap::new();
    for ((reference, file), ranges) in run_pool(tasks, workers, |(reference, file)| {
        list_hunks(runner, base, reference, file)
    }) {
        hunks
            .entry(reference)
            .or_insert_with(BTreeMap::new)
            .insert(file, ranges);
    }
    hunks
}

/// Run `work` over `tasks` on `workers` threads sharing one queue.
///
/// Results come back paired with their task, in task order, whatever order
/// the workers finished in.
fn run_pool<T, R, F>(tasks: Vec<T>, workers: usize, work: F) -> Vec<(T, R)>
where
    T: Send,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let queue = Mutex::new(tasks.into_iter().enumerate().collect::<VecDeque<_>>());
    let done = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                    let Some((index, task)) = next else {
                        break;
                    };
                    let result = work(&task);
                    done.lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push((index, task, result));
                }
            });
        }
    });

    let mut done = done.into_inner().unwrap_or_else(|e| e.into_inner());
    done.sort_by_key(|(index, _, _)| *index);
    done.into_iter()
        .map(|(_, task, result)| (task, result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::{CommandOutput, LineRange};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers git commands from a table keyed by the joined argument list
    #[derive(Default)]
    struct FakeGit {
        replies: HashMap<String, CommandOutput>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakeGit {
        fn reply(mut self, args: &str, status: i32, stdout: &str) -> Self {
            self.replies.insert(
                args.to_string(),
                CommandOutput {
                    dry_run: false,
                    status,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    truncated: false,
                },
            );
            self
        }

        fn files(self, reference: &str, stdout: &str) -> Self {
            let key = format!(
                "diff --name-only --find-renames --diff-filter=ACMRD main..{}",
                reference
            );
            self.reply(&key, 0, stdout)
        }

        fn hunks(self, reference: &str, file: &str, stdout: &str) -> Self {
            let key = format!(
                "diff --unified=0 --no-color --no-ext-diff main..{} -- {}",
                reference, file
            );
            self.reply(&key, 0, stdout)
        }
    }

    impl CommandRunner for FakeGit {
        fn run(&self, program: &str, args: &[String]) -> VcsResult<CommandOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if args.len() == 1 && args[0] == "--version" {
                return Ok(CommandOutput {
                    dry_run: false,
                    status: 0,
                    stdout: "git version 2.45.0".to_string(),
                    stderr: String::new(),
                    truncated: false,
                });
            }
            self.replies
                .get(&args.join(" "))
                .cloned()
                .ok_or_else(|| VcsError::Spawn {
                    program: program.to_string(),
                    reason: format!("no reply for {:?}", args),
                })
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn options(include_hunks: bool) -> AnalyzeOptions {
        AnalyzeOptions {
            base: "main".to_string(),
            include_hunks,
            ..AnalyzeOptions::default()
        }
    }

    #[test]
    fn test_collect_files_isolates_failures() {
        let git = FakeGit::default()
            .files("good", "a.rs\nb.rs\n")
            .reply(
                "diff --name-only --find-renames --diff-filter=ACMRD main..bad",
                128,
                "",
            );
        let refs = names(&["good", "bad", "unreachable"]);
        let files = collect_files(&git, "main", &refs, 3);

        assert_eq!(files["good"], names(&["a.rs", "b.rs"]));
        assert!(files["bad"].is_empty());
        assert!(files["unreachable"].is_empty());
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_collect_files_bounds_concurrency() {
        let refs: Vec<String> = (0..8).map(|i| format!("r{}", i)).collect();
        let mut git = FakeGit {
            delay: Some(Duration::from_millis(20)),
            ..FakeGit::default()
        };
        for r in &refs {
            git = git.files(r, "shared.rs\n");
        }
        let files = collect_files(&git, "main", &refs, 3);

        assert_eq!(files.len(), 8);
        assert!(git.peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_collect_files_no_refs() {
        let git = FakeGit::default();
        assert!(collect_files(&git, "main", &[], 3).is_empty());
    }

    #[test]
    fn test_collect_hunks_bounds_concurrency() {
        let refs = names(&["A", "B"]);
        let file_names: Vec<String> = (0..5).map(|i| format!("f{}.rs", i)).collect();
        let mut git = FakeGit {
            delay: Some(Duration::from_millis(20)),
            ..FakeGit::default()
        };
        let mut files = RefFileSet::new();
        for r in &refs {
            for f in &file_names {
                git = git.hunks(r, f, "@@ -1,2 +1,2 @@\n");
            }
            files.insert(r.clone(), file_names.clone());
        }

        // 2 refs cap the pool at 4 workers even though the limit is 6
        let hunks = collect_hunks(&git, "main", &refs, &files, 6);

        assert_eq!(hunks.len(), 2);
        assert!(hunks.values().all(|by_file| by_file.len() == 5));
        assert!(git.peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_collect_hunks_keys_by_ref_and_file() {
        let git = FakeGit::default()
            .hunks("A", "f", "@@ -10,11 +10,11 @@\n")
            .hunks("B", "f", "@@ -15,4 +15,4 @@\n@@ -100,2 +100,2 @@\n");
        let refs = names(&["A", "B"]);
        let mut files = RefFileSet::new();
        files.insert("A".to_string(), names(&["f", "missing"]));
        files.insert("B".to_string(), names(&["f"]));

        let hunks = collect_hunks(&git, "main", &refs, &files, 6);
        assert_eq!(hunks["A"]["f"], vec![LineRange { start: 10, end: 20 }]);
        assert!(hunks["A"]["missing"].is_empty());
        assert_eq!(hunks["B"]["f"].len(), 2);
    }

    #[test]
    fn test_analyze_end_to_end() {
        let git = FakeGit::default()
            .files("A", "f1\nf2\n")
            .files("B", "f2\nf3\n")
            .files("C", "f4\n")
            .hunks("A", "f1", "@@ -1 +1 @@\n")
            .hunks("A", "f2", "@@ -10,11 +10,11 @@\n")
            .hunks("B", "f2", "@@ -15,4 +15,4 @@\n@@ -100,2 +100,2 @@\n")
            .hunks("B", "f3", "@@ -3,0 +4,2 @@\n")
            .hunks("C", "f4", "@@ -1,2 +1,2 @@\n");
        let refs = names(&["A", "B", "C"]);

        let analysis = analyze(&git, &refs, &options(true)).unwrap();
        assert_eq!(analysis.files.totals, vec![2, 2, 1]);
        assert_eq!(analysis.files.get("A", "B"), Some(1));
        assert_eq!(analysis.files.get("B", "C"), Some(0));
        assert_eq!(analysis.files.order.len(), 3);

        let hunks = analysis.hunks.unwrap();
        assert_eq!(hunks.get("A", "B"), Some(4));
        assert_eq!(hunks.totals, vec![4, 4, 0]);
        assert_eq!(hunks.hot_pairs.len(), 1);
    }

    #[test]
    fn test_analyze_without_hunks_skips_hunk_requests() {
        let git = FakeGit::default().files("A", "x\n");
        let analysis = analyze(&git, &names(&["A"]), &options(false)).unwrap();
        assert!(analysis.hunks.is_none());
        assert_eq!(analysis.files.order, names(&["A"]));
    }

    #[test]
    fn test_analyze_fails_when_git_unreachable() {
        struct Down;
        impl CommandRunner for Down {
            fn run(&self, program: &str, _args: &[String]) -> VcsResult<CommandOutput> {
                Err(VcsError::Spawn {
                    program: program.to_string(),
                    reason: "not found".to_string(),
                })
            }
        }
        let err = analyze(&Down, &names(&["A"]), &options(false)).unwrap_err();
        assert!(matches!(err, VcsError::Spawn { .. }));
    }

    #[test]
    fn test_run_pool_preserves_task_order() {
        let out = run_pool((0..20).collect::<Vec<u32>>(), 4, |n| {
            std::thread::sleep(Duration::from_millis(u64::from(20 - n)));
            n * 2
        });
        let tasks: Vec<u32> = out.iter().map(|(t, _)| *t).collect();
        assert_eq!(tasks, (0..20).collect::<Vec<_>>());
        assert!(out.iter().all(|(t, r)| *r == t * 2));
    }
}
