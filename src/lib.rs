//! Mergetrain - Preview how entangled a set of branches is before merging them
//!
//! This library parses git status and diff output into structured records
//! and measures how much a set of refs overlap relative to a common base, so
//! they can be integrated in a low-conflict order.
//!
//! # Architecture
//!
//! The library is organized into focused modules:
//!
//! - **vcs** - Command execution (the [`CommandRunner`] seam), status and
//!   hunk parsing, changed-file listing, open pull requests
//! - **analysis** - File-level overlap matrix, greedy merge order, hunk-level
//!   overlap scoring, CSV export
//!
//! # Usage
//!
//! 1. **CLI tool** (`src/main.rs`) - Command-line interface for humans
//! 2. **Library** - Rust code can import and use these functions directly
//!
//! # Example
//!
//! ```rust,no_run
//! use mergetrain::{AnalyzeOptions, SystemRunner, analyze, matrix_to_csv};
//!
//! let runner = SystemRunner::discover(".").expect("Failed to find repository");
//! let refs = vec!["feature/auth".to_string(), "feature/billing".to_string()];
//!
//! let options = AnalyzeOptions {
//!     include_hunks: true,
//!     ..AnalyzeOptions::default()
//! };
//! let analysis = analyze(&runner, &refs, &options).expect("git is unavailable");
//!
//! println!("Suggested order: {}", analysis.files.order.join(" "));
//! println!("{}", matrix_to_csv(&analysis.refs, &analysis.files.matrix));
//! ```

pub mod analysis;
pub mod vcs;

pub use analysis::*;
pub use vcs::{
    ChangeRecord, CommandOutput, CommandRunner, LineRange, PullRequest, StatusCode, SystemRunner,
    VcsError, VcsResult,
};
