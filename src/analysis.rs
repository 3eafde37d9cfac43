//! Overlap analysis between refs
//!
//! Given the files (and optionally the base-side line ranges) each ref
//! changes relative to a common base, this module scores how entangled every
//! pair of refs is and suggests an order to integrate them in.
//!
//! All scoring is pure and synchronous; only [`collect`] talks to git.

pub mod collect;
pub mod csv;
pub mod hunks;
pub mod overlap;
pub mod refs;

pub use collect::{
    Analysis, AnalyzeOptions, DEFAULT_BASE, DEFAULT_FILE_WORKERS, DEFAULT_HUNK_WORKERS, analyze,
    collect_files, collect_hunks, probe,
};
pub use csv::{matrix_to_csv, order_to_line};
pub use hunks::{HotPair, HunkOverlap, score_hunk_overlap};
pub use overlap::{OverlapMatrix, build_overlap_matrix, suggest_order};
pub use refs::{merge_ref_sources, parse_ref_list};

use crate::vcs::LineRange;
use std::collections::BTreeMap;

/// Ref name -> changed paths, unique and in first-seen order
pub type RefFileSet = BTreeMap<String, Vec<String>>;

/// Ref name -> path -> base-side ranges in header order
pub type RefHunkMap = BTreeMap<String, BTreeMap<String, Vec<LineRange>>>;

/// Cell lookup by ref label
fn lookup(refs: &[String], matrix: &[Vec<u64>], a: &str, b: &str) -> Option<u64> {
    let i = refs.iter().position(|r| r == a)?;
    let j = refs.iter().position(|r| r == b)?;
    matrix.get(i)?.get(j).copied()
}
