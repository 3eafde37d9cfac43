//! Hunk-level overlap: how many base lines two refs both rewrite
//!
//! Two refs that touch the same file in disjoint places show up as a shared
//! file in the file-level matrix but score zero here.

use super::{RefFileSet, RefHunkMap, lookup};
use crate::vcs::LineRange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A ref pair whose changed line ranges intersect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotPair {
    pub a: String,
    pub b: String,
    /// Overlapping base lines summed over shared files
    pub score: u64,
}

/// Pairwise overlapping-line counts between refs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkOverlap {
    pub refs: Vec<String>,

    /// Symmetric, zero diagonal
    pub matrix: Vec<Vec<u64>>,

    /// Row sums
    pub totals: Vec<u64>,

    /// Non-zero pairs, highest score first
    pub hot_pairs: Vec<HotPair>,
}

impl HunkOverlap {
    pub fn get(&self, a: &str, b: &str) -> Option<u64> {
        lookup(&self.refs, &self.matrix, a, b)
    }
}

/// Score every ref pair by the base lines their hunks share.
///
/// Only files present in both refs' file sets are compared. Missing hunk
/// entries count as no ranges.
pub fn score_hunk_overlap(
    refs: &[String],
    files_by_ref: &RefFileSet,
    hunks: &RefHunkMap,
) -> HunkOverlap {
    let n = refs.len();
    let file_lists: Vec<Vec<&str>> = refs
        .iter()
        .map(|r| unique_files(files_by_ref.get(r)))
        .collect();
    let file_sets: Vec<HashSet<&str>> = file_lists
        .iter()
        .map(|files| files.iter().copied().collect())
        .collect();

    let mut matrix = vec![vec![0u64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let score: u64 = file_lists[i]
                .iter()
                .filter(|file| file_sets[j].contains(*file))
                .map(|file| {
                    let ranges_i = ranges_for(hunks, &refs[i], file);
                    let ranges_j = ranges_for(hunks, &refs[j], file);
                    ranges_i
                        .iter()
                        .flat_map(move |a| ranges_j.iter().map(move |b| a.overlap(b)))
                        .sum::<u64>()
                })
                .sum();
            matrix[i][j] = score;
            matrix[j][i] = score;
        }
    }

    let totals: Vec<u64> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, score)| score)
                .sum::<u64>()
        })
        .collect();

    let mut hot_pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if matrix[i][j] > 0 {
                hot_pairs.push(HotPair {
                    a: refs[i].clone(),
                    b: refs[j].clone(),
                    score: matrix[i][j],
                });
            }
        }
    }
    // Stable: equal scores keep (i, j) discovery order
    hot_pairs.sort_by(|x, y| y.score.cmp(&x.score));

    HunkOverlap {
        refs: refs.to_vec(),
        matrix,
        totals,
        hot_pairs,
    }
}

fn unique_files(files: Option<&Vec<String>>) -> Vec<&str> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .flatten()
        .map(String::as_str)
        .filter(|f| seen.insert(*f))
        .collect()
}

fn ranges_for<'a>(hunks: &'a RefHunkMap, reference: &str, file: &str) -> &'a [LineRange] {
    hunks
        .get(reference)
        .and_then(|by_file| by_file.get(file))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
