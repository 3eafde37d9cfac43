//! File-level overlap matrix and the greedy merge order

use super::{RefFileSet, lookup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pairwise shared-file counts between refs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapMatrix {
    /// Row/column labels, in input order
    pub refs: Vec<String>,

    /// `matrix[i][j]` = files changed by both refs; symmetric, zero diagonal
    pub matrix: Vec<Vec<u64>>,

    /// `totals[i]` = files changed by ref i
    pub totals: Vec<u64>,

    /// Suggested integration order, least entangled first
    pub order: Vec<String>,
}

impl OverlapMatrix {
    /// Shared-file count between two refs, if both are in the matrix
    pub fn get(&self, a: &str, b: &str) -> Option<u64> {
        lookup(&self.refs, &self.matrix, a, b)
    }
}

/// Build the shared-file matrix for `refs`.
///
/// Refs missing from `files_by_ref` are treated as changing nothing.
pub fn build_overlap_matrix(refs: &[String], files_by_ref: &RefFileSet) -> OverlapMatrix {
    let n = refs.len();
    let sets: Vec<HashSet<&str>> = refs
        .iter()
        .map(|r| {
            files_by_ref
                .get(r)
                .map(|files| files.iter().map(String::as_str).collect())
                .unwrap_or_default()
        })
        .collect();

    let mut matrix = vec![vec![0u64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let shared = sets[i].intersection(&sets[j]).count() as u64;
            matrix[i][j] = shared;
            matrix[j][i] = shared;
        }
    }

    let totals = sets.iter().map(|s| s.len() as u64).collect();
    let order = suggest_order(refs, &matrix);

    OverlapMatrix {
        refs: refs.to_vec(),
        matrix,
        totals,
        order,
    }
}

/// Greedy minimum-conflict-first ordering.
///
/// Each step picks the remaining ref with the smallest overlap against the
/// refs that are still remaining, so placed refs stop counting. Ties go to
/// the earliest ref in input order.
pub fn suggest_order(refs: &[String], matrix: &[Vec<u64>]) -> Vec<String> {
    let mut remaining: Vec<usize> = (0..refs.len()).collect();
    let mut order = Vec::with_capacity(refs.len());

    while !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = u64::MAX;

        for (pos, &i) in remaining.iter().enumerate() {
            let score: u64 = remaining
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| matrix[i][j])
                .sum();
            if score < best_score {
                best_pos = pos;
                best_score = score;
            }
        }

        let chosen = remaining.remove(best_pos);
        order.push(refs[chosen].clone());
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn files(entries: Vec<(&str, Vec<&str>)>) -> RefFileSet {
        entries
            .into_iter()
            .map(|(r, fs)| (r.to_string(), fs.into_iter().map(String::from).collect()))
            .collect()
    }

    #[test]
    fn test_three_ref_example() {
        let refs = names(&["A", "B", "C"]);
        let files = files(vec![
            ("A", vec!["f1", "f2"]),
            ("B", vec!["f2", "f3"]),
            ("C", vec!["f4"]),
        ]);
        let result = build_overlap_matrix(&refs, &files);

        assert_eq!(result.totals, vec![2, 2, 1]);
        assert_eq!(result.matrix[0][1], 1);
        assert_eq!(result.matrix[1][0], 1);
        assert_eq!(result.matrix[1][2], 0);
        assert_eq!(result.get("A", "B"), Some(1));
        assert_eq!(result.get("A", "missing"), None);
        // C touches nothing shared, then A and B tie at 1 and A comes first
        assert_eq!(result.order, names(&["C", "A", "B"]));
    }

    #[test]
    fn test_disjoint_sets_give_zero_matrix() {
        let refs = names(&["a", "b", "c"]);
        let files = files(vec![("a", vec!["1"]), ("b", vec!["2", "3"]), ("c", vec![])]);
        let result = build_overlap_matrix(&refs, &files);

        assert!(result.matrix.iter().flatten().all(|&c| c == 0));
        assert_eq!(result.totals, vec![1, 2, 0]);
        assert_eq!(result.order, refs);
    }

    #[test]
    fn test_symmetric_with_zero_diagonal() {
        let refs = names(&["a", "b", "c", "d"]);
        let files = files(vec![
            ("a", vec!["x", "y", "z"]),
            ("b", vec!["x", "y"]),
            ("c", vec!["y", "z", "w"]),
            ("d", vec!["w"]),
        ]);
        let m = build_overlap_matrix(&refs, &files).matrix;
        for i in 0..4 {
            assert_eq!(m[i][i], 0);
            for j in 0..4 {
                assert_eq!(m[i][j], m[j][i]);
            }
        }
        assert_eq!(m[0][2], 2);
        assert_eq!(m[2][3], 1);
    }

    #[test]
    fn test_missing_ref_counts_as_empty() {
        let refs = names(&["a", "ghost"]);
        let files = files(vec![("a", vec!["x"])]);
        let result = build_overlap_matrix(&refs, &files);
        assert_eq!(result.totals, vec![1, 0]);
        assert_eq!(result.matrix, vec![vec![0, 0], vec![0, 0]]);
    }

    #[test]
    fn test_empty_refs() {
        let result = build_overlap_matrix(&[], &RefFileSet::new());
        assert!(result.matrix.is_empty());
        assert!(result.totals.is_empty());
        assert!(result.order.is_empty());
    }

    #[test]
    fn test_order_uses_remaining_refs_only() {
        // Fixed sums against every ref are a=6, b=10, c=5, d=5, which would
        // rank c, d, a, b. With c placed, a (3+1) beats d (1+4).
        let refs = names(&["a", "b", "c", "d"]);
        let matrix = vec![
            vec![0, 3, 2, 1],
            vec![3, 0, 3, 4],
            vec![2, 3, 0, 0],
            vec![1, 4, 0, 0],
        ];
        assert_eq!(suggest_order(&refs, &matrix), names(&["c", "a", "b", "d"]));
    }

    #[test]
    fn test_idempotent() {
        let refs = names(&["x", "y", "z"]);
        let files = files(vec![
            ("x", vec!["1", "2"]),
            ("y", vec!["2"]),
            ("z", vec!["1", "2"]),
        ]);
        let first = build_overlap_matrix(&refs, &files);
        let second = build_overlap_matrix(&refs, &files);
        assert_eq!(first, second);
    }
}
