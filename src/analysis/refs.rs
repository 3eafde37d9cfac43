//! Ref list handling: user input and pull-request heads

use std::collections::HashSet;

/// Split a whitespace-separated ref list, dropping blanks and repeats.
///
/// First occurrence wins, so the input order is preserved.
pub fn parse_ref_list(raw: &str) -> Vec<String> {
    merge_ref_sources([raw.split_whitespace().map(str::to_string).collect()])
}

/// Combine ref lists from several sources, in the order given.
///
/// A ref already contributed by an earlier source keeps its position.
pub fn merge_ref_sources<I>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for source in sources {
        for reference in source {
            let reference = reference.trim();
            if reference.is_empty() || !seen.insert(reference.to_string()) {
                continue;
            }
            merged.push(reference.to_string());
        }
    }
    merged
}
