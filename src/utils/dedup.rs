//! Deduplication of papers collected across sources.

use std::collections::HashSet;

use crate::models::Paper;

/// Remove papers whose titles collide, keeping the first occurrence.
///
/// The duplicate key is the title lowercased and trimmed; no fuzzy
/// matching. Because sources are collected in a fixed order, "first
/// occurrence" deterministically favors earlier sources.
pub fn dedupe_by_title(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen: HashSet<String> = HashSet::new();
    papers
        .into_iter()
        .filter(|paper| seen.insert(paper.title.trim().to_lowercase()))
        .collect()
}
