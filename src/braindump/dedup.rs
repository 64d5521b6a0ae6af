//! Token-overlap duplicate detection.
//!
//! Similarity between two lines is the Jaccard index of their token sets
//! (tokens are lowercase alphanumeric runs; punctuation and whitespace
//! separate). All unordered pairs are compared, so the cost is O(N²) in the
//! number of lines; the analyze entry point bounds N with the configured
//! line limit before calling in here. There is no incremental mode: each
//! analysis recomputes the full pair set.

use std::collections::HashSet;

use super::types::DuplicateRelation;

/// A pair of line indices scored at or above the duplicate threshold.
///
/// Always ordered `a_index < b_index`, so (i, j) and (j, i) can never both
/// be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub a_index: usize,
    pub b_index: usize,
    pub score: f64,
}

impl From<DuplicatePair> for DuplicateRelation {
    fn from(pair: DuplicatePair) -> Self {
        DuplicateRelation {
            existing_task_index: pair.a_index,
            new_task_index: pair.b_index,
            similarity: pair.score,
        }
    }
}

/// Split a line into its lowercase token set.
pub fn tokenize(line: &str) -> HashSet<String> {
    line.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets; 0.0 when both sets are empty.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersect = a.iter().filter(|t| b.contains(*t)).count();
    let union = a.len() + b.len() - intersect;
    if union == 0 {
        0.0
    } else {
        intersect as f64 / union as f64
    }
}

/// Compare every unordered pair of lines and report those whose token
/// Jaccard score is at or above `threshold`.
pub fn detect_duplicates(lines: &[String], threshold: f64) -> Vec<DuplicatePair> {
    let tokenized: Vec<HashSet<String>> = lines.iter().map(|l| tokenize(l)).collect();
    let mut pairs = Vec::new();
    for i in 0..lines.len() {
        for j in (i + 1)..lines.len() {
            let score = jaccard(&tokenized[i], &tokenized[j]);
            if score >= threshold {
                pairs.push(DuplicatePair {
                    a_index: i,
                    b_index: j,
                    score,
                });
            }
        }
    }
    pairs
}
