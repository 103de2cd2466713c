//! Fuzzy duplicate detection for headlines.
//!
//! Similarity is the Sørensen–Dice coefficient over character bigrams of the
//! normalized strings with whitespace removed. It is symmetric, lies in
//! `[0, 1]`, and is `1.0` for any string compared with itself.

use crate::models::Candidate;
use std::collections::HashMap;
use tracing::debug;

/// Headlines at or above this score are treated as the same story.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Dice similarity of two strings after [`normalize`].
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    let left_total: usize = left.values().sum();
    let right_total: usize = right.values().sum();
    if left_total == 0 || right_total == 0 {
        return 0.0;
    }

    let shared: usize = left
        .iter()
        .map(|(pair, n)| right.get(pair).map_or(0, |m| (*n).min(*m)))
        .sum();
    (2 * shared) as f64 / (left_total + right_total) as f64
}

/// Whether `a` and `b` score at least `threshold`.
pub fn is_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

/// Drop candidates whose title is a near-duplicate of an earlier one.
///
/// The first occurrence wins. Returns the kept candidates in input order and
/// the number removed.
pub fn suppress_near_duplicates(candidates: Vec<Candidate>, threshold: f64) -> (Vec<Candidate>, usize) {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut removed = 0;

    for candidate in candidates {
        let twin = kept
            .iter()
            .find(|k| is_duplicate(&k.title, &candidate.title, threshold));
        match twin {
            Some(original) => {
                debug!(
                    kept = %original.url,
                    dropped = %candidate.url,
                    "Suppressed near-duplicate headline"
                );
                removed += 1;
            }
            None => kept.push(candidate),
        }
    }

    (kept, removed)
}
