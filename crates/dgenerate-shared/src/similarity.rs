//! Guess-vs-prompt similarity scoring.
//!
//! Both inputs are normalized (lowercased, outer whitespace trimmed) and then
//! compared in three tiers:
//!
//! 1. identical strings score [`EXACT_MATCH_SCORE`],
//! 2. one string containing the other scores [`CONTAINMENT_SCORE`],
//! 3. otherwise the score is the Levenshtein similarity
//!    `(max_len - distance) / max_len * 100`, rounded half-up to two
//!    decimals.
//!
//! Lengths and edits are counted in Unicode scalar values.

use crate::constants::{CONTAINMENT_SCORE, EXACT_MATCH_SCORE};

/// Score `guess` against `reference`, returning a value in `[0, 100]`.
///
/// The function is pure and symmetric: `score(a, b) == score(b, a)`.
pub fn score(guess: &str, reference: &str) -> f64 {
    let s1 = normalize(guess);
    let s2 = normalize(reference);

    if s1 == s2 {
        return EXACT_MATCH_SCORE;
    }

    if s1.contains(s2.as_str()) || s2.contains(s1.as_str()) {
        return CONTAINMENT_SCORE;
    }

    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        // Unreachable: two empty strings compare equal above.
        return EXACT_MATCH_SCORE;
    }

    let distance = levenshtein(&a, &b);
    let similarity = (max_len - distance) as f64 / max_len as f64 * 100.0;
    round2(similarity)
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Classic edit distance with unit cost for insert, delete and substitute.
/// No transposition. Runs in O(n*m) time with two rolling rows.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Round to two decimals, half-up. Inputs are expected to be non-negative.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}
