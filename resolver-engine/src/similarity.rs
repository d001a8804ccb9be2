//! Composite similarity scoring over normalized strings (spec §4.C).
//!
//! `strsim::jaro_winkler` already implements the canonical Jaro formula with
//! prefix bonus `p=0.1` capped at a 4-character prefix, matching the spec
//! exactly, so it is used directly rather than hand-rolled — the same
//! production use of `strsim` observed in the cascading fuzzy-match stage
//! reviewed for this engine.

use resolver_core::config::SimilarityWeights;
use std::collections::HashSet;

/// Weighted composite of Levenshtein ratio, Jaro-Winkler, and token-Jaccard.
/// `a` and `b` are expected to already be normalized. Exact equality
/// shortcuts to `1.0`; the result is always clamped to `[0, 1]`.
#[must_use]
pub fn score(a: &str, b: &str, weights: &SimilarityWeights) -> f64 {
    if a == b {
        return 1.0;
    }

    let lev = levenshtein_ratio(a, b);
    let jw = strsim::jaro_winkler(a, b);
    let jac = token_jaccard(a, b);

    let composite = weights.levenshtein * lev + weights.jaro_winkler * jw + weights.jaccard * jac;
    composite.clamp(0.0, 1.0)
}

/// `1 - editDistance(a, b) / max(|a|, |b|)`, via `strsim::levenshtein`
/// (standard dynamic-programming edit distance).
#[must_use]
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    1.0 - (distance as f64 / max_len as f64)
}

/// `|A ∩ B| / |A ∪ B|` over whitespace-split token sets.
#[must_use]
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
