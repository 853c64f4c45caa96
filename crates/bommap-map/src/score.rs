//! Fuzzy scoring for header pairs.
//!
//! Uses Jaro-Winkler similarity as the base string metric, blended with
//! normalized Levenshtein and a token-sorted variant so word order does not
//! dominate, then takes the better of that blend and the semantic
//! dictionary score.

use rapidfuzz::distance::{jaro_winkler, levenshtein};

use crate::synonyms::semantic_similarity;
use crate::utils::normalize_header;

const JARO_WINKLER_WEIGHT: f64 = 0.45;
const TOKEN_SORT_WEIGHT: f64 = 0.30;
const LEVENSHTEIN_WEIGHT: f64 = 0.25;

/// Similarity score in `[0, 1]` between a target header and a source header.
///
/// Case, separators and repeated whitespace never affect the result. An
/// exact match after normalization is always `1.0`.
pub fn score_headers(target: &str, source: &str) -> f64 {
    let target = normalize_header(target);
    let source = normalize_header(source);
    if target.is_empty() || source.is_empty() {
        return 0.0;
    }
    if target == source {
        return 1.0;
    }

    let semantic = semantic_similarity(&target, &source);
    let distance = distance_blend(&target, &source);
    semantic.max(distance)
}

fn distance_blend(a: &str, b: &str) -> f64 {
    let jaro = jaro_winkler::similarity(a.chars(), b.chars());
    let token = jaro_winkler::similarity(token_sorted(a).chars(), token_sorted(b).chars());
    let lev = levenshtein::normalized_similarity(a.chars(), b.chars());

    JARO_WINKLER_WEIGHT * jaro + TOKEN_SORT_WEIGHT * token + LEVENSHTEIN_WEIGHT * lev
}

fn token_sorted(normalized: &str) -> String {
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(score_headers("Quantity", "Quantity"), 1.0);
    }

    #[test]
    fn case_and_whitespace_do_not_matter() {
        assert_eq!(score_headers("Item Code", " item_code "), 1.0);
        assert_eq!(score_headers("PART NUMBER", "part number"), 1.0);
    }

    #[test]
    fn reordered_tokens_stay_close() {
        let score = score_headers("Number Part", "Part Number");
        assert!(score > 0.85, "token order should not dominate, got {score}");
    }

    #[test]
    fn dictionary_beats_raw_distance() {
        // "Part No" and "Item Code" share almost no characters; only the
        // vocabulary makes this pair viable.
        let score = score_headers("Item Code", "Part No");
        assert!(score >= 0.7, "expected semantic lift, got {score}");
    }

    #[test]
    fn unrelated_headers_score_low() {
        let score = score_headers("Quantity", "Supplier Address");
        assert!(score < 0.6, "unrelated pair scored {score}");
    }

    #[test]
    fn near_miss_spelling_scores_above_threshold() {
        let score = score_headers("Quantity", "Quantiy");
        assert!(score > 0.9, "one-typo pair scored {score}");
    }
}
