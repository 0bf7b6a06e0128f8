//! Relevance heuristic for ontology matches

use std::collections::HashSet;

const EXACT_MATCH: f64 = 100.0;
const PREFIX_MATCH: f64 = 80.0;
const SUBSTRING_MATCH: f64 = 60.0;
const MAX_TOKEN_OVERLAP: f64 = 40.0;
const LENGTH_PENALTY_PER_CHAR: f64 = 0.5;
const MAX_LENGTH_PENALTY: f64 = 10.0;

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Score how well an ontology label matches the query concept
///
/// Exact match scores 100, prefix 80, substring 60, otherwise the share of
/// query tokens found in the label scaled to at most 40. A penalty of half
/// a point per character of length difference (at most 10) is subtracted.
/// The result is clamped to [0, 100] and rounded to 2 decimals.
pub fn relevance_score(concept: &str, label: &str) -> f64 {
    let concept = concept.trim().to_lowercase();
    let label = label.trim().to_lowercase();
    if concept.is_empty() || label.is_empty() {
        return 0.0;
    }

    let base = if label == concept {
        EXACT_MATCH
    } else if label.starts_with(&concept) {
        PREFIX_MATCH
    } else if label.contains(&concept) {
        SUBSTRING_MATCH
    } else {
        let query_tokens = tokens(&concept);
        let label_tokens = tokens(&label);
        if query_tokens.is_empty() {
            0.0
        } else {
            let shared = query_tokens.intersection(&label_tokens).count() as f64;
            MAX_TOKEN_OVERLAP * shared / query_tokens.len() as f64
        }
    };

    let length_diff = concept.chars().count().abs_diff(label.chars().count()) as f64;
    let penalty = (length_diff * LENGTH_PENALTY_PER_CHAR).min(MAX_LENGTH_PENALTY);

    let score = (base - penalty).clamp(0.0, 100.0);
    (score * 100.0).round() / 100.0
}
