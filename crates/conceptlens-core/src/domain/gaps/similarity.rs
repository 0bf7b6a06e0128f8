//! Concept similarity used to decide what a user already knows

use std::collections::HashSet;

use crate::domain::concept::normalize;

/// Above this a candidate counts as already known
pub const KNOWN_THRESHOLD: f64 = 0.8;
/// Above this (and below [`KNOWN_THRESHOLD`]) a user concept counts as related
pub const RELATED_THRESHOLD: f64 = 0.3;

/// Similarity between two concept labels, in [0, 1]
///
/// Implementations must be symmetric and return 1.0 for equal labels.
pub trait ConceptSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;

    fn is_known(&self, a: &str, b: &str) -> bool {
        self.similarity(a, b) > KNOWN_THRESHOLD
    }

    fn is_related(&self, a: &str, b: &str) -> bool {
        let s = self.similarity(a, b);
        s > RELATED_THRESHOLD && s < KNOWN_THRESHOLD
    }
}

/// Substring and token-Jaccard heuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarity;

fn tokens(s: &str) -> HashSet<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

impl ConceptSimilarity for LexicalSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }

        let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
        if longer.contains(shorter.as_str()) {
            return 0.6 + 0.4 * (shorter.chars().count() as f64 / longer.chars().count() as f64);
        }

        let ta = tokens(&a);
        let tb = tokens(&b);
        let union = ta.union(&tb).count();
        if union == 0 {
            return 0.0;
        }
        ta.intersection(&tb).count() as f64 / union as f64
    }
}
