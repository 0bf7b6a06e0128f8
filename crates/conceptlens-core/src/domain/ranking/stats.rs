//! Summary statistics over a ranking

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::types::{ComponentScores, ResultType, UnifiedResult};

const TOP_CATEGORIES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_results: usize,
    pub knowledge_gaps: usize,
    pub hidden_links: usize,
    pub average_unified_score: f64,
    pub average_scores: ComponentScores,
    pub priority_distribution: BTreeMap<String, usize>,
    pub difficulty_distribution: BTreeMap<String, usize>,
    /// Most frequent categories, most frequent first
    pub top_categories: Vec<(String, usize)>,
    /// Minutes
    pub total_learning_time: u64,
}

impl PerformanceStats {
    pub fn from_results(results: &[UnifiedResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let n = results.len() as f64;
        let mut stats = Self {
            total_results: results.len(),
            ..Default::default()
        };
        let mut sums = ComponentScores::default();
        let mut unified = 0.0;
        let mut categories: HashMap<&str, usize> = HashMap::new();

        for r in results {
            match r.result_type {
                ResultType::KnowledgeGap => stats.knowledge_gaps += 1,
                ResultType::HiddenLink => stats.hidden_links += 1,
            }
            unified += r.unified_score;
            sums.relevance += r.scores.relevance;
            sums.user_interest += r.scores.user_interest;
            sums.learning_impact += r.scores.learning_impact;
            sums.ontology_strength += r.scores.ontology_strength;
            sums.recency += r.scores.recency;
            sums.difficulty += r.scores.difficulty;

            *stats
                .priority_distribution
                .entry(r.priority.as_str().to_string())
                .or_default() += 1;
            *stats
                .difficulty_distribution
                .entry(r.difficulty.as_str().to_string())
                .or_default() += 1;
            for category in &r.categories {
                *categories.entry(category.as_str()).or_default() += 1;
            }
            stats.total_learning_time += u64::from(r.estimated_learning_time);
        }

        stats.average_unified_score = round2(unified / n);
        stats.average_scores = ComponentScores {
            relevance: round2(sums.relevance / n),
            user_interest: round2(sums.user_interest / n),
            learning_impact: round2(sums.learning_impact / n),
            ontology_strength: round2(sums.ontology_strength / n),
            recency: round2(sums.recency / n),
            difficulty: round2(sums.difficulty / n),
        };

        let mut top: Vec<(String, usize)> = categories
            .into_iter()
            .map(|(c, count)| (c.to_string(), count))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(TOP_CATEGORIES);
        stats.top_categories = top;

        stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
