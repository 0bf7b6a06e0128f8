//! Knowledge gap types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::concept::DifficultyLevel;

/// Options for gap detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapDetectionConfig {
    pub max_gaps_to_return: usize,
    /// Gaps scoring below this are dropped (0 to 100)
    pub min_gap_score: f64,
    /// Longest learning path suggested, endpoints included
    pub max_learning_path_length: usize,
    pub difficulty_preference: DifficultyLevel,
}

impl Default for GapDetectionConfig {
    fn default() -> Self {
        Self {
            max_gaps_to_return: 10,
            min_gap_score: 30.0,
            max_learning_path_length: 5,
            difficulty_preference: DifficultyLevel::Intermediate,
        }
    }
}

/// Gap priority bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    Low,
    Medium,
    High,
}

impl GapPriority {
    /// ≥80 high, ≥50 medium, else low
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Components of a gap score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapScoreBreakdown {
    pub concept_relevance: f64,
    pub user_interest_alignment: f64,
    pub path_length_score: f64,
    pub difficulty_score: f64,
}

impl GapScoreBreakdown {
    /// Combined score clamped to [0, 100]
    pub fn total(&self) -> f64 {
        (self.concept_relevance
            + self.user_interest_alignment
            + self.path_length_score
            + self.difficulty_score)
            .clamp(0.0, 100.0)
    }
}

/// A concept the user does not know yet but is close to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGap {
    pub id: String,
    pub missing_concept: String,
    /// User concepts the missing one relates to, best first
    pub related_user_concepts: Vec<String>,
    /// From a known concept to the missing one
    pub suggested_learning_path: Vec<String>,
    pub gap_score: f64,
    /// Relevance of the underlying ontology match
    pub confidence_score: f64,
    /// Provider that surfaced the concept
    pub source: String,
    pub categories: Vec<String>,
    pub priority: GapPriority,
    /// Minutes
    pub estimated_learning_time: u32,
    pub score_breakdown: GapScoreBreakdown,
    pub detected_at: DateTime<Utc>,
}

impl KnowledgeGap {
    /// Difficulty class implied by the learning path length
    pub fn difficulty(&self) -> DifficultyLevel {
        difficulty_for_path(self.suggested_learning_path.len())
    }
}

pub(crate) fn difficulty_for_path(len: usize) -> DifficultyLevel {
    match len {
        0..=2 => DifficultyLevel::Beginner,
        3 => DifficultyLevel::Intermediate,
        _ => DifficultyLevel::Advanced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_thresholds() {
        assert_eq!(GapPriority::from_score(80.0), GapPriority::High);
        assert_eq!(GapPriority::from_score(79.9), GapPriority::Medium);
        assert_eq!(GapPriority::from_score(50.0), GapPriority::Medium);
        assert_eq!(GapPriority::from_score(49.9), GapPriority::Low);
        assert!(GapPriority::High > GapPriority::Low);
    }

    #[test]
    fn test_breakdown_total_is_clamped() {
        let breakdown = GapScoreBreakdown {
            concept_relevance: 60.0,
            user_interest_alignment: 25.0,
            path_length_score: 12.0,
            difficulty_score: 25.0,
        };
        assert_eq!(breakdown.total(), 100.0);
    }

    #[test]
    fn test_difficulty_from_path_length() {
        assert_eq!(difficulty_for_path(2), DifficultyLevel::Beginner);
        assert_eq!(difficulty_for_path(3), DifficultyLevel::Intermediate);
        assert_eq!(difficulty_for_path(5), DifficultyLevel::Advanced);
    }

    #[test]
    fn test_config_defaults() {
        let config = GapDetectionConfig::default();
        assert_eq!(config.max_gaps_to_return, 10);
        assert_eq!(config.min_gap_score, 30.0);
        assert_eq!(config.max_learning_path_length, 5);
        assert_eq!(config.difficulty_preference, DifficultyLevel::Intermediate);
    }
}
