//! Ranking types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::concept::DifficultyLevel;
use crate::domain::gaps::KnowledgeGap;
use crate::domain::links::HiddenLink;

/// Kind of a ranked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultType {
    KnowledgeGap,
    HiddenLink,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeGap => "knowledge-gap",
            Self::HiddenLink => "hidden-link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "knowledge-gap" | "gap" | "gaps" => Some(Self::KnowledgeGap),
            "hidden-link" | "link" | "links" => Some(Self::HiddenLink),
            _ => None,
        }
    }
}

/// Priority of a ranked item, derived from its unified score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnifiedPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl UnifiedPriority {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Critical
        } else if score >= 65.0 {
            Self::High
        } else if score >= 45.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// 0 (low) to 3 (critical)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// The six scores a unified score is built from, each in [0, 100]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    pub relevance: f64,
    pub user_interest: f64,
    pub learning_impact: f64,
    pub ontology_strength: f64,
    pub recency: f64,
    pub difficulty: f64,
}

/// Weights of the component scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub relevance: f64,
    pub user_interest: f64,
    pub learning_impact: f64,
    pub ontology_strength: f64,
    pub recency: f64,
    pub difficulty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            relevance: 0.25,
            user_interest: 0.20,
            learning_impact: 0.20,
            ontology_strength: 0.15,
            recency: 0.10,
            difficulty: 0.10,
        }
    }
}

impl ScoringWeights {
    /// Weights by config key
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("relevance", self.relevance),
            ("user_interest", self.user_interest),
            ("learning_impact", self.learning_impact),
            ("ontology_strength", self.ontology_strength),
            ("recency", self.recency),
            ("difficulty", self.difficulty),
        ]
    }

    pub fn total(&self) -> f64 {
        self.relevance
            + self.user_interest
            + self.learning_impact
            + self.ontology_strength
            + self.recency
            + self.difficulty
    }

    /// Weighted sum clamped to [0, 100]; a non-finite sum scores 0
    pub fn combine(&self, scores: &ComponentScores) -> f64 {
        let sum = self.relevance * scores.relevance
            + self.user_interest * scores.user_interest
            + self.learning_impact * scores.learning_impact
            + self.ontology_strength * scores.ontology_strength
            + self.recency * scores.recency
            + self.difficulty * scores.difficulty;
        if !sum.is_finite() {
            return 0.0;
        }
        (sum.clamp(0.0, 100.0) * 100.0).round() / 100.0
    }
}

/// The item a unified result was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum OriginalData {
    KnowledgeGap(KnowledgeGap),
    HiddenLink(HiddenLink),
}

impl OriginalData {
    pub fn result_type(&self) -> ResultType {
        match self {
            Self::KnowledgeGap(_) => ResultType::KnowledgeGap,
            Self::HiddenLink(_) => ResultType::HiddenLink,
        }
    }
}

/// A gap or link on the common ranking scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResult {
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub title: String,
    pub description: String,
    pub unified_score: f64,
    pub priority: UnifiedPriority,
    pub scores: ComponentScores,
    pub original_data: OriginalData,
    pub recommendations: Vec<String>,
    /// Minutes
    pub estimated_learning_time: u32,
    pub difficulty: DifficultyLevel,
    pub categories: Vec<String>,
    pub related_concepts: Vec<String>,
    pub learning_path: Vec<String>,
    pub discovered_at: DateTime<Utc>,
}

/// Who the ranking is for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub interests: Vec<String>,
    pub goals: Vec<String>,
    pub focus_areas: Vec<String>,
    /// Concepts studied before
    pub history: Vec<String>,
    pub level: DifficultyLevel,
    /// Overrides `level` when matching difficulty
    pub preferred_difficulty: Option<DifficultyLevel>,
    pub time_budget_minutes: Option<u32>,
}

impl UserProfile {
    pub fn target_difficulty(&self) -> DifficultyLevel {
        self.preferred_difficulty.unwrap_or(self.level)
    }
}

/// Filters and limits applied to a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingOptions {
    pub max_results: usize,
    pub min_unified_score: f64,
    pub include_recommendations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_filter: Option<Vec<UnifiedPriority>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_filter: Option<Vec<ResultType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_filter: Option<Vec<DifficultyLevel>>,
    /// Case-insensitive substring matched against categories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_filter: Option<String>,
    /// Minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_learning_time: Option<u32>,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            max_results: 20,
            min_unified_score: 0.0,
            include_recommendations: true,
            priority_filter: None,
            type_filter: None,
            difficulty_filter: None,
            category_filter: None,
            max_learning_time: None,
        }
    }
}

impl RankingOptions {
    /// True when the result passes every active filter
    ///
    /// An empty filter list is inactive.
    pub fn accepts(&self, result: &UnifiedResult) -> bool {
        fn allows<T: PartialEq>(filter: &Option<Vec<T>>, value: &T) -> bool {
            match filter {
                Some(values) if !values.is_empty() => values.contains(value),
                _ => true,
            }
        }

        if !allows(&self.priority_filter, &result.priority)
            || !allows(&self.type_filter, &result.result_type)
            || !allows(&self.difficulty_filter, &result.difficulty)
        {
            return false;
        }

        if let Some(category) = self.category_filter.as_deref() {
            let needle = category.trim().to_lowercase();
            if !needle.is_empty()
                && !result
                    .categories
                    .iter()
                    .any(|c| c.to_lowercase().contains(&needle))
            {
                return false;
            }
        }

        match self.max_learning_time {
            Some(max) => result.estimated_learning_time <= max,
            None => true,
        }
    }
}
