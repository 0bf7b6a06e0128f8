//! Component scoring and the ranking comparator

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::concept::{DifficultyLevel, normalize};
use crate::domain::gaps::{GapPriority, KnowledgeGap};
use crate::domain::links::{HiddenLink, LinkType};

use super::types::{
    ComponentScores, OriginalData, ScoringWeights, UnifiedPriority, UnifiedResult, UserProfile,
};

const INTEREST_POINTS: f64 = 25.0;
const GOAL_POINTS: f64 = 20.0;
const FOCUS_AREA_POINTS: f64 = 15.0;
const HISTORY_POINTS: f64 = 10.0;

/// Minutes per hop when learning a link
const LINK_MINUTES_PER_HOP: u32 = 15;

/// Convert a gap or link into a scored unified result
///
/// Recommendations are left empty.
pub fn score_item(
    data: OriginalData,
    profile: &UserProfile,
    weights: &ScoringWeights,
    now: DateTime<Utc>,
) -> UnifiedResult {
    let shape = match &data {
        OriginalData::KnowledgeGap(gap) => gap_shape(gap),
        OriginalData::HiddenLink(link) => link_shape(link),
    };

    let scores = ComponentScores {
        relevance: shape.confidence.clamp(0.0, 100.0),
        user_interest: user_interest_score(&shape.terms(), profile),
        learning_impact: match &data {
            OriginalData::KnowledgeGap(gap) => gap_learning_impact(gap),
            OriginalData::HiddenLink(link) => link_learning_impact(link),
        },
        ontology_strength: match &data {
            OriginalData::KnowledgeGap(gap) => (gap.gap_score * 0.8).clamp(0.0, 100.0),
            OriginalData::HiddenLink(link) => (link.strength * 100.0).clamp(0.0, 100.0),
        },
        recency: recency_score(shape.discovered_at, now),
        difficulty: difficulty_match(shape.difficulty, profile.target_difficulty()),
    };
    let unified_score = weights.combine(&scores);

    UnifiedResult {
        id: shape.id,
        result_type: data.result_type(),
        title: shape.title,
        description: shape.description,
        unified_score,
        priority: UnifiedPriority::from_score(unified_score),
        scores,
        original_data: data,
        recommendations: Vec::new(),
        estimated_learning_time: shape.minutes,
        difficulty: shape.difficulty,
        categories: shape.categories,
        related_concepts: shape.related,
        learning_path: shape.path,
        discovered_at: shape.discovered_at,
    }
}

/// Ranking order: unified score, priority, user interest, learning impact,
/// recency, all descending, then id
pub fn compare_results(a: &UnifiedResult, b: &UnifiedResult) -> Ordering {
    b.unified_score
        .total_cmp(&a.unified_score)
        .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        .then_with(|| b.scores.user_interest.total_cmp(&a.scores.user_interest))
        .then_with(|| b.scores.learning_impact.total_cmp(&a.scores.learning_impact))
        .then_with(|| b.discovered_at.cmp(&a.discovered_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Fields shared by both kinds of item before scoring
struct Shape {
    id: String,
    title: String,
    description: String,
    confidence: f64,
    minutes: u32,
    difficulty: DifficultyLevel,
    categories: Vec<String>,
    related: Vec<String>,
    path: Vec<String>,
    discovered_at: DateTime<Utc>,
}

impl Shape {
    /// Lowercased text the profile keywords are matched against
    fn terms(&self) -> Vec<String> {
        std::iter::once(&self.title)
            .chain(&self.categories)
            .chain(&self.related)
            .chain(&self.path)
            .map(|t| normalize(t))
            .collect()
    }
}

fn gap_shape(gap: &KnowledgeGap) -> Shape {
    let description = if gap.related_user_concepts.is_empty() {
        format!("'{}' is not covered by your notes yet", gap.missing_concept)
    } else {
        format!(
            "'{}' is not covered by your notes but relates to {}",
            gap.missing_concept,
            gap.related_user_concepts.join(", ")
        )
    };

    Shape {
        id: format!("gap-{}", gap.id),
        title: gap.missing_concept.clone(),
        description,
        confidence: gap.confidence_score,
        minutes: gap.estimated_learning_time,
        difficulty: gap.difficulty(),
        categories: gap.categories.clone(),
        related: gap.related_user_concepts.clone(),
        path: gap.suggested_learning_path.clone(),
        discovered_at: gap.detected_at,
    }
}

fn link_shape(link: &HiddenLink) -> Shape {
    let intermediates = intermediate_concepts(link);
    let description = if intermediates.is_empty() {
        format!(
            "{} connection between '{}' and '{}'",
            link.link_type.as_str(),
            link.from_concept,
            link.to_concept
        )
    } else {
        format!(
            "{} connection between '{}' and '{}' through {}",
            link.link_type.as_str(),
            link.from_concept,
            link.to_concept,
            intermediates.join(", ")
        )
    };

    Shape {
        id: format!("link-{}", link.id),
        title: format!("{} <-> {}", link.from_concept, link.to_concept),
        description,
        confidence: link.confidence_score,
        minutes: LINK_MINUTES_PER_HOP.saturating_mul(link.reasoning.hops as u32),
        difficulty: link_difficulty(link.reasoning.hops),
        categories: vec![link.link_type.as_str().to_string()],
        related: intermediates,
        path: link.concepts_on_path().cloned().collect(),
        discovered_at: link.discovered_at,
    }
}

/// Concepts strictly between the endpoints, relation nodes excluded
fn intermediate_concepts(link: &HiddenLink) -> Vec<String> {
    link.concepts_on_path()
        .filter(|c| **c != link.from_concept && **c != link.to_concept)
        .cloned()
        .collect()
}

pub(crate) fn link_difficulty(hops: usize) -> DifficultyLevel {
    match hops {
        0..=2 => DifficultyLevel::Beginner,
        3 => DifficultyLevel::Intermediate,
        _ => DifficultyLevel::Advanced,
    }
}

/// Additive keyword overlap between the item and the profile, clamped
pub(crate) fn user_interest_score(terms: &[String], profile: &UserProfile) -> f64 {
    let matches = |keywords: &[String]| {
        keywords
            .iter()
            .map(|k| normalize(k))
            .filter(|k| !k.is_empty() && terms.iter().any(|t| t.contains(k.as_str())))
            .count() as f64
    };

    let score = matches(&profile.interests) * INTEREST_POINTS
        + matches(&profile.goals) * GOAL_POINTS
        + matches(&profile.focus_areas) * FOCUS_AREA_POINTS
        + matches(&profile.history) * HISTORY_POINTS;
    score.clamp(0.0, 100.0)
}

fn gap_learning_impact(gap: &KnowledgeGap) -> f64 {
    let base = match gap.priority {
        GapPriority::High => 60.0,
        GapPriority::Medium => 40.0,
        GapPriority::Low => 20.0,
    };
    let related = (gap.related_user_concepts.len() as f64 * 10.0).min(30.0);
    // short paths close a gap quickly
    let path = (10.0 - 2.0 * gap.suggested_learning_path.len().saturating_sub(2) as f64).max(0.0);
    (base + related + path).clamp(0.0, 100.0)
}

fn link_learning_impact(link: &HiddenLink) -> f64 {
    let base = match link.link_type {
        LinkType::SuperRelation => 60.0,
        LinkType::Indirect => 50.0,
        LinkType::Direct => 40.0,
    };
    let intermediates = (intermediate_concepts(link).len() as f64 * 5.0).min(20.0);
    let hops = (link.reasoning.hops as f64 * 5.0).min(20.0);
    (base + intermediates + hops).clamp(0.0, 100.0)
}

/// Step function of age
pub(crate) fn recency_score(discovered_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - discovered_at).num_hours();
    match hours {
        h if h <= 1 => 100.0,
        h if h <= 24 => 90.0,
        h if h <= 72 => 80.0,
        h if h <= 24 * 7 => 70.0,
        _ => 50.0,
    }
}

pub(crate) fn difficulty_match(item: DifficultyLevel, target: DifficultyLevel) -> f64 {
    match item.rank().abs_diff(target.rank()) {
        0 => 100.0,
        1 => 60.0,
        _ => 30.0,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{gap, link};
    use super::*;
    use crate::domain::ranking::ResultType;
    use chrono::Duration;

    fn profile() -> UserProfile {
        UserProfile {
            interests: vec!["physics".to_string()],
            goals: vec!["entropy".to_string()],
            level: DifficultyLevel::Beginner,
            ..Default::default()
        }
    }

    #[test]
    fn test_gap_components() {
        let now = Utc::now();
        let g = gap("entropy", &["heat", "entropy"], 62.0, now);
        let result = score_item(
            OriginalData::KnowledgeGap(g),
            &profile(),
            &ScoringWeights::default(),
            now,
        );

        assert_eq!(result.id, "gap-id-entropy");
        assert_eq!(result.result_type, ResultType::KnowledgeGap);
        assert_eq!(result.scores.relevance, 80.0);
        // interest "physics" via category, goal "entropy" via title
        assert_eq!(result.scores.user_interest, 45.0);
        // medium priority 40, one related 10, two-node path 10
        assert_eq!(result.scores.learning_impact, 60.0);
        assert!((result.scores.ontology_strength - 49.6).abs() < 1e-9);
        assert_eq!(result.scores.recency, 100.0);
        assert_eq!(result.scores.difficulty, 100.0);
        assert_eq!(result.estimated_learning_time, 40);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_link_components() {
        let now = Utc::now();
        let l = link(&["heat", "rel:heat->energy", "energy", "rel:energy->work", "work"], 70.0, now);
        let result = score_item(
            OriginalData::HiddenLink(l),
            &UserProfile::default(),
            &ScoringWeights::default(),
            now,
        );

        assert_eq!(result.id, "link-id-heat>rel:heat->energy>energy>rel:energy->work>work");
        assert_eq!(result.title, "heat <-> work");
        assert_eq!(result.related_concepts, vec!["energy"]);
        assert_eq!(result.learning_path, vec!["heat", "energy", "work"]);
        assert_eq!(result.categories, vec!["direct"]);
        assert_eq!(result.difficulty, DifficultyLevel::Advanced);
        assert_eq!(result.estimated_learning_time, 60);
        assert_eq!(result.scores.ontology_strength, 50.0);
        // direct 40, one intermediate 5, four hops capped at 20
        assert_eq!(result.scores.learning_impact, 65.0);
    }

    #[test]
    fn test_unified_score_in_range() {
        let now = Utc::now();
        let weights = ScoringWeights {
            relevance: 5.0,
            ..Default::default()
        };
        let result = score_item(
            OriginalData::KnowledgeGap(gap("x", &["a", "x"], 100.0, now)),
            &profile(),
            &weights,
            now,
        );
        assert!((0.0..=100.0).contains(&result.unified_score));
    }

    #[test]
    fn test_recency_steps() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now), 100.0);
        assert_eq!(recency_score(now - Duration::hours(5), now), 90.0);
        assert_eq!(recency_score(now - Duration::hours(48), now), 80.0);
        assert_eq!(recency_score(now - Duration::days(6), now), 70.0);
        assert_eq!(recency_score(now - Duration::days(30), now), 50.0);
    }

    #[test]
    fn test_difficulty_match() {
        use DifficultyLevel::*;
        assert_eq!(difficulty_match(Beginner, Beginner), 100.0);
        assert_eq!(difficulty_match(Intermediate, Advanced), 60.0);
        assert_eq!(difficulty_match(Beginner, Advanced), 30.0);
    }

    #[test]
    fn test_user_interest_is_clamped() {
        let terms = vec!["a b c d e".to_string()];
        let profile = UserProfile {
            interests: ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        assert_eq!(user_interest_score(&terms, &profile), 100.0);
        assert_eq!(user_interest_score(&terms, &UserProfile::default()), 0.0);
    }

    #[test]
    fn test_comparator_tiebreaks() {
        let now = Utc::now();
        let weights = ScoringWeights::default();
        let older = score_item(
            OriginalData::KnowledgeGap(gap("b", &["a", "b"], 50.0, now - Duration::minutes(10))),
            &UserProfile::default(),
            &weights,
            now,
        );
        let newer = score_item(
            OriginalData::KnowledgeGap(gap("c", &["a", "c"], 50.0, now)),
            &UserProfile::default(),
            &weights,
            now,
        );
        assert_eq!(older.unified_score, newer.unified_score);
        assert_eq!(compare_results(&newer, &older), Ordering::Less);
    }
}
