//! Templated recommendations for ranked results

use crate::domain::links::LinkType;

use super::types::{OriginalData, UnifiedResult, UserProfile};

/// Build the recommendation strings for one result
pub fn generate_recommendations(result: &UnifiedResult, profile: &UserProfile) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(budget) = profile.time_budget_minutes {
        if result.estimated_learning_time > budget {
            out.push(format!(
                "Needs about {} minutes, more than your {}-minute budget; split it over several sessions",
                result.estimated_learning_time, budget
            ));
        }
    }

    let target = profile.target_difficulty();
    if result.difficulty.rank() > target.rank() {
        out.push(format!(
            "Rated {} while you prefer {}; review the prerequisites first",
            result.difficulty, target
        ));
    } else if result.difficulty.rank() < target.rank() {
        out.push(format!(
            "Rated {} while you prefer {}; good for a quick review",
            result.difficulty, target
        ));
    }

    if result.learning_path.len() >= 2 {
        out.push(format!("Suggested path: {}", result.learning_path.join(" -> ")));
    }

    match &result.original_data {
        OriginalData::KnowledgeGap(gap) => {
            if !result.related_concepts.is_empty() {
                out.push(format!("Builds on: {}", result.related_concepts.join(", ")));
            }
            out.push(format!(
                "Add notes on '{}' to close this gap",
                gap.missing_concept
            ));
        }
        OriginalData::HiddenLink(link) => {
            if !result.related_concepts.is_empty() {
                out.push(format!("Connects through: {}", result.related_concepts.join(", ")));
            }
            out.push(match link.link_type {
                LinkType::SuperRelation => format!(
                    "'{}' and '{}' share a broader relation pattern; look for it in other topics",
                    link.from_concept, link.to_concept
                ),
                LinkType::Indirect => format!(
                    "Trace the chain from '{}' to '{}' one step at a time",
                    link.from_concept, link.to_concept
                ),
                LinkType::Direct => format!(
                    "Compare '{}' and '{}' side by side",
                    link.from_concept, link.to_concept
                ),
            });
        }
    }

    out
}
