//! What a user knows, derived from their concepts and stored context

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::concept::normalize;
use crate::domain::context::ContextBundle;

/// Snapshot of a user's knowledge for one detection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKnowledgeProfile {
    /// Normalized user concepts in input order
    pub concepts: Vec<String>,
    /// Evidence count per concept, at least 1
    pub frequency: BTreeMap<String, usize>,
    /// Concepts the user's notes and books already touch
    pub related_concepts: BTreeSet<String>,
    /// Tag and category counts across the user's material
    pub tag_histogram: BTreeMap<String, usize>,
    /// Ontology categories of each user concept
    pub concept_categories: BTreeMap<String, BTreeSet<String>>,
}

impl UserKnowledgeProfile {
    /// Build a profile from the context bundles of the user's concepts
    ///
    /// `bundles` pairs each concept with its bundle; a failed lookup is
    /// passed as `None` and contributes only the concept itself.
    pub fn from_bundles<'a>(
        bundles: impl IntoIterator<Item = (&'a str, Option<&'a ContextBundle>)>,
    ) -> Self {
        let mut profile = Self::default();
        for (concept, bundle) in bundles {
            let concept = normalize(concept);
            if concept.is_empty() || profile.frequency.contains_key(&concept) {
                continue;
            }
            profile.concepts.push(concept.clone());

            let evidence = bundle.map(|b| b.evidence_count()).unwrap_or(0);
            profile.frequency.insert(concept.clone(), evidence.max(1));

            if let Some(bundle) = bundle {
                profile
                    .related_concepts
                    .extend(bundle.related_concepts.iter().map(|c| normalize(c)));
                for tag in bundle.tags() {
                    *profile.tag_histogram.entry(tag).or_insert(0) += 1;
                }
            }
        }
        for concept in &profile.concepts {
            profile.related_concepts.remove(concept);
        }
        profile
    }

    /// Record ontology categories of a user concept
    pub fn add_categories<'a>(&mut self, concept: &str, categories: impl IntoIterator<Item = &'a String>) {
        let concept = normalize(concept);
        for category in categories {
            let category = normalize(category);
            if category.is_empty() {
                continue;
            }
            let inserted = self
                .concept_categories
                .entry(concept.clone())
                .or_default()
                .insert(category.clone());
            if inserted {
                *self.tag_histogram.entry(category).or_insert(0) += 1;
            }
        }
    }

    /// Interest weight per tag or category: count / total
    pub fn interest_weights(&self) -> BTreeMap<String, f64> {
        let total: usize = self.tag_histogram.values().sum();
        if total == 0 {
            return BTreeMap::new();
        }
        self.tag_histogram
            .iter()
            .map(|(tag, count)| (tag.clone(), *count as f64 / total as f64))
            .collect()
    }

    pub fn interest_weight(&self, category: &str) -> f64 {
        let total: usize = self.tag_histogram.values().sum();
        if total == 0 {
            return 0.0;
        }
        self.tag_histogram
            .get(&normalize(category))
            .map(|count| *count as f64 / total as f64)
            .unwrap_or(0.0)
    }

    /// User concepts sharing at least one category, most shared first
    pub fn concepts_sharing(&self, categories: &[String]) -> Vec<String> {
        let wanted: BTreeSet<String> = categories.iter().map(|c| normalize(c)).collect();
        let mut sharing: Vec<(usize, usize, &String)> = self
            .concepts
            .iter()
            .enumerate()
            .filter_map(|(idx, concept)| {
                let shared = self
                    .concept_categories
                    .get(concept)
                    .map(|cats| cats.intersection(&wanted).count())
                    .unwrap_or(0);
                (shared > 0).then_some((shared, idx, concept))
            })
            .collect();
        sharing.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        sharing.into_iter().map(|(_, _, c)| c.clone()).collect()
    }

    pub fn touches(&self, concept: &str) -> bool {
        self.related_concepts.contains(&normalize(concept))
    }
}
