//! Ontology result types

use serde::{Deserialize, Serialize};

/// A concept matched in an external ontology
///
/// Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalOntologyResult {
    /// Identifier of the concept in the ontology
    pub uri: String,
    /// Preferred label
    pub label: String,
    /// Description in the first matching configured language
    pub description: Option<String>,
    /// Labels of categories / superclasses (one hop)
    pub categories: Vec<String>,
    /// Labels of related concepts (one hop)
    pub related_concepts: Vec<String>,
    /// Match quality against the query concept (0 to 100)
    pub relevance_score: f64,
    /// Name of the provider that produced the result
    pub source: String,
}

impl ExternalOntologyResult {
    pub fn new(uri: impl Into<String>, label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            description: None,
            categories: Vec::new(),
            related_concepts: Vec::new(),
            relevance_score: 0.0,
            source: source.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related_concepts = related;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.relevance_score = score.clamp(0.0, 100.0);
        self
    }
}

/// Outcome of one ontology lookup, with provider diagnostics
#[derive(Debug, Clone, Default)]
pub struct OntologySearch {
    /// Normalized query concept
    pub concept: String,
    /// Merged results sorted by relevance, descending
    pub results: Vec<ExternalOntologyResult>,
    /// Number of providers queried (0 on cache hit)
    pub providers_attempted: usize,
    /// Number of providers that failed
    pub providers_failed: usize,
    /// Whether the results were served from cache
    pub from_cache: bool,
}

impl OntologySearch {
    /// True when every queried provider failed
    pub fn all_providers_failed(&self) -> bool {
        self.providers_attempted > 0 && self.providers_failed == self.providers_attempted
    }
}
