//! Hidden link types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schema::NodeOrigin;

/// Confidence of links produced when reasoning could not run
pub const FALLBACK_CONFIDENCE: f64 = 30.0;

/// Options for hidden link detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenLinkDetectionOptions {
    /// Longest path searched, in edges
    pub max_hops: usize,
    pub min_confidence_score: f64,
    pub max_links_to_return: usize,
    /// Use relation clusters as a confidence signal
    pub enable_super_relations: bool,
    /// Search pairs on a worker pool instead of one by one
    pub enable_parallel_processing: bool,
    /// Paths enumerated per pair and per search direction
    pub max_paths_per_pair: usize,
    pub worker_count: usize,
}

impl Default for HiddenLinkDetectionOptions {
    fn default() -> Self {
        Self {
            max_hops: 3,
            min_confidence_score: 60.0,
            max_links_to_return: 20,
            enable_super_relations: true,
            enable_parallel_processing: true,
            max_paths_per_pair: 64,
            worker_count: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    Direct,
    Indirect,
    SuperRelation,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Indirect => "indirect",
            Self::SuperRelation => "super-relation",
        }
    }
}

/// Search strategy that found a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMethod {
    Forward,
    Backward,
    Bidirectional,
}

impl ReasoningMethod {
    /// Confidence bonus for paths found by this method
    pub fn bonus(&self) -> f64 {
        match self {
            Self::Bidirectional => 10.0,
            Self::Forward => 5.0,
            Self::Backward => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Bidirectional => "bidirectional",
        }
    }
}

/// Where the evidence for a link came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSource {
    Internal,
    External,
    Hybrid,
}

impl From<NodeOrigin> for LinkSource {
    fn from(origin: NodeOrigin) -> Self {
        match origin {
            NodeOrigin::Internal => Self::Internal,
            NodeOrigin::External => Self::External,
            NodeOrigin::Hybrid => Self::Hybrid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReasoning {
    pub method: ReasoningMethod,
    pub hops: usize,
    pub intermediate_nodes: Vec<String>,
    pub evidence: Vec<String>,
}

/// A non-obvious connection between two query concepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenLink {
    pub id: String,
    pub from_concept: String,
    pub to_concept: String,
    pub link_type: LinkType,
    /// Node ids from `from_concept` to `to_concept`
    pub connection_path: Vec<String>,
    pub confidence_score: f64,
    /// `hops == connection_path.len() - 1`
    pub reasoning: LinkReasoning,
    pub source: LinkSource,
    pub strength: f64,
    pub discovered_at: DateTime<Utc>,
}

impl HiddenLink {
    /// Concepts on the path that are not relation nodes, endpoints included
    pub fn concepts_on_path(&self) -> impl Iterator<Item = &String> {
        self.connection_path.iter().filter(|n| !n.starts_with("rel:"))
    }
}

/// 0.8^(hops-1) / ln(path_len + 1)
pub fn link_strength(hops: usize, path_len: usize) -> f64 {
    let decay = 0.8_f64.powi(hops.saturating_sub(1) as i32);
    decay / ((path_len + 1) as f64).ln()
}
