//! Semantic clustering of relation nodes

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::node::SchemaGraph;

/// Semantic family of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Causal,
    Spatial,
    Temporal,
    Hierarchical,
    Generic,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Causal => "causal",
            Self::Spatial => "spatial",
            Self::Temporal => "temporal",
            Self::Hierarchical => "hierarchical",
            Self::Generic => "generic",
        }
    }

    /// Keywords whose presence in a relation predicate selects this type
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Causal => &["cause", "effect", "leads to", "result", "influence", "because"],
            Self::Spatial => &["location", "located", "near", "region", "place", "spatial"],
            Self::Temporal => &["time", "before", "after", "during", "period", "century", "history"],
            Self::Hierarchical => &["instance of", "subclass", "part of", "type of", "category"],
            Self::Generic => &[],
        }
    }

    /// Strength of the seeded cluster before any query has run
    fn base_strength(&self) -> f64 {
        match self {
            Self::Causal => 0.8,
            Self::Hierarchical => 0.7,
            Self::Temporal => 0.6,
            Self::Spatial => 0.5,
            Self::Generic => 0.0,
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SEEDED: [SemanticType; 4] = [
    SemanticType::Causal,
    SemanticType::Spatial,
    SemanticType::Temporal,
    SemanticType::Hierarchical,
];

/// Relation nodes that share a semantic type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationCluster {
    pub cluster_id: String,
    pub semantic_type: SemanticType,
    pub keywords: Vec<String>,
    /// Relation node ids
    pub relations: Vec<String>,
    /// Share of the query's relations in this cluster, in [0, 1]
    pub strength: f64,
}

impl RelationCluster {
    fn seeded(semantic_type: SemanticType) -> Self {
        Self {
            cluster_id: format!("{}-cluster", semantic_type),
            semantic_type,
            keywords: semantic_type.keywords().iter().map(|k| k.to_string()).collect(),
            relations: Vec::new(),
            strength: semantic_type.base_strength(),
        }
    }
}

/// Summary of one cluster update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterUpdate {
    pub total_relations: usize,
    pub by_type: BTreeMap<SemanticType, usize>,
}

/// Owns the relation clusters
///
/// The clusterer is plain data. Callers that share it across requests wrap
/// it in a lock and serialize updates.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationClusterer {
    clusters: Vec<RelationCluster>,
}

impl Default for RelationClusterer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationClusterer {
    /// Clusterer seeded with the causal, spatial, temporal and hierarchical clusters
    pub fn new() -> Self {
        Self {
            clusters: SEEDED.iter().map(|t| RelationCluster::seeded(*t)).collect(),
        }
    }

    pub fn clusters(&self) -> &[RelationCluster] {
        &self.clusters
    }

    pub fn cluster(&self, semantic_type: SemanticType) -> Option<&RelationCluster> {
        self.clusters.iter().find(|c| c.semantic_type == semantic_type)
    }

    /// Classify a relation predicate by whole-word keyword match
    pub fn classify(&self, predicate: &str) -> SemanticType {
        let tokens = words(predicate);
        SEEDED
            .iter()
            .copied()
            .find(|t| t.keywords().iter().any(|k| contains_phrase(&tokens, &words(k))))
            .unwrap_or(SemanticType::Generic)
    }

    /// Re-cluster the relation nodes of a schema
    ///
    /// Each semantic type present in the schema gets its cluster replaced
    /// by one built from this schema alone. Types absent from the schema
    /// keep their previous cluster.
    pub fn update_relation_clusters(&mut self, schema: &SchemaGraph) -> ClusterUpdate {
        let mut grouped: BTreeMap<SemanticType, Vec<String>> = BTreeMap::new();
        for node in schema.relation_nodes() {
            grouped
                .entry(self.classify(node.predicate.as_deref().unwrap_or(&node.label)))
                .or_default()
                .push(node.id.clone());
        }

        let total: usize = grouped.values().map(Vec::len).sum();
        let mut update = ClusterUpdate {
            total_relations: total,
            by_type: BTreeMap::new(),
        };

        for (semantic_type, relations) in grouped {
            update.by_type.insert(semantic_type, relations.len());
            let cluster = RelationCluster {
                cluster_id: format!("{}-cluster", semantic_type),
                semantic_type,
                keywords: semantic_type.keywords().iter().map(|k| k.to_string()).collect(),
                strength: relations.len() as f64 / total as f64,
                relations,
            };
            match self
                .clusters
                .iter_mut()
                .find(|c| c.semantic_type == semantic_type)
            {
                Some(existing) => *existing = cluster,
                None => self.clusters.push(cluster),
            }
        }

        debug!(
            relations = total,
            clusters = self.clusters.len(),
            "Relation clusters updated"
        );
        update
    }

    /// Ids of relations belonging to a non-generic cluster
    pub fn semantic_relations(&self) -> HashSet<&str> {
        self.clusters
            .iter()
            .filter(|c| c.semantic_type != SemanticType::Generic)
            .flat_map(|c| c.relations.iter().map(String::as_str))
            .collect()
    }

    /// The first non-generic cluster containing any node of the path
    pub fn cluster_touched_by(&self, path: &[String]) -> Option<&RelationCluster> {
        self.clusters
            .iter()
            .filter(|c| c.semantic_type != SemanticType::Generic)
            .find(|c| path.iter().any(|node| c.relations.contains(node)))
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True when `phrase` occurs as consecutive whole words of `words`
fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && words.windows(phrase.len()).any(|w| w == phrase)
}
