//! Property graph export of ontology results

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::concept::normalize;

use super::types::ExternalOntologyResult;

/// Kind of node in the exported property graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyNodeKind {
    /// A matched ontology concept
    Concept,
    /// A concept related to a matched one
    RelatedConcept,
    /// A category or superclass
    Category,
}

/// Edge label in the exported property graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeRelation {
    RelatedTo,
    BelongsTo,
}

impl EdgeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatedTo => "RELATED_TO",
            Self::BelongsTo => "BELONGS_TO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyNode {
    pub id: String,
    pub label: String,
    pub kind: PropertyNodeKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEdge {
    pub source: String,
    pub target: String,
    pub relation: EdgeRelation,
}

/// Nodes and edges ready for loading into a property-graph store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGraph {
    pub nodes: Vec<PropertyNode>,
    pub edges: Vec<PropertyEdge>,
}

impl PropertyGraph {
    pub fn node(&self, id: &str) -> Option<&PropertyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of(&self, relation: EdgeRelation) -> impl Iterator<Item = &PropertyEdge> {
        self.edges.iter().filter(move |e| e.relation == relation)
    }
}

fn related_id(label: &str) -> String {
    format!("concept:{}", normalize(label))
}

fn category_id(label: &str) -> String {
    format!("category:{}", normalize(label))
}

/// Convert ontology results into a property graph
///
/// Emits one node per result, per related concept and per category, linked
/// with `RELATED_TO` and `BELONGS_TO` edges. Shared related concepts and
/// categories become a single node.
pub fn convert_to_property_graph(results: &[ExternalOntologyResult]) -> PropertyGraph {
    let mut graph = PropertyGraph::default();
    let mut seen_nodes: HashSet<String> = HashSet::new();
    let mut seen_edges: HashSet<(String, String, EdgeRelation)> = HashSet::new();

    let mut add_edge = |graph: &mut PropertyGraph, source: &str, target: &str, relation| {
        if seen_edges.insert((source.to_string(), target.to_string(), relation)) {
            graph.edges.push(PropertyEdge {
                source: source.to_string(),
                target: target.to_string(),
                relation,
            });
        }
    };

    for result in results {
        if seen_nodes.insert(result.uri.clone()) {
            let mut properties = BTreeMap::new();
            properties.insert(
                "relevanceScore".to_string(),
                serde_json::json!(result.relevance_score),
            );
            properties.insert("source".to_string(), serde_json::json!(result.source));
            if let Some(description) = &result.description {
                properties.insert("description".to_string(), serde_json::json!(description));
            }
            graph.nodes.push(PropertyNode {
                id: result.uri.clone(),
                label: result.label.clone(),
                kind: PropertyNodeKind::Concept,
                properties,
            });
        }

        for related in &result.related_concepts {
            let id = related_id(related);
            if seen_nodes.insert(id.clone()) {
                graph.nodes.push(PropertyNode {
                    id: id.clone(),
                    label: related.clone(),
                    kind: PropertyNodeKind::RelatedConcept,
                    properties: BTreeMap::new(),
                });
            }
            add_edge(&mut graph, &result.uri, &id, EdgeRelation::RelatedTo);
        }

        for category in &result.categories {
            let id = category_id(category);
            if seen_nodes.insert(id.clone()) {
                graph.nodes.push(PropertyNode {
                    id: id.clone(),
                    label: category.clone(),
                    kind: PropertyNodeKind::Category,
                    properties: BTreeMap::new(),
                });
            }
            add_edge(&mut graph, &result.uri, &id, EdgeRelation::BelongsTo);
        }
    }

    graph
}
