//! Schema graph nodes

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Whether a node is a concept or a synthesized relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Relation,
}

/// Where the evidence for a node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOrigin {
    /// The user's own notes and books
    Internal,
    /// An external ontology
    External,
    /// Both
    Hybrid,
}

impl NodeOrigin {
    /// Combine two origins
    pub fn merge(self, other: NodeOrigin) -> NodeOrigin {
        if self == other { self } else { NodeOrigin::Hybrid }
    }
}

/// A node in the schema graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Normalized concept, or `rel:<source>-><target>` for relations
    pub id: String,
    /// Human-readable label; for relations "<source> <relation> <target>"
    pub label: String,
    /// Relation predicate alone, e.g. "instance of"; `None` for entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    pub kind: NodeKind,
    /// Adjacent node ids
    pub neighbors: BTreeSet<String>,
    /// Internal evidence count (notes + excerpts)
    pub weight: f64,
    pub origin: NodeOrigin,
}

impl SchemaNode {
    pub fn entity(id: impl Into<String>, origin: NodeOrigin) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            predicate: None,
            kind: NodeKind::Entity,
            neighbors: BTreeSet::new(),
            weight: 0.0,
            origin,
        }
    }

    pub fn relation(
        id: impl Into<String>,
        label: impl Into<String>,
        predicate: impl Into<String>,
        origin: NodeOrigin,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            predicate: Some(predicate.into()),
            kind: NodeKind::Relation,
            neighbors: BTreeSet::new(),
            weight: 0.0,
            origin,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.kind == NodeKind::Relation
    }
}

/// Id of the relation node synthesized for a (source, target) pair
pub fn relation_node_id(source: &str, target: &str) -> String {
    format!("rel:{}->{}", source, target)
}

/// Graph of concept and relation nodes keyed by id
///
/// Edges are stored on both endpoints so traversal can go either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaGraph {
    nodes: BTreeMap<String, SchemaNode>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SchemaNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    pub fn relation_nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values().filter(|n| n.is_relation())
    }

    /// Neighbor ids of a node, empty when the node is unknown
    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &String> {
        self.nodes.get(id).into_iter().flat_map(|n| n.neighbors.iter())
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.nodes
            .get(a)
            .map(|n| n.neighbors.contains(b))
            .unwrap_or(false)
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.neighbors.len()).sum::<usize>() / 2
    }

    /// Create an entity node or merge origin into the existing one
    pub fn upsert_entity(&mut self, id: &str, origin: NodeOrigin) -> &mut SchemaNode {
        let node = self
            .nodes
            .entry(id.to_string())
            .or_insert_with(|| SchemaNode::entity(id, origin));
        node.origin = node.origin.merge(origin);
        node
    }

    /// Add an undirected edge; self-loops and unknown endpoints are ignored
    pub fn connect(&mut self, a: &str, b: &str) {
        if a == b || !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(a) {
            node.neighbors.insert(b.to_string());
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.neighbors.insert(a.to_string());
        }
    }

    /// Link two entities directly and through a synthesized relation node
    pub fn relate(&mut self, source: &str, relation: &str, target: &str, origin: NodeOrigin) {
        if source == target {
            return;
        }
        self.upsert_entity(source, origin);
        self.upsert_entity(target, origin);
        self.connect(source, target);

        let rel_id = relation_node_id(source, target);
        let label = format!("{} {} {}", source, relation, target);
        let node = self
            .nodes
            .entry(rel_id.clone())
            .or_insert_with(|| SchemaNode::relation(rel_id.clone(), label, relation, origin));
        node.origin = node.origin.merge(origin);

        self.connect(&rel_id, source);
        self.connect(&rel_id, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_merge() {
        assert_eq!(NodeOrigin::Internal.merge(NodeOrigin::Internal), NodeOrigin::Internal);
        assert_eq!(NodeOrigin::Internal.merge(NodeOrigin::External), NodeOrigin::Hybrid);
        assert_eq!(NodeOrigin::Hybrid.merge(NodeOrigin::External), NodeOrigin::Hybrid);
    }

    #[test]
    fn test_relate_creates_relation_node() {
        let mut graph = SchemaGraph::new();
        graph.relate("entropy", "related to", "heat", NodeOrigin::Internal);

        assert_eq!(graph.len(), 3);
        assert!(graph.are_adjacent("entropy", "heat"));
        let rel = graph.get(&relation_node_id("entropy", "heat")).unwrap();
        assert!(rel.is_relation());
        assert_eq!(rel.label, "entropy related to heat");
        assert_eq!(rel.predicate.as_deref(), Some("related to"));
        assert!(rel.neighbors.contains("entropy"));
        assert!(rel.neighbors.contains("heat"));
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_edges_are_symmetric() {
        let mut graph = SchemaGraph::new();
        graph.relate("a", "related to", "b", NodeOrigin::Internal);
        for node in graph.nodes() {
            for neighbor in &node.neighbors {
                assert!(graph.are_adjacent(neighbor, &node.id));
            }
        }
    }

    #[test]
    fn test_self_relation_ignored() {
        let mut graph = SchemaGraph::new();
        graph.relate("a", "related to", "a", NodeOrigin::Internal);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_upsert_merges_origin() {
        let mut graph = SchemaGraph::new();
        graph.upsert_entity("a", NodeOrigin::Internal);
        graph.upsert_entity("a", NodeOrigin::External);
        assert_eq!(graph.get("a").unwrap().origin, NodeOrigin::Hybrid);
        assert_eq!(graph.neighbors("missing").count(), 0);
    }
}
