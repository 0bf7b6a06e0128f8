//! Per-query schema graph
//!
//! Merges internal context and external ontology neighbors into a graph of
//! entity and relation nodes that the link reasoner searches. Relation
//! nodes are also grouped into semantic clusters used as a confidence
//! signal.

mod builder;
mod cluster;
mod node;

pub use builder::{SchemaBuild, SchemaDiagnostics, SchemaGraphBuilder};
pub use cluster::{ClusterUpdate, RelationCluster, RelationClusterer, SemanticType};
pub use node::{NodeKind, NodeOrigin, SchemaGraph, SchemaNode, relation_node_id};
