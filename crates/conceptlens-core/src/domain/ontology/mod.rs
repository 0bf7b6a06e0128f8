//! External ontology enrichment
//!
//! Queries external concept databases (Wikidata, DBpedia) over SPARQL,
//! normalizes and scores the matches, and caches them per concept.
//!
//! ```text
//! concept ──► ExternalOntologyClient ──► cache hit? ──► results
//!                     │ miss
//!                     ▼
//!        ┌────────────┴────────────┐
//!   SparqlProvider (wikidata)  SparqlProvider (dbpedia)   (parallel, isolated)
//!        └────────────┬────────────┘
//!                     ▼
//!        merge by URI, keep best score, sort desc
//! ```

mod client;
mod graph;
mod provider;
mod scoring;
mod sparql;
mod types;

pub use client::{CacheStats, ExternalOntologyClient};
pub use graph::{EdgeRelation, PropertyEdge, PropertyGraph, PropertyNode, PropertyNodeKind, convert_to_property_graph};
pub use provider::{OntologyProvider, SparqlProvider};
pub use scoring::relevance_score;
pub use sparql::{SparqlDialect, aggregate_bindings, build_query, escape_literal, parse_response};
pub use types::{ExternalOntologyResult, OntologySearch};
