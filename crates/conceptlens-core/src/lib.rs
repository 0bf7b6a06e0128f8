//! ConceptLens Core Library
//!
//! This crate provides the core functionality for ConceptLens, including:
//! - External ontology enrichment (Wikidata and DBpedia over SPARQL)
//! - Per-query schema graphs built from user context and ontology data
//! - Knowledge gap detection
//! - Multi-hop hidden link reasoning with relation clusters
//! - Unified ranking of gaps and links against a user profile

pub mod config;
pub mod domain;
pub mod error;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::context::{ContextRetriever, InMemoryContextStore};
    pub use crate::domain::gaps::{GapDetectionConfig, GapDetector, KnowledgeGap};
    pub use crate::domain::links::{HiddenLink, HiddenLinkDetectionOptions, LinkReasoner};
    pub use crate::domain::ontology::{ExternalOntologyClient, ExternalOntologyResult};
    pub use crate::domain::ranking::{
        RankingEngine, RankingOptions, ScoringWeights, UnifiedResult, UserProfile,
    };
    pub use crate::error::{Error, Result};
}
