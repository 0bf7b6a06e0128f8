//! Domain layer
//!
//! Contains the concept reasoning pipeline, from ontology lookups to the
//! unified ranking.

pub mod concept;
pub mod context;
pub mod gaps;
pub mod links;
pub mod ontology;
pub mod ranking;
pub mod schema;
