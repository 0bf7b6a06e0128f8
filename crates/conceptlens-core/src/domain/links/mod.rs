//! Hidden link discovery
//!
//! Multi-hop reasoning over the schema graph: every pair of query concepts
//! is searched forward, backward and bidirectionally for simple paths of
//! bounded length, and each path is scored as a candidate link.

mod reasoner;
mod search;
mod types;

pub use reasoner::LinkReasoner;
pub use search::{FoundPath, backward_paths, bidirectional_paths, forward_paths, search_paths};
pub use types::{
    FALLBACK_CONFIDENCE, HiddenLink, HiddenLinkDetectionOptions, LinkReasoning, LinkSource, LinkType,
    ReasoningMethod,
};
