//! Knowledge gap detection
//!
//! Compares what a user already knows (their concepts and the context the
//! store holds for them) against the external concept universe, and scores
//! the missing concepts that connect back to known ground.

mod detector;
mod profile;
mod similarity;
mod types;

pub use detector::GapDetector;
pub use profile::UserKnowledgeProfile;
pub use similarity::{ConceptSimilarity, KNOWN_THRESHOLD, LexicalSimilarity, RELATED_THRESHOLD};
pub use types::{GapDetectionConfig, GapPriority, GapScoreBreakdown, KnowledgeGap};
