//! Unified ranking of knowledge gaps and hidden links
//!
//! Runs gap detection and link reasoning concurrently, converts both into
//! [`UnifiedResult`]s scored on six components, then filters, sorts and
//! truncates the merged list.
//!
//! ```text
//! concepts ──┬──► GapDetector ──► KnowledgeGap[] ──┐
//!            │                                     ├──► score ──► filter ──► sort ──► UnifiedResult[]
//!            └──► LinkReasoner ─► HiddenLink[] ────┘
//! ```

mod engine;
mod recommend;
mod scoring;
mod stats;
mod types;

pub use engine::RankingEngine;
pub use recommend::generate_recommendations;
pub use scoring::{compare_results, score_item};
pub use stats::PerformanceStats;
pub use types::{
    ComponentScores, OriginalData, RankingOptions, ResultType, ScoringWeights, UnifiedPriority,
    UnifiedResult, UserProfile,
};
