//! Ranking engine
//!
//! Composition root for one ranking pipeline. Owns the gap detector and the
//! link reasoner (and through it the relation clusters), runs both per
//! request and merges their output on one scale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::concept::{CallGuard, normalize_all};
use crate::domain::context::ContextRetriever;
use crate::domain::gaps::{GapDetectionConfig, GapDetector};
use crate::domain::links::{HiddenLinkDetectionOptions, LinkReasoner};
use crate::domain::ontology::ExternalOntologyClient;
use crate::domain::schema::SchemaGraphBuilder;
use crate::error::Result;

use super::recommend::generate_recommendations;
use super::scoring::{compare_results, score_item};
use super::stats::PerformanceStats;
use super::types::{OriginalData, RankingOptions, ScoringWeights, UnifiedResult, UserProfile};

#[derive(Debug, Clone)]
pub struct RankingEngine {
    gaps: GapDetector,
    links: LinkReasoner,
    gap_config: GapDetectionConfig,
    link_options: HiddenLinkDetectionOptions,
}

impl RankingEngine {
    pub fn new(gaps: GapDetector, links: LinkReasoner) -> Self {
        Self {
            gaps,
            links,
            gap_config: GapDetectionConfig::default(),
            link_options: HiddenLinkDetectionOptions::default(),
        }
    }

    /// Wire a full pipeline from configuration
    ///
    /// Every external call made by the engine observes `cancel`.
    pub fn from_config(
        config: &Config,
        retriever: Arc<dyn ContextRetriever>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let ontology_guard =
            CallGuard::new(Duration::from_secs(config.ontology.timeout_secs)).with_token(cancel.clone());
        let context_guard = CallGuard::new(Duration::from_secs(config.schema.context_timeout_secs))
            .with_token(cancel.clone());

        let ontology = ExternalOntologyClient::from_config(&config.ontology)?.with_guard(ontology_guard);
        let builder = SchemaGraphBuilder::new(retriever.clone(), ontology.clone(), &config.schema)
            .with_guard(context_guard.clone());

        let gaps = GapDetector::new(retriever, ontology).with_guard(context_guard);
        let links = LinkReasoner::new(builder).with_cancellation(cancel);

        Ok(Self::new(gaps, links)
            .with_gap_config(config.gaps.clone())
            .with_link_options(config.links.clone()))
    }

    pub fn with_gap_config(mut self, config: GapDetectionConfig) -> Self {
        self.gap_config = config;
        self
    }

    pub fn with_link_options(mut self, options: HiddenLinkDetectionOptions) -> Self {
        self.link_options = options;
        self
    }

    pub fn gap_detector(&self) -> &GapDetector {
        &self.gaps
    }

    pub fn link_reasoner(&self) -> &LinkReasoner {
        &self.links
    }

    /// Rank knowledge gaps and hidden links for a concept set
    ///
    /// Gap detection and link reasoning run concurrently. Either failing
    /// contributes nothing, so the result is always a well-formed list.
    pub async fn generate_unified_ranking(
        &self,
        concepts: &[String],
        profile: &UserProfile,
        options: &RankingOptions,
        weights: Option<&ScoringWeights>,
    ) -> Vec<UnifiedResult> {
        let concepts = normalize_all(concepts);
        if concepts.is_empty() {
            return Vec::new();
        }
        let weights = weights.copied().unwrap_or_default();

        let mut gap_config = self.gap_config.clone();
        if let Some(preferred) = profile.preferred_difficulty {
            gap_config.difficulty_preference = preferred;
        }

        info!(concepts = concepts.len(), "Generating unified ranking");

        let (gaps, links) = tokio::join!(
            self.gaps.detect_knowledge_gaps(&concepts, &gap_config),
            self.links.detect_hidden_links(&concepts, &self.link_options),
        );

        let gaps = gaps.unwrap_or_else(|e| {
            warn!(error = %e, "Gap detection failed, ranking without gaps");
            Vec::new()
        });
        let links = links.unwrap_or_else(|e| {
            warn!(error = %e, "Link reasoning failed, ranking without links");
            Vec::new()
        });
        debug!(gaps = gaps.len(), links = links.len(), "Detection finished");

        let now = Utc::now();
        let items = gaps
            .into_iter()
            .map(OriginalData::KnowledgeGap)
            .chain(links.into_iter().map(OriginalData::HiddenLink))
            .map(|data| score_item(data, profile, &weights, now))
            .collect();

        let ranked = finalize(items, profile, options);
        info!(results = ranked.len(), "Unified ranking ready");
        ranked
    }

    /// Rank only `new_concepts` and merge the results into `existing`
    ///
    /// Results are unioned by id, a recomputed result replacing the old
    /// one, then re-sorted and filtered like a fresh ranking.
    pub async fn update_real_time_ranking(
        &self,
        existing: &[UnifiedResult],
        new_concepts: &[String],
        profile: &UserProfile,
        options: &RankingOptions,
        weights: Option<&ScoringWeights>,
    ) -> Vec<UnifiedResult> {
        let fresh = self
            .generate_unified_ranking(new_concepts, profile, options, weights)
            .await;
        let fresh_count = fresh.len();

        let mut by_id: HashMap<String, UnifiedResult> = existing
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        for result in fresh {
            by_id.insert(result.id.clone(), result);
        }

        debug!(
            existing = existing.len(),
            fresh = fresh_count,
            merged = by_id.len(),
            "Merged real-time ranking"
        );
        finalize(by_id.into_values().collect(), profile, options)
    }

    pub fn generate_performance_stats(&self, results: &[UnifiedResult]) -> PerformanceStats {
        PerformanceStats::from_results(results)
    }
}

/// Filter, sort, apply the score floor, truncate and attach recommendations
fn finalize(
    items: Vec<UnifiedResult>,
    profile: &UserProfile,
    options: &RankingOptions,
) -> Vec<UnifiedResult> {
    let mut results: Vec<UnifiedResult> = items
        .into_iter()
        .filter(|r| options.accepts(r))
        .collect();
    results.sort_by(compare_results);
    results.retain(|r| r.unified_score >= options.min_unified_score);
    results.truncate(options.max_results);

    for result in &mut results {
        result.recommendations = if options.include_recommendations {
            generate_recommendations(result, profile)
        } else {
            Vec::new()
        };
    }
    results
}
