//! Gap detection pipeline

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::concept::{CallGuard, DifficultyLevel, deterministic_id, normalize, normalize_all};
use crate::domain::context::ContextRetriever;
use crate::domain::ontology::{ExternalOntologyClient, ExternalOntologyResult};
use crate::error::{Error, Result};

use super::profile::UserKnowledgeProfile;
use super::similarity::{ConceptSimilarity, LexicalSimilarity};
use super::types::{GapDetectionConfig, GapPriority, GapScoreBreakdown, KnowledgeGap, difficulty_for_path};

/// Concepts searched concurrently per batch
const CANDIDATE_BATCH_SIZE: usize = 3;

/// Related concepts of a result become candidates at this share of its score
const DERIVED_CANDIDATE_DISCOUNT: f64 = 0.8;

/// An external concept that might be a gap
#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    categories: Vec<String>,
    related: Vec<String>,
    relevance: f64,
    source: String,
}

impl Candidate {
    fn from_result(result: &ExternalOntologyResult) -> Self {
        Self {
            label: normalize(&result.label),
            categories: normalize_all(&result.categories),
            related: normalize_all(&result.related_concepts),
            relevance: result.relevance_score,
            source: result.source.clone(),
        }
    }

    /// A related concept of a result, inheriting its categories
    fn derived(related: &str, parent: &ExternalOntologyResult) -> Self {
        Self {
            label: normalize(related),
            categories: normalize_all(&parent.categories),
            related: vec![normalize(&parent.label)],
            relevance: (parent.relevance_score * DERIVED_CANDIDATE_DISCOUNT * 100.0).round() / 100.0,
            source: parent.source.clone(),
        }
    }
}

/// Finds concepts a user is missing
///
/// Pulls the user's context and the ontology neighborhood of their
/// concepts, keeps the external concepts that are unknown but connect
/// to something known, and scores them.
#[derive(Clone)]
pub struct GapDetector {
    retriever: Arc<dyn ContextRetriever>,
    ontology: ExternalOntologyClient,
    similarity: Arc<dyn ConceptSimilarity>,
    guard: CallGuard,
}

impl std::fmt::Debug for GapDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapDetector")
            .field("ontology", &self.ontology)
            .finish()
    }
}

impl GapDetector {
    pub fn new(retriever: Arc<dyn ContextRetriever>, ontology: ExternalOntologyClient) -> Self {
        Self {
            retriever,
            ontology,
            similarity: Arc::new(LexicalSimilarity),
            guard: CallGuard::default(),
        }
    }

    /// Replace the "already known" classifier
    pub fn with_similarity(mut self, similarity: Arc<dyn ConceptSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Share a cancellation token, keeping the current timeout
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.guard = self.guard.with_token(token);
        self
    }

    /// Detect knowledge gaps for a set of user concepts
    ///
    /// Failing context lookups and providers are skipped. The only error is
    /// cancellation.
    pub async fn detect_knowledge_gaps(
        &self,
        user_concepts: &[String],
        config: &GapDetectionConfig,
    ) -> Result<Vec<KnowledgeGap>> {
        let concepts = normalize_all(user_concepts);
        if concepts.is_empty() {
            return Ok(Vec::new());
        }
        if self.guard.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut profile = self.build_profile(&concepts).await;
        let candidates = self.gather_candidates(&concepts, &mut profile).await?;
        let candidate_count = candidates.len();

        let mut gaps: Vec<KnowledgeGap> = candidates
            .into_values()
            .filter_map(|candidate| self.evaluate(candidate, &profile, config))
            .filter(|gap| gap.gap_score >= config.min_gap_score)
            .collect();

        gaps.sort_by(|a, b| {
            b.gap_score
                .partial_cmp(&a.gap_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.missing_concept.cmp(&b.missing_concept))
        });
        gaps.truncate(config.max_gaps_to_return);

        info!(
            concepts = concepts.len(),
            candidates = candidate_count,
            gaps = gaps.len(),
            "Knowledge gap detection completed"
        );
        Ok(gaps)
    }

    async fn build_profile(&self, concepts: &[String]) -> UserKnowledgeProfile {
        let lookups = concepts
            .iter()
            .map(|concept| self.guard.run(self.retriever.get_context_bundle(concept)));
        let bundles: Vec<_> = join_all(lookups)
            .await
            .into_iter()
            .zip(concepts)
            .map(|(outcome, concept)| match outcome {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    warn!(concept = %concept, error = %e, "Context retrieval failed, profiling without it");
                    None
                }
            })
            .collect();

        UserKnowledgeProfile::from_bundles(
            concepts
                .iter()
                .map(String::as_str)
                .zip(bundles.iter().map(Option::as_ref)),
        )
    }

    /// Search the ontology in bounded batches and de-dup candidates by label
    async fn gather_candidates(
        &self,
        concepts: &[String],
        profile: &mut UserKnowledgeProfile,
    ) -> Result<BTreeMap<String, Candidate>> {
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

        for batch in concepts.chunks(CANDIDATE_BATCH_SIZE) {
            if self.guard.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let searches = join_all(batch.iter().map(|c| self.ontology.search_concept_detailed(c))).await;
            for (concept, search) in batch.iter().zip(searches) {
                if search.all_providers_failed() {
                    debug!(concept = %concept, "No ontology provider answered, skipping");
                    continue;
                }
                for result in &search.results {
                    if self.similarity.is_known(concept, &result.label) {
                        profile.add_categories(concept, &result.categories);
                    }
                    offer(&mut candidates, Candidate::from_result(result));
                    for related in &result.related_concepts {
                        offer(&mut candidates, Candidate::derived(related, result));
                    }
                }
            }
        }

        Ok(candidates)
    }

    /// Whether the user already knows a concept
    ///
    /// Known means similarity above the known threshold to one of the
    /// user's concepts. On top of that, concepts the user's own notes and
    /// excerpts already relate to (`profile.touches`) count as known too,
    /// so the context store can suppress gaps the user has written about.
    fn knows(&self, profile: &UserKnowledgeProfile, concept: &str) -> bool {
        profile
            .concepts
            .iter()
            .any(|known| self.similarity.is_known(known, concept))
            || profile.touches(concept)
    }

    /// Turn a candidate into a gap, or drop it
    fn evaluate(
        &self,
        candidate: Candidate,
        profile: &UserKnowledgeProfile,
        config: &GapDetectionConfig,
    ) -> Option<KnowledgeGap> {
        if candidate.label.is_empty() || self.knows(profile, &candidate.label) {
            return None;
        }

        let mut related: Vec<(f64, usize, &String)> = profile
            .concepts
            .iter()
            .enumerate()
            .filter_map(|(idx, known)| {
                let s = self.similarity.similarity(known, &candidate.label);
                self.similarity
                    .is_related(known, &candidate.label)
                    .then_some((s, idx, known))
            })
            .collect();
        related.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        let mut related_user_concepts: Vec<String> = related.into_iter().map(|(_, _, c)| c.clone()).collect();

        if related_user_concepts.is_empty() {
            related_user_concepts = profile.concepts_sharing(&candidate.categories);
        }
        let start = related_user_concepts.first()?.clone();

        let path = self.learning_path(&start, &candidate, profile, config.max_learning_path_length);
        if path.len() < 2 || path.len() > config.max_learning_path_length {
            return None;
        }

        let breakdown = score(
            related_user_concepts.len(),
            &candidate.categories,
            path.len(),
            profile,
            config.difficulty_preference,
        );
        let gap_score = breakdown.total();

        Some(KnowledgeGap {
            id: deterministic_id("gap", &candidate.label),
            estimated_learning_time: estimated_minutes(path.len()),
            missing_concept: candidate.label,
            related_user_concepts,
            suggested_learning_path: path,
            gap_score,
            confidence_score: candidate.relevance,
            source: candidate.source,
            categories: candidate.categories,
            priority: GapPriority::from_score(gap_score),
            score_breakdown: breakdown,
            detected_at: Utc::now(),
        })
    }

    /// [known start] + unknown external steps + [target], at most `max_len`
    fn learning_path(
        &self,
        start: &str,
        candidate: &Candidate,
        profile: &UserKnowledgeProfile,
        max_len: usize,
    ) -> Vec<String> {
        let mut path = vec![start.to_string()];
        for step in &candidate.related {
            if path.len() + 1 >= max_len {
                break;
            }
            if step == &candidate.label || path.contains(step) || self.knows(profile, step) {
                continue;
            }
            path.push(step.clone());
        }
        path.push(candidate.label.clone());
        path.truncate(max_len);
        path
    }
}

fn offer(candidates: &mut BTreeMap<String, Candidate>, candidate: Candidate) {
    if candidate.label.is_empty() {
        return;
    }
    match candidates.get(&candidate.label) {
        Some(existing) if existing.relevance >= candidate.relevance => {}
        _ => {
            candidates.insert(candidate.label.clone(), candidate);
        }
    }
}

fn score(
    related_count: usize,
    categories: &[String],
    path_len: usize,
    profile: &UserKnowledgeProfile,
    preference: DifficultyLevel,
) -> GapScoreBreakdown {
    let concept_relevance = 10.0 * related_count as f64;
    let user_interest_alignment: f64 = categories
        .iter()
        .map(|c| profile.interest_weight(c) * 25.0)
        .sum();
    let path_length_score = (20.0 - 4.0 * path_len as f64).max(0.0);

    let bonus = match (difficulty_for_path(path_len), preference) {
        (DifficultyLevel::Beginner, DifficultyLevel::Beginner) => 10.0,
        (DifficultyLevel::Advanced, DifficultyLevel::Advanced) => 10.0,
        (DifficultyLevel::Intermediate, DifficultyLevel::Intermediate) => 5.0,
        _ => 0.0,
    };

    GapScoreBreakdown {
        concept_relevance,
        user_interest_alignment,
        path_length_score,
        difficulty_score: 15.0 + bonus,
    }
}

/// Twenty minutes per concept on the path
fn estimated_minutes(path_len: usize) -> u32 {
    (path_len as u32).saturating_mul(20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OntologyConfig;
    use crate::domain::context::{InMemoryContextStore, StoredNote};
    use crate::domain::ontology::OntologyProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixtureProvider {
        answers: HashMap<String, Vec<ExternalOntologyResult>>,
    }

    #[async_trait]
    impl OntologyProvider for FixtureProvider {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn search(&self, concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            Ok(self.answers.get(concept).cloned().unwrap_or_default())
        }
    }

    struct DownProvider;

    #[async_trait]
    impl OntologyProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn search(&self, _concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            Err(Error::ExternalDataUnavailable("down".into()))
        }
    }

    fn detector_with(provider: Arc<dyn OntologyProvider>, store: InMemoryContextStore) -> GapDetector {
        let client = ExternalOntologyClient::new(vec![provider], &OntologyConfig::default());
        GapDetector::new(Arc::new(store), client)
    }

    fn physics_provider() -> Arc<dyn OntologyProvider> {
        let mut answers = HashMap::new();
        answers.insert(
            "entropy".to_string(),
            vec![
                ExternalOntologyResult::new("wd:Q1", "entropy", "fixture")
                    .with_categories(vec!["physical quantity".into()])
                    .with_related(vec!["enthalpy".into(), "Thermodynamics".into()])
                    .with_score(100.0),
                ExternalOntologyResult::new("wd:Q2", "entropy (information theory)", "fixture")
                    .with_categories(vec!["information theory".into()])
                    .with_related(vec!["shannon".into(), "channel capacity".into()])
                    .with_score(70.0),
            ],
        );
        Arc::new(FixtureProvider { answers })
    }

    fn store() -> InMemoryContextStore {
        InMemoryContextStore::new().with_note(StoredNote {
            id: "n1".into(),
            title: "Engines".into(),
            content: "Entropy in heat engines".into(),
            tags: vec!["physical quantity".into()],
            concepts: vec!["entropy".into()],
        })
    }

    #[tokio::test]
    async fn test_empty_concepts_yield_no_gaps() {
        let detector = detector_with(physics_provider(), store());
        let gaps = detector
            .detect_knowledge_gaps(&[], &GapDetectionConfig::default())
            .await
            .unwrap();
        assert!(gaps.is_empty());
    }

    #[tokio::test]
    async fn test_detects_related_and_category_gaps() {
        let detector = detector_with(physics_provider(), store());
        let config = GapDetectionConfig {
            min_gap_score: 0.0,
            ..GapDetectionConfig::default()
        };
        let gaps = detector
            .detect_knowledge_gaps(&["Entropy".to_string()], &config)
            .await
            .unwrap();

        let missing: Vec<&str> = gaps.iter().map(|g| g.missing_concept.as_str()).collect();
        assert!(missing.contains(&"entropy (information theory)"));
        assert!(missing.contains(&"enthalpy"));
        assert!(missing.contains(&"thermodynamics"));
        assert!(!missing.contains(&"entropy"));

        for gap in &gaps {
            assert!((0.0..=100.0).contains(&gap.gap_score));
            assert!(gap.gap_score >= config.min_gap_score);
            assert!(gap.suggested_learning_path.len() >= 2);
            assert!(gap.suggested_learning_path.len() <= config.max_learning_path_length);
            assert_eq!(gap.suggested_learning_path[0], "entropy");
            assert_eq!(gap.suggested_learning_path.last(), Some(&gap.missing_concept));
        }
        assert!(gaps.windows(2).all(|w| w[0].gap_score >= w[1].gap_score));
    }

    #[tokio::test]
    async fn test_learning_path_goes_through_external_steps() {
        let detector = detector_with(physics_provider(), store());
        let config = GapDetectionConfig {
            min_gap_score: 0.0,
            ..GapDetectionConfig::default()
        };
        let gaps = detector
            .detect_knowledge_gaps(&["entropy".to_string()], &config)
            .await
            .unwrap();

        let info = gaps
            .iter()
            .find(|g| g.missing_concept == "entropy (information theory)")
            .unwrap();
        assert_eq!(
            info.suggested_learning_path,
            vec!["entropy", "shannon", "channel capacity", "entropy (information theory)"]
        );
        assert_eq!(info.related_user_concepts, vec!["entropy"]);
        assert_eq!(info.confidence_score, 70.0);
        // 10 related + 0 interest + 4 path + 15 difficulty
        assert_eq!(info.gap_score, 29.0);
        assert_eq!(info.priority, GapPriority::Low);
    }

    #[tokio::test]
    async fn test_category_gap_scoring() {
        let detector = detector_with(physics_provider(), store());
        let gaps = detector
            .detect_knowledge_gaps(&["entropy".to_string()], &GapDetectionConfig::default())
            .await
            .unwrap();

        // related via shared "physical quantity": 10 + 25 (the only tag) + 12 + 15
        let enthalpy = gaps.iter().find(|g| g.missing_concept == "enthalpy").unwrap();
        assert_eq!(enthalpy.suggested_learning_path, vec!["entropy", "enthalpy"]);
        assert_eq!(enthalpy.score_breakdown.concept_relevance, 10.0);
        assert_eq!(enthalpy.score_breakdown.user_interest_alignment, 25.0);
        assert_eq!(enthalpy.gap_score, 62.0);
        assert_eq!(enthalpy.priority, GapPriority::Medium);
        assert_eq!(enthalpy.confidence_score, 80.0);
    }

    #[tokio::test]
    async fn test_short_path_limit_and_min_score() {
        let detector = detector_with(physics_provider(), store());
        let config = GapDetectionConfig {
            max_learning_path_length: 2,
            min_gap_score: 60.0,
            ..GapDetectionConfig::default()
        };
        let gaps = detector
            .detect_knowledge_gaps(&["entropy".to_string()], &config)
            .await
            .unwrap();

        assert!(!gaps.is_empty());
        assert!(gaps.iter().all(|g| g.suggested_learning_path.len() == 2));
        assert!(gaps.iter().all(|g| g.gap_score >= 60.0));
    }

    #[tokio::test]
    async fn test_concepts_in_own_notes_are_not_gaps() {
        let store = store().with_note(StoredNote {
            id: "n2".into(),
            title: "State functions".into(),
            content: "Entropy and enthalpy".into(),
            tags: Vec::new(),
            concepts: vec!["entropy".into(), "enthalpy".into()],
        });
        let config = GapDetectionConfig {
            min_gap_score: 0.0,
            ..GapDetectionConfig::default()
        };
        let gaps = detector_with(physics_provider(), store)
            .detect_knowledge_gaps(&["entropy".to_string()], &config)
            .await
            .unwrap();

        let missing: Vec<&str> = gaps.iter().map(|g| g.missing_concept.as_str()).collect();
        assert!(!missing.contains(&"enthalpy"));
        assert!(missing.contains(&"thermodynamics"));
    }

    #[tokio::test]
    async fn test_provider_outage_yields_no_gaps() {
        let detector = detector_with(Arc::new(DownProvider), store());
        let gaps = detector
            .detect_knowledge_gaps(&["entropy".to_string()], &GapDetectionConfig::default())
            .await
            .unwrap();
        assert!(gaps.is_empty());
    }

    #[tokio::test]
    async fn test_gap_ids_are_stable() {
        let detector = detector_with(physics_provider(), store());
        let config = GapDetectionConfig::default();
        let a = detector.detect_knowledge_gaps(&["entropy".to_string()], &config).await.unwrap();
        let b = detector.detect_knowledge_gaps(&["entropy".to_string()], &config).await.unwrap();
        let ids_a: Vec<_> = a.iter().map(|g| g.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|g| g.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
