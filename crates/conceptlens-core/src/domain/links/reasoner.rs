//! Hidden link reasoning

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::concept::{deterministic_id, normalize_all};
use crate::domain::schema::{NodeOrigin, RelationClusterer, SchemaGraph, SchemaGraphBuilder};
use crate::error::{Error, Result};

use super::search::{FoundPath, search_paths};
use super::types::{
    FALLBACK_CONFIDENCE, HiddenLink, HiddenLinkDetectionOptions, LinkReasoning, LinkSource, LinkType,
    ReasoningMethod, link_strength,
};

/// Bonus for paths crossing a relation of a semantic cluster
const CLUSTER_BONUS: f64 = 15.0;

/// Multi-hop reasoner over per-query schema graphs
///
/// Owns (or shares) the relation clusters. Cluster updates take the write
/// lock, so concurrent queries update them one at a time, and each query
/// scores against its own snapshot.
#[derive(Debug, Clone)]
pub struct LinkReasoner {
    builder: SchemaGraphBuilder,
    clusters: Arc<RwLock<RelationClusterer>>,
    cancel: CancellationToken,
}

impl LinkReasoner {
    pub fn new(builder: SchemaGraphBuilder) -> Self {
        Self {
            builder,
            clusters: Arc::new(RwLock::new(RelationClusterer::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Share relation clusters with other reasoners
    pub fn with_clusters(mut self, clusters: Arc<RwLock<RelationClusterer>>) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn clusters(&self) -> &Arc<RwLock<RelationClusterer>> {
        &self.clusters
    }

    pub fn builder(&self) -> &SchemaGraphBuilder {
        &self.builder
    }

    /// Find hidden links between every pair of concepts
    ///
    /// Never fails on dependency trouble: if the schema cannot be built, or
    /// no ontology provider answered at all, one direct link per pair is
    /// returned at [`FALLBACK_CONFIDENCE`]. The only error is cancellation.
    pub async fn detect_hidden_links(
        &self,
        concepts: &[String],
        options: &HiddenLinkDetectionOptions,
    ) -> Result<Vec<HiddenLink>> {
        let concepts = normalize_all(concepts);
        let pairs = concept_pairs(&concepts);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        match self.reason(&concepts, &pairs, options).await {
            Ok(links) => Ok(links),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    error = %e,
                    pairs = pairs.len(),
                    "Hidden link reasoning failed, falling back to direct links"
                );
                let now = Utc::now();
                Ok(pairs
                    .iter()
                    .map(|(from, to)| fallback_link(from, to, now))
                    .collect())
            }
        }
    }

    async fn reason(
        &self,
        concepts: &[String],
        pairs: &[(String, String)],
        options: &HiddenLinkDetectionOptions,
    ) -> Result<Vec<HiddenLink>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let build = self.builder.build_dynamic_schema(concepts).await?;
        // guards report a mid-build cancel as provider failures
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if build.diagnostics.external_outage() {
            return Err(Error::ExternalDataUnavailable(format!(
                "no ontology provider answered for any of {} concepts",
                concepts.len()
            )));
        }

        let clusters = if options.enable_super_relations {
            let mut clusterer = self.clusters.write().await;
            clusterer.update_relation_clusters(&build.graph);
            Some(Arc::new(clusterer.clone()))
        } else {
            None
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let graph = build.graph;
        let now = Utc::now();
        let per_pair: Vec<Vec<HiddenLink>> = if options.enable_parallel_processing {
            stream::iter(pairs.iter().cloned())
                .map(|(from, to)| {
                    let graph = graph.clone();
                    let clusters = clusters.clone();
                    let options = options.clone();
                    let cancel = self.cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Vec::new();
                        }
                        let label = format!("{} <-> {}", from, to);
                        let task = tokio::task::spawn_blocking(move || {
                            links_for_pair(&graph, clusters.as_deref(), &from, &to, &options, now)
                        });
                        match task.await {
                            Ok(links) => links,
                            Err(e) => {
                                let error = Error::PathSearchFailed(e.to_string());
                                warn!(pair = %label, error = %error, "Pair search failed, skipping pair");
                                Vec::new()
                            }
                        }
                    }
                })
                .buffer_unordered(options.worker_count.max(1))
                .collect()
                .await
        } else {
            pairs
                .iter()
                .map(|(from, to)| {
                    links_for_pair(&graph, clusters.as_deref(), from, to, options, now)
                })
                .collect()
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let candidates: usize = per_pair.iter().map(Vec::len).sum();
        let mut links: Vec<HiddenLink> = per_pair
            .into_iter()
            .flatten()
            .filter(|link| link.confidence_score >= options.min_confidence_score)
            .collect();
        links.sort_by(compare_links);
        links.truncate(options.max_links_to_return);

        info!(
            pairs = pairs.len(),
            candidates,
            links = links.len(),
            parallel = options.enable_parallel_processing,
            "Hidden link detection completed"
        );
        Ok(links)
    }
}

/// Unordered pairs in input order
fn concept_pairs(concepts: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (i, from) in concepts.iter().enumerate() {
        for to in &concepts[i + 1..] {
            pairs.push((from.clone(), to.clone()));
        }
    }
    pairs
}

/// Confidence desc, strength desc, hops asc, id for a stable order
fn compare_links(a: &HiddenLink, b: &HiddenLink) -> Ordering {
    b.confidence_score
        .partial_cmp(&a.confidence_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.strength.partial_cmp(&a.strength).unwrap_or(Ordering::Equal))
        .then_with(|| a.reasoning.hops.cmp(&b.reasoning.hops))
        .then_with(|| a.id.cmp(&b.id))
}

fn links_for_pair(
    graph: &SchemaGraph,
    clusters: Option<&RelationClusterer>,
    from: &str,
    to: &str,
    options: &HiddenLinkDetectionOptions,
    now: DateTime<Utc>,
) -> Vec<HiddenLink> {
    let links: Vec<HiddenLink> = search_paths(graph, from, to, options.max_hops, options.max_paths_per_pair)
        .into_iter()
        .filter(|path| path.nodes.len() > 2)
        .map(|path| build_link(graph, clusters, from, to, path, now))
        .collect();
    debug!(from = %from, to = %to, links = links.len(), "Pair searched");
    links
}

fn build_link(
    graph: &SchemaGraph,
    clusters: Option<&RelationClusterer>,
    from: &str,
    to: &str,
    path: FoundPath,
    now: DateTime<Utc>,
) -> HiddenLink {
    let hops = path.hops();
    let method = path.best_method();
    let strength = link_strength(hops, path.nodes.len());
    let touched = clusters.and_then(|c| c.cluster_touched_by(&path.nodes));

    let mut confidence = 50.0
        + (30.0 - 8.0 * hops as f64).max(0.0)
        + strength * 20.0
        + method.bonus();
    if touched.is_some() {
        confidence += CLUSTER_BONUS;
    }
    let confidence = (confidence.clamp(0.0, 100.0) * 100.0).round() / 100.0;

    let link_type = if touched.is_some() {
        LinkType::SuperRelation
    } else if hops > 3 {
        LinkType::Indirect
    } else {
        LinkType::Direct
    };

    let origin = path
        .nodes
        .iter()
        .filter_map(|id| graph.get(id).map(|n| n.origin))
        .reduce(NodeOrigin::merge)
        .unwrap_or(NodeOrigin::Internal);

    let mut evidence: Vec<String> = path
        .methods
        .iter()
        .map(|m| format!("found by {} search", m.as_str()))
        .collect();
    evidence.extend(
        path.nodes
            .iter()
            .filter_map(|id| graph.get(id))
            .filter(|n| n.is_relation())
            .map(|n| format!("relation: {}", n.label)),
    );
    if let Some(cluster) = touched {
        evidence.push(format!(
            "{} relation cluster (strength {:.2})",
            cluster.semantic_type, cluster.strength
        ));
    }

    let intermediate_nodes = path.nodes[1..path.nodes.len() - 1].to_vec();

    HiddenLink {
        id: deterministic_id("link", &path.nodes.join(" > ")),
        from_concept: from.to_string(),
        to_concept: to.to_string(),
        link_type,
        confidence_score: confidence,
        reasoning: LinkReasoning {
            method,
            hops,
            intermediate_nodes,
            evidence,
        },
        connection_path: path.nodes,
        source: LinkSource::from(origin),
        strength,
        discovered_at: now,
    }
}

fn fallback_link(from: &str, to: &str, now: DateTime<Utc>) -> HiddenLink {
    let path = vec![from.to_string(), to.to_string()];
    HiddenLink {
        id: deterministic_id("link", &path.join(" > ")),
        from_concept: from.to_string(),
        to_concept: to.to_string(),
        link_type: LinkType::Direct,
        confidence_score: FALLBACK_CONFIDENCE,
        reasoning: LinkReasoning {
            method: ReasoningMethod::Forward,
            hops: 1,
            intermediate_nodes: Vec::new(),
            evidence: vec!["reasoning unavailable, concepts paired directly".to_string()],
        },
        connection_path: path,
        source: LinkSource::Internal,
        strength: link_strength(1, 2),
        discovered_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OntologyConfig, SchemaConfig};
    use crate::domain::concept::CallGuard;
    use crate::domain::context::InMemoryContextStore;
    use crate::domain::ontology::{ExternalOntologyClient, ExternalOntologyResult, OntologyProvider};
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct CategoryProvider {
        fail: bool,
    }

    #[async_trait]
    impl OntologyProvider for CategoryProvider {
        fn name(&self) -> &str {
            "categories"
        }

        async fn search(&self, concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            if self.fail {
                return Err(Error::OntologyProviderFailed {
                    provider: "categories".into(),
                    message: "HTTP 503".into(),
                });
            }
            Ok(vec![
                ExternalOntologyResult::new(format!("urn:{}", concept), concept, "categories")
                    .with_categories(vec!["physical quantity".into()])
                    .with_score(100.0),
            ])
        }
    }

    fn reasoner(fail: bool) -> LinkReasoner {
        let store = InMemoryContextStore::new()
            .with_relation("entropy", &["thermodynamics"])
            .with_relation("enthalpy", &["thermodynamics"]);
        let client = ExternalOntologyClient::new(
            vec![Arc::new(CategoryProvider { fail }) as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        );
        LinkReasoner::new(SchemaGraphBuilder::new(
            Arc::new(store),
            client,
            &SchemaConfig::default(),
        ))
    }

    fn concepts() -> Vec<String> {
        vec!["Entropy".to_string(), "enthalpy".to_string()]
    }

    #[tokio::test]
    async fn test_links_satisfy_invariants() {
        let options = HiddenLinkDetectionOptions::default();
        let links = reasoner(false)
            .detect_hidden_links(&concepts(), &options)
            .await
            .unwrap();

        assert!(!links.is_empty());
        for link in &links {
            assert_eq!(link.reasoning.hops, link.connection_path.len() - 1);
            assert!(link.connection_path.len() > 2);
            assert!((0.0..=100.0).contains(&link.confidence_score));
            assert!(link.confidence_score >= options.min_confidence_score);
            assert!(link.reasoning.hops <= options.max_hops);
            assert_eq!(link.connection_path[0], "entropy");
            assert_eq!(link.connection_path.last().map(String::as_str), Some("enthalpy"));
        }
        assert!(links.windows(2).all(|w| compare_links(&w[0], &w[1]) != Ordering::Greater));
    }

    #[tokio::test]
    async fn test_category_relations_yield_super_relation_links() {
        let links = reasoner(false)
            .detect_hidden_links(&concepts(), &HiddenLinkDetectionOptions::default())
            .await
            .unwrap();

        let top = &links[0];
        assert_eq!(top.link_type, LinkType::SuperRelation);
        assert_eq!(top.reasoning.hops, 3);
        assert!(top.connection_path.contains(&"physical quantity".to_string()));
        assert!(top.reasoning.evidence.iter().any(|e| e.contains("hierarchical")));

        let via_thermo = links
            .iter()
            .find(|l| l.connection_path == vec!["entropy", "thermodynamics", "enthalpy"])
            .unwrap();
        assert_eq!(via_thermo.link_type, LinkType::Direct);
        // endpoints carry both internal and external evidence
        assert_eq!(via_thermo.source, LinkSource::Hybrid);
        assert_eq!(via_thermo.reasoning.method, ReasoningMethod::Bidirectional);
        assert_eq!(via_thermo.reasoning.intermediate_nodes, vec!["thermodynamics"]);
    }

    #[tokio::test]
    async fn test_super_relations_disabled() {
        let options = HiddenLinkDetectionOptions {
            enable_super_relations: false,
            ..Default::default()
        };
        let links = reasoner(false)
            .detect_hidden_links(&concepts(), &options)
            .await
            .unwrap();
        assert!(!links.is_empty());
        assert!(links.iter().all(|l| l.link_type != LinkType::SuperRelation));
    }

    #[tokio::test]
    async fn test_total_outage_falls_back_to_direct_link() {
        let links = reasoner(true)
            .detect_hidden_links(&["a".to_string(), "b".to_string()], &Default::default())
            .await
            .unwrap();

        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.from_concept, "a");
        assert_eq!(link.to_concept, "b");
        assert_eq!(link.link_type, LinkType::Direct);
        assert_eq!(link.confidence_score, FALLBACK_CONFIDENCE);
        assert_eq!(link.reasoning.hops, link.connection_path.len() - 1);
    }

    #[tokio::test]
    async fn test_parallel_and_sequential_agree() {
        let parallel = HiddenLinkDetectionOptions::default();
        let sequential = HiddenLinkDetectionOptions {
            enable_parallel_processing: false,
            ..Default::default()
        };
        let concepts = vec![
            "entropy".to_string(),
            "enthalpy".to_string(),
            "thermodynamics".to_string(),
        ];

        let triples = |links: Vec<HiddenLink>| -> HashSet<(String, String, usize)> {
            links
                .into_iter()
                .map(|l| (l.from_concept, l.to_concept, l.reasoning.hops))
                .collect()
        };

        let a = triples(reasoner(false).detect_hidden_links(&concepts, &parallel).await.unwrap());
        let b = triples(reasoner(false).detect_hidden_links(&concepts, &sequential).await.unwrap());
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_fewer_than_two_concepts() {
        let r = reasoner(false);
        let options = HiddenLinkDetectionOptions::default();
        assert!(r.detect_hidden_links(&[], &options).await.unwrap().is_empty());
        assert!(r
            .detect_hidden_links(&["entropy".to_string(), "ENTROPY".to_string()], &options)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_reasoning_errors() {
        let token = CancellationToken::new();
        token.cancel();
        let r = reasoner(false).with_cancellation(token);
        let err = r
            .detect_hidden_links(&concepts(), &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    /// Cancels the shared token from inside the call, then stalls
    struct CancellingProvider {
        token: CancellationToken,
    }

    #[async_trait]
    impl OntologyProvider for CancellingProvider {
        fn name(&self) -> &str {
            "cancelling"
        }

        async fn search(&self, _concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            self.token.cancel();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cancel_during_provider_call_is_not_a_fallback() {
        let token = CancellationToken::new();
        let guard = CallGuard::new(std::time::Duration::from_secs(30)).with_token(token.clone());
        let client = ExternalOntologyClient::new(
            vec![Arc::new(CancellingProvider { token: token.clone() }) as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        )
        .with_guard(guard.clone());
        let builder = SchemaGraphBuilder::new(
            Arc::new(InMemoryContextStore::new()),
            client,
            &SchemaConfig::default(),
        )
        .with_guard(guard);

        let err = LinkReasoner::new(builder)
            .with_cancellation(token)
            .detect_hidden_links(&["a".to_string(), "b".to_string()], &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_clusters_updated_by_reasoning() {
        let r = reasoner(false);
        r.detect_hidden_links(&concepts(), &Default::default()).await.unwrap();
        let clusters = r.clusters().read().await;
        let hierarchical = clusters
            .cluster(crate::domain::schema::SemanticType::Hierarchical)
            .unwrap();
        assert_eq!(hierarchical.relations.len(), 2);
    }
}
