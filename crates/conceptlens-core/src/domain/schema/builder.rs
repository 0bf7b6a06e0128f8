//! Dynamic schema construction

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::config::SchemaConfig;
use crate::domain::concept::{CallGuard, concept_set_key, normalize, normalize_all};
use crate::domain::context::{ContextBundle, ContextRetriever};
use crate::domain::ontology::{ExternalOntologyClient, OntologySearch};
use crate::error::{Error, Result};

use super::node::{NodeOrigin, SchemaGraph};

/// Ontology results per concept merged into the schema
const EXTERNAL_RESULTS_PER_CONCEPT: usize = 5;

/// What happened while building one schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaDiagnostics {
    /// Concepts the schema was built for
    pub concepts: usize,
    /// Context lookups that failed or timed out
    pub context_failures: usize,
    /// Concepts for which every ontology provider failed
    pub external_failures: usize,
    /// Ontology results merged into the graph
    pub external_results: usize,
    pub from_cache: bool,
}

impl SchemaDiagnostics {
    /// True when any dependency failed during the build
    pub fn is_degraded(&self) -> bool {
        self.context_failures > 0 || self.external_failures > 0
    }

    /// True when no concept got an answer from any ontology provider
    pub fn external_outage(&self) -> bool {
        self.concepts > 0 && self.external_failures == self.concepts
    }
}

/// A built schema with its diagnostics
#[derive(Debug, Clone)]
pub struct SchemaBuild {
    pub graph: Arc<SchemaGraph>,
    pub diagnostics: SchemaDiagnostics,
}

/// Builds per-query schema graphs from internal context and external ontologies
///
/// Complete builds are cached by the sorted concept set. Builds where a
/// dependency failed are returned but not cached, so a later query can
/// pick up the recovered source.
#[derive(Clone)]
pub struct SchemaGraphBuilder {
    retriever: Arc<dyn ContextRetriever>,
    ontology: ExternalOntologyClient,
    cache: Cache<String, Arc<SchemaGraph>>,
    guard: CallGuard,
}

impl std::fmt::Debug for SchemaGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGraphBuilder")
            .field("ontology", &self.ontology)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl SchemaGraphBuilder {
    pub fn new(
        retriever: Arc<dyn ContextRetriever>,
        ontology: ExternalOntologyClient,
        config: &SchemaConfig,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Self {
            retriever,
            ontology,
            cache,
            guard: CallGuard::new(Duration::from_secs(config.context_timeout_secs)),
        }
    }

    /// Use a shared deadline/cancellation guard for context lookups
    pub fn with_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn ontology(&self) -> &ExternalOntologyClient {
        &self.ontology
    }

    pub fn retriever(&self) -> &Arc<dyn ContextRetriever> {
        &self.retriever
    }

    pub fn cached_schemas(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Build the schema graph for a concept set
    ///
    /// An empty set yields an empty graph without touching any dependency.
    /// Individual dependency failures are counted in the diagnostics; the
    /// only error is cancellation of the whole build.
    pub async fn build_dynamic_schema(&self, concepts: &[String]) -> Result<SchemaBuild> {
        let concepts = normalize_all(concepts);
        if concepts.is_empty() {
            return Ok(SchemaBuild {
                graph: Arc::new(SchemaGraph::new()),
                diagnostics: SchemaDiagnostics::default(),
            });
        }
        if self.guard.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let key = concept_set_key(&concepts);
        if let Some(graph) = self.cache.get(&key).await {
            debug!(concepts = %key, nodes = graph.len(), "Schema cache hit");
            return Ok(SchemaBuild {
                graph,
                diagnostics: SchemaDiagnostics {
                    concepts: concepts.len(),
                    from_cache: true,
                    ..Default::default()
                },
            });
        }

        let context_fetches = concepts.iter().map(|concept| self.fetch_context(concept));
        let external_fetches = concepts
            .iter()
            .map(|concept| self.ontology.search_concept_detailed(concept));
        let (bundles, searches) = tokio::join!(join_all(context_fetches), join_all(external_fetches));

        let mut diagnostics = SchemaDiagnostics {
            concepts: concepts.len(),
            ..Default::default()
        };
        let mut graph = SchemaGraph::new();

        for (concept, bundle) in concepts.iter().zip(bundles) {
            match bundle {
                Ok(bundle) => merge_context(&mut graph, concept, &bundle),
                Err(e) => {
                    diagnostics.context_failures += 1;
                    warn!(concept = %concept, error = %e, "Context retrieval failed");
                    graph.upsert_entity(concept, NodeOrigin::Internal);
                }
            }
        }

        for (concept, search) in concepts.iter().zip(searches) {
            if search.all_providers_failed() {
                diagnostics.external_failures += 1;
            }
            diagnostics.external_results += merge_external(&mut graph, concept, &search);
        }

        let graph = Arc::new(graph);
        if !diagnostics.is_degraded() {
            self.cache.insert(key.clone(), graph.clone()).await;
        }

        info!(
            concepts = concepts.len(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            context_failures = diagnostics.context_failures,
            external_failures = diagnostics.external_failures,
            "Schema graph built"
        );

        Ok(SchemaBuild { graph, diagnostics })
    }

    async fn fetch_context(&self, concept: &str) -> Result<ContextBundle> {
        self.guard
            .run(self.retriever.get_context_bundle(concept))
            .await
    }
}

fn merge_context(graph: &mut SchemaGraph, concept: &str, bundle: &ContextBundle) {
    let node = graph.upsert_entity(concept, NodeOrigin::Internal);
    node.weight = bundle.evidence_count() as f64;

    for related in &bundle.related_concepts {
        let related = normalize(related);
        if related.is_empty() {
            continue;
        }
        graph.relate(concept, "related to", &related, NodeOrigin::Internal);
    }
}

/// Returns the number of results merged
fn merge_external(graph: &mut SchemaGraph, concept: &str, search: &OntologySearch) -> usize {
    graph.upsert_entity(concept, NodeOrigin::External);

    let top = search.results.iter().take(EXTERNAL_RESULTS_PER_CONCEPT);
    let mut merged = 0;
    for result in top {
        for related in &result.related_concepts {
            let related = normalize(related);
            if !related.is_empty() {
                graph.relate(concept, "related to", &related, NodeOrigin::External);
            }
        }
        for category in &result.categories {
            let category = normalize(category);
            if !category.is_empty() {
                graph.relate(concept, "instance of", &category, NodeOrigin::External);
            }
        }
        merged += 1;
    }
    merged
}
