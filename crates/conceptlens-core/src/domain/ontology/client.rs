//! Cached, fan-out ontology client

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use futures_util::future::join_all;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::config::OntologyConfig;
use crate::domain::concept::{CallGuard, normalize};
use crate::error::Result;

use super::provider::{OntologyProvider, SparqlProvider};
use super::types::{ExternalOntologyResult, OntologySearch};

/// Cache counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Client for external concept databases
///
/// Lookups are cached by lowercase concept with a TTL and a capacity
/// bound. A miss fans out to every provider in parallel; a failing provider
/// is logged and contributes nothing.
#[derive(Clone)]
pub struct ExternalOntologyClient {
    providers: Vec<Arc<dyn OntologyProvider>>,
    cache: Cache<String, Arc<Vec<ExternalOntologyResult>>>,
    guard: CallGuard,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for ExternalOntologyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalOntologyClient")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            )
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl ExternalOntologyClient {
    /// Create a client over explicit providers
    pub fn new(providers: Vec<Arc<dyn OntologyProvider>>, config: &OntologyConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Self {
            providers,
            cache,
            guard: CallGuard::new(Duration::from_secs(config.timeout_secs)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a client with one SPARQL provider per configured endpoint
    pub fn from_config(config: &OntologyConfig) -> Result<Self> {
        let providers = SparqlProvider::from_config(config)?
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn OntologyProvider>)
            .collect();
        Ok(Self::new(providers, config))
    }

    /// Use a shared deadline/cancellation guard for provider calls
    pub fn with_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Search all providers for a concept
    ///
    /// Results are sorted by relevance score, descending.
    pub async fn search_concept(&self, concept: &str) -> Vec<ExternalOntologyResult> {
        self.search_concept_detailed(concept).await.results
    }

    /// Search all providers, reporting provider diagnostics
    pub async fn search_concept_detailed(&self, concept: &str) -> OntologySearch {
        let key = normalize(concept);
        if key.is_empty() {
            return OntologySearch::default();
        }

        if let Some(cached) = self.cache.get(&key).await {
            self.counters.hits.fetch_add(1, AtomicOrdering::Relaxed);
            debug!(concept = %key, results = cached.len(), "Ontology cache hit");
            return OntologySearch {
                concept: key,
                results: cached.as_ref().clone(),
                from_cache: true,
                ..Default::default()
            };
        }
        self.counters.misses.fetch_add(1, AtomicOrdering::Relaxed);

        let lookups = self.providers.iter().map(|provider| {
            let key = key.clone();
            let guard = self.guard.clone();
            async move {
                let outcome = guard.run(provider.search(&key)).await;
                (provider.name().to_string(), outcome)
            }
        });
        let outcomes = join_all(lookups).await;

        let attempted = outcomes.len();
        let mut failed = 0;
        let mut collected = Vec::new();
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(results) => collected.extend(results),
                Err(e) => {
                    failed += 1;
                    warn!(provider = %provider, concept = %key, error = %e, "Ontology provider failed");
                }
            }
        }

        let results = merge_results(collected);

        // A total outage is not cached so the next lookup retries
        if attempted == 0 || failed < attempted {
            self.cache.insert(key.clone(), Arc::new(results.clone())).await;
        }

        debug!(
            concept = %key,
            results = results.len(),
            providers = attempted,
            failed,
            "Ontology search completed"
        );

        OntologySearch {
            concept: key,
            results,
            providers_attempted: attempted,
            providers_failed: failed,
            from_cache: false,
        }
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(AtomicOrdering::Relaxed),
            misses: self.counters.misses.load(AtomicOrdering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }

    /// Drop every cached lookup
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// Merge results across providers: one result per URI, highest score wins
fn merge_results(results: Vec<ExternalOntologyResult>) -> Vec<ExternalOntologyResult> {
    let mut by_uri: HashMap<String, ExternalOntologyResult> = HashMap::new();
    for result in results {
        match by_uri.get(&result.uri) {
            Some(existing) if existing.relevance_score >= result.relevance_score => {}
            _ => {
                by_uri.insert(result.uri.clone(), result);
            }
        }
    }

    let mut merged: Vec<_> = by_uri.into_values().collect();
    merged.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.uri.cmp(&b.uri))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct StaticProvider {
        name: String,
        results: Vec<ExternalOntologyResult>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(name: &str, results: Vec<ExternalOntologyResult>) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                results,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OntologyProvider for StaticProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, _concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.results.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl OntologyProvider for FailingProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn search(&self, _concept: &str) -> Result<Vec<ExternalOntologyResult>> {
            Err(Error::OntologyProviderFailed {
                provider: "broken".into(),
                message: "HTTP 503".into(),
            })
        }
    }

    fn result(uri: &str, label: &str, score: f64, source: &str) -> ExternalOntologyResult {
        ExternalOntologyResult::new(uri, label, source).with_score(score)
    }

    #[tokio::test]
    async fn test_results_sorted_and_merged_by_uri() {
        let a = StaticProvider::new(
            "a",
            vec![result("u1", "entropy", 60.0, "a"), result("u2", "heat", 30.0, "a")],
        );
        let b = StaticProvider::new(
            "b",
            vec![result("u1", "entropy", 100.0, "b"), result("u3", "order", 45.5, "b")],
        );
        let client = ExternalOntologyClient::new(
            vec![a as Arc<dyn OntologyProvider>, b as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        );

        let results = client.search_concept("Entropy").await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].uri, "u1");
        assert_eq!(results[0].relevance_score, 100.0);
        assert_eq!(results[0].source, "b");
        assert!(results.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let provider = StaticProvider::new("a", vec![result("u1", "entropy", 100.0, "a")]);
        let client = ExternalOntologyClient::new(
            vec![provider.clone() as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        );

        let first = client.search_concept_detailed("entropy").await;
        let second = client.search_concept_detailed("ENTROPY ").await;

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.results, second.results);
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(client.cache_stats().hits, 1);
        assert_eq!(client.cache_stats().misses, 1);
    }

    #[tokio::test]
    async fn test_failing_provider_is_isolated() {
        let good = StaticProvider::new("good", vec![result("u1", "entropy", 100.0, "good")]);
        let client = ExternalOntologyClient::new(
            vec![
                good as Arc<dyn OntologyProvider>,
                Arc::new(FailingProvider) as Arc<dyn OntologyProvider>,
            ],
            &OntologyConfig::default(),
        );

        let search = client.search_concept_detailed("entropy").await;
        assert_eq!(search.results.len(), 1);
        assert_eq!(search.providers_attempted, 2);
        assert_eq!(search.providers_failed, 1);
        assert!(!search.all_providers_failed());
    }

    #[tokio::test]
    async fn test_total_outage_is_not_cached() {
        let client = ExternalOntologyClient::new(
            vec![Arc::new(FailingProvider) as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        );

        let first = client.search_concept_detailed("entropy").await;
        assert!(first.all_providers_failed());
        assert!(first.results.is_empty());

        let second = client.search_concept_detailed("entropy").await;
        assert!(!second.from_cache);
    }

    #[tokio::test]
    async fn test_blank_concept_returns_nothing() {
        let provider = StaticProvider::new("a", vec![result("u1", "x", 100.0, "a")]);
        let client = ExternalOntologyClient::new(
            vec![provider.clone() as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        );
        assert!(client.search_concept("   ").await.is_empty());
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_guard_fails_every_provider() {
        let provider = StaticProvider::new("a", vec![result("u1", "x", 100.0, "a")]);
        let guard = CallGuard::default();
        guard.token().cancel();
        let client = ExternalOntologyClient::new(
            vec![provider.clone() as Arc<dyn OntologyProvider>],
            &OntologyConfig::default(),
        )
        .with_guard(guard);

        let search = client.search_concept_detailed("x").await;
        assert!(search.all_providers_failed());
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 0);
    }
}
