//! Ontology providers
//!
//! A provider answers one concept lookup against one external ontology.
//! The client fans out to every configured provider and isolates their
//! failures, so providers simply return errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::{EndpointConfig, OntologyConfig};
use crate::error::{Error, Result};

use super::sparql::{SparqlDialect, aggregate_bindings, build_query, parse_response};
use super::types::ExternalOntologyResult;

/// A queryable external ontology
#[async_trait]
pub trait OntologyProvider: Send + Sync {
    /// Provider name used as the result source tag
    fn name(&self) -> &str;

    /// Look up a normalized concept
    async fn search(&self, concept: &str) -> Result<Vec<ExternalOntologyResult>>;
}

/// SPARQL-over-HTTP provider (Wikidata Query Service, DBpedia)
#[derive(Clone)]
pub struct SparqlProvider {
    name: String,
    endpoint: String,
    dialect: SparqlDialect,
    languages: Vec<String>,
    result_limit: usize,
    http_client: HttpClient,
}

impl std::fmt::Debug for SparqlProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlProvider")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl SparqlProvider {
    /// Create a provider for one configured endpoint
    ///
    /// The HTTP client sends the configured identifying `User-Agent` and
    /// enforces the configured timeout on every request.
    pub fn new(endpoint: &EndpointConfig, config: &OntologyConfig) -> Result<Self> {
        if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
            return Err(Error::ConfigError(format!(
                "endpoint '{}' must be an http(s) URL, got '{}'",
                endpoint.name, endpoint.url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/sparql-results+json"),
        );

        let http_client = HttpClient::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            name: endpoint.name.clone(),
            endpoint: endpoint.url.clone(),
            dialect: endpoint.dialect,
            languages: if config.languages.is_empty() {
                vec!["en".to_string()]
            } else {
                config.languages.clone()
            },
            result_limit: config.result_limit,
            http_client,
        })
    }

    /// Build one provider per configured endpoint
    pub fn from_config(config: &OntologyConfig) -> Result<Vec<Self>> {
        config
            .endpoints
            .iter()
            .map(|endpoint| Self::new(endpoint, config))
            .collect()
    }

    pub fn dialect(&self) -> SparqlDialect {
        self.dialect
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query text this provider sends for a concept
    pub fn query_for(&self, concept: &str) -> String {
        build_query(self.dialect, concept, &self.languages, self.result_limit)
    }
}

#[async_trait]
impl OntologyProvider for SparqlProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, concept: &str) -> Result<Vec<ExternalOntologyResult>> {
        let query = self.query_for(concept);

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::OntologyProviderFailed {
                provider: self.name.clone(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.text().await?;
        let rows = parse_response(&body).map_err(|e| Error::OntologyProviderFailed {
            provider: self.name.clone(),
            message: format!("malformed SPARQL results: {}", e),
        })?;

        let results = aggregate_bindings(concept, &rows, &self.languages, &self.name);
        debug!(
            provider = %self.name,
            concept = %concept,
            rows = rows.len(),
            results = results.len(),
            "Ontology provider answered"
        );
        Ok(results)
    }
}
