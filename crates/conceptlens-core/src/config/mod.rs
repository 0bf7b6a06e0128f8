//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::domain::concept::DifficultyLevel;
use crate::domain::gaps::GapDetectionConfig;
use crate::domain::links::HiddenLinkDetectionOptions;
use crate::domain::ontology::SparqlDialect;
use crate::domain::ranking::{RankingOptions, ScoringWeights};

/// ConceptLens configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ontology: OntologyConfig,
    pub schema: SchemaConfig,
    pub gaps: GapDetectionConfig,
    pub links: HiddenLinkDetectionOptions,
    pub ranking: RankingOptions,
    pub weights: ScoringWeights,
}

/// One SPARQL endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub dialect: SparqlDialect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Per-request timeout for provider calls
    pub timeout_secs: u64,
    /// Identifying User-Agent sent to every endpoint
    pub user_agent: String,
    /// Description languages in order of preference
    pub languages: Vec<String>,
    /// Row limit per SPARQL query
    pub result_limit: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Per-call timeout for context store lookups
    pub context_timeout_secs: u64,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                EndpointConfig {
                    name: "wikidata".to_string(),
                    url: "https://query.wikidata.org/sparql".to_string(),
                    dialect: SparqlDialect::Wikidata,
                },
                EndpointConfig {
                    name: "dbpedia".to_string(),
                    url: "https://dbpedia.org/sparql".to_string(),
                    dialect: SparqlDialect::Dbpedia,
                },
            ],
            timeout_secs: 10,
            user_agent: concat!(
                "ConceptLens/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/conceptlens/conceptlens)"
            )
            .to_string(),
            languages: vec!["en".to_string()],
            result_limit: 50,
            cache_ttl_secs: 3600,
            cache_capacity: 10_000,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            cache_capacity: 256,
            context_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CONCEPTLENS_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("conceptlens")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ontology.timeout_secs == 0 {
            return Err(anyhow!("ontology.timeout_secs must be greater than zero"));
        }
        if self.ontology.user_agent.trim().is_empty() {
            return Err(anyhow!("ontology.user_agent must identify the client"));
        }
        if self.ontology.endpoints.len() < 2 {
            return Err(anyhow!(
                "ontology.endpoints must list at least 2 endpoints (found {})",
                self.ontology.endpoints.len()
            ));
        }
        if self.links.max_hops == 0 {
            return Err(anyhow!("links.max_hops must be at least 1"));
        }
        if self.links.worker_count == 0 {
            return Err(anyhow!("links.worker_count must be at least 1"));
        }
        if self.gaps.max_learning_path_length < 2 {
            return Err(anyhow!("gaps.max_learning_path_length must be at least 2"));
        }
        if let Some((name, value)) = self
            .weights
            .entries()
            .into_iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(anyhow!(
                "weights.{} must be a finite, non-negative number (got {})",
                name,
                value
            ));
        }
        let total = self.weights.total();
        if (total - 1.0).abs() > 0.05 {
            return Err(anyhow!(
                "Scoring weights must sum to 1.0 (currently {:.2})",
                total
            ));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "ontology.endpoints" => Ok(self
                .ontology
                .endpoints
                .iter()
                .map(|e| format!("{}={}", e.name, e.url))
                .collect::<Vec<_>>()
                .join(", ")),
            "ontology.timeout_secs" => Ok(self.ontology.timeout_secs.to_string()),
            "ontology.user_agent" => Ok(self.ontology.user_agent.clone()),
            "ontology.languages" => Ok(self.ontology.languages.join(", ")),
            "ontology.cache_ttl_secs" => Ok(self.ontology.cache_ttl_secs.to_string()),

            "gaps.max_gaps_to_return" => Ok(self.gaps.max_gaps_to_return.to_string()),
            "gaps.min_gap_score" => Ok(self.gaps.min_gap_score.to_string()),
            "gaps.max_learning_path_length" => {
                Ok(self.gaps.max_learning_path_length.to_string())
            }
            "gaps.difficulty_preference" => Ok(self.gaps.difficulty_preference.to_string()),

            "links.max_hops" => Ok(self.links.max_hops.to_string()),
            "links.min_confidence_score" => Ok(self.links.min_confidence_score.to_string()),
            "links.max_links_to_return" => Ok(self.links.max_links_to_return.to_string()),
            "links.worker_count" => Ok(self.links.worker_count.to_string()),

            "ranking.max_results" => Ok(self.ranking.max_results.to_string()),
            "ranking.min_unified_score" => Ok(self.ranking.min_unified_score.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `conceptlens config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "ontology.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.ontology.timeout_secs = secs;
            }
            "ontology.user_agent" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("User agent cannot be empty"));
                }
                self.ontology.user_agent = value.to_string();
            }
            "ontology.languages" => {
                self.ontology.languages = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "ontology.cache_ttl_secs" => {
                self.ontology.cache_ttl_secs = value
                    .parse()
                    .with_context(|| format!("Invalid cache_ttl_secs value: {}", value))?;
            }

            "gaps.max_gaps_to_return" => {
                self.gaps.max_gaps_to_return = value
                    .parse()
                    .with_context(|| format!("Invalid max_gaps_to_return value: {}", value))?;
            }
            "gaps.min_gap_score" => {
                let score: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid min_gap_score value: {}", value))?;
                if !(0.0..=100.0).contains(&score) {
                    return Err(anyhow!("min_gap_score must be between 0 and 100"));
                }
                self.gaps.min_gap_score = score;
            }
            "gaps.max_learning_path_length" => {
                let len: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_learning_path_length value: {}", value))?;
                if len < 2 {
                    return Err(anyhow!("max_learning_path_length must be at least 2"));
                }
                self.gaps.max_learning_path_length = len;
            }
            "gaps.difficulty_preference" => {
                self.gaps.difficulty_preference = DifficultyLevel::parse(value).ok_or_else(|| {
                    anyhow!(
                        "Invalid difficulty: {}. Valid options: beginner, intermediate, advanced",
                        value
                    )
                })?;
            }

            "links.max_hops" => {
                let hops: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_hops value: {}", value))?;
                if !(1..=6).contains(&hops) {
                    return Err(anyhow!("max_hops must be between 1 and 6"));
                }
                self.links.max_hops = hops;
            }
            "links.min_confidence_score" => {
                let score: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid min_confidence_score value: {}", value))?;
                if !(0.0..=100.0).contains(&score) {
                    return Err(anyhow!("min_confidence_score must be between 0 and 100"));
                }
                self.links.min_confidence_score = score;
            }
            "links.max_links_to_return" => {
                self.links.max_links_to_return = value
                    .parse()
                    .with_context(|| format!("Invalid max_links_to_return value: {}", value))?;
            }
            "links.worker_count" => {
                let workers: usize = value
                    .parse()
                    .with_context(|| format!("Invalid worker_count value: {}", value))?;
                if workers == 0 {
                    return Err(anyhow!("worker_count must be at least 1"));
                }
                self.links.worker_count = workers;
            }

            "ranking.max_results" => {
                self.ranking.max_results = value
                    .parse()
                    .with_context(|| format!("Invalid max_results value: {}", value))?;
            }
            "ranking.min_unified_score" => {
                self.ranking.min_unified_score = value
                    .parse()
                    .with_context(|| format!("Invalid min_unified_score value: {}", value))?;
            }

            "ontology.endpoints" => {
                return Err(anyhow!(
                    "Endpoints are edited in the config file directly: {}",
                    Self::config_path()?.display()
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `conceptlens config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "ontology.endpoints",
            "ontology.timeout_secs",
            "ontology.user_agent",
            "ontology.languages",
            "ontology.cache_ttl_secs",
            "gaps.max_gaps_to_return",
            "gaps.min_gap_score",
            "gaps.max_learning_path_length",
            "gaps.difficulty_preference",
            "links.max_hops",
            "links.min_confidence_score",
            "links.max_links_to_return",
            "links.worker_count",
            "ranking.max_results",
            "ranking.min_unified_score",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
