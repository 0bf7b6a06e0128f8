//! Error types for ConceptLens

use thiserror::Error;

/// Result type alias using ConceptLens's Error
pub type Result<T> = std::result::Result<T, Error>;

/// ConceptLens error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (E001-E099)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Dependency errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Ontology provider '{provider}' failed: {message}")]
    OntologyProviderFailed { provider: String, message: String },

    #[error("Context retrieval failed: {0}")]
    ContextRetrievalFailed(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No external ontology data available: {0}")]
    ExternalDataUnavailable(String),

    // Computation errors (E200-E299)
    #[error("Path search failed: {0}")]
    PathSearchFailed(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E001",
            Self::NetworkError(_) => "E100",
            Self::OntologyProviderFailed { .. } => "E101",
            Self::ContextRetrievalFailed(_) => "E102",
            Self::Timeout(_) => "E103",
            Self::Cancelled => "E104",
            Self::ExternalDataUnavailable(_) => "E105",
            Self::PathSearchFailed(_) => "E201",
            Self::ConfigError(_) => "E600",
            Self::Serialization(_) => "E900",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::OntologyProviderFailed { provider, .. } => Some(format!(
                "conceptlens config list  # verify the '{}' endpoint",
                provider
            )),
            Self::Timeout(_) => {
                Some("conceptlens config set ontology.timeout_secs <seconds>".to_string())
            }
            Self::ConfigError(_) => Some("conceptlens config reset".to_string()),
            _ => None,
        }
    }

    /// Whether this error comes from an external collaborator
    /// (ontology endpoint, context store) rather than from this crate
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::OntologyProviderFailed { .. }
                | Self::ContextRetrievalFailed(_)
                | Self::Timeout(_)
                | Self::Cancelled
                | Self::ExternalDataUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidInput("x".into()).code(), "E001");
        assert_eq!(Error::Timeout(500).code(), "E103");
        assert_eq!(Error::Cancelled.code(), "E104");
        assert_eq!(Error::PathSearchFailed("x".into()).code(), "E201");
    }

    #[test]
    fn test_provider_failure_message() {
        let error = Error::OntologyProviderFailed {
            provider: "wikidata".into(),
            message: "HTTP 503".into(),
        };
        assert!(error.to_string().contains("wikidata"));
        assert!(error.to_string().contains("HTTP 503"));
        assert!(error.suggestion().unwrap().contains("wikidata"));
        assert!(error.is_dependency_error());
    }

    #[test]
    fn test_computation_errors_are_not_dependency_errors() {
        assert!(!Error::PathSearchFailed("cycle".into()).is_dependency_error());
        assert!(!Error::InvalidInput("".into()).is_dependency_error());
        assert!(Error::Timeout(10).is_dependency_error());
    }

    #[test]
    fn test_timeout_message() {
        let error = Error::Timeout(2500);
        assert!(error.to_string().contains("2500"));
        assert!(error.suggestion().is_some());
    }
}
