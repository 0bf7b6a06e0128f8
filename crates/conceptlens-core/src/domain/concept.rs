//! Shared concept primitives
//!
//! Normalization, deterministic identifiers, difficulty levels and the
//! call guard that bounds every suspension point with a deadline and a
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Normalize a concept label: trimmed, lowercase, single spaces
pub fn normalize(concept: &str) -> String {
    concept
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a concept set, dropping blanks and duplicates while keeping
/// first-seen order
pub fn normalize_all(concepts: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    concepts
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Order-independent key for a concept set
pub fn concept_set_key(concepts: &[String]) -> String {
    let mut sorted = normalize_all(concepts);
    sorted.sort();
    sorted.join("|")
}

/// Stable identifier derived from content, so recomputing the same item
/// yields the same id
pub fn deterministic_id(kind: &str, key: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}:{}", kind, key).as_bytes()).to_string()
}

/// Learner difficulty level
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" | "easy" => Some(Self::Beginner),
            "intermediate" | "medium" => Some(Self::Intermediate),
            "advanced" | "hard" => Some(Self::Advanced),
            _ => None,
        }
    }

    /// Ordinal used for distance between levels
    pub fn rank(&self) -> u8 {
        match self {
            Self::Beginner => 0,
            Self::Intermediate => 1,
            Self::Advanced => 2,
        }
    }
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deadline and cancellation applied to a single external call
///
/// Cloned guards share the same cancellation token, so cancelling the
/// token aborts every in-flight call of a request.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    token: CancellationToken,
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl CallGuard {
    /// Create a guard with its own cancellation token
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            token: CancellationToken::new(),
        }
    }

    /// Share an existing cancellation token
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run a fallible future under this guard's deadline and token
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.timeout.as_millis() as u64)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Machine   Learning "), "machine learning");
        assert_eq!(normalize("Rust"), "rust");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_normalize_all_drops_blanks_and_duplicates() {
        let concepts = vec![
            "Physics".to_string(),
            " ".to_string(),
            "physics".to_string(),
            "Chemistry".to_string(),
        ];
        assert_eq!(normalize_all(&concepts), vec!["physics", "chemistry"]);
    }

    #[test]
    fn test_concept_set_key_is_order_independent() {
        let a = vec!["b".to_string(), "A".to_string()];
        let b = vec!["a".to_string(), "b".to_string()];
        assert_eq!(concept_set_key(&a), concept_set_key(&b));
        assert_eq!(concept_set_key(&a), "a|b");
    }

    #[test]
    fn test_deterministic_id() {
        assert_eq!(deterministic_id("gap", "x"), deterministic_id("gap", "x"));
        assert_ne!(deterministic_id("gap", "x"), deterministic_id("link", "x"));
    }

    #[test]
    fn test_difficulty_parsing_and_rank() {
        assert_eq!(DifficultyLevel::parse("ADVANCED"), Some(DifficultyLevel::Advanced));
        assert_eq!(DifficultyLevel::parse("easy"), Some(DifficultyLevel::Beginner));
        assert_eq!(DifficultyLevel::parse("expert"), None);
        assert!(DifficultyLevel::Beginner.rank() < DifficultyLevel::Advanced.rank());
        assert_eq!(DifficultyLevel::default(), DifficultyLevel::Intermediate);
    }

    #[tokio::test]
    async fn test_call_guard_passes_result_through() {
        let guard = CallGuard::new(Duration::from_secs(1));
        let value = guard.run(async { Ok::<_, Error>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_guard_times_out() {
        let guard = CallGuard::new(Duration::from_millis(50));
        let result = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(50))));
    }

    #[tokio::test]
    async fn test_call_guard_respects_cancellation() {
        let guard = CallGuard::new(Duration::from_secs(5));
        guard.token().cancel();
        let result = guard.run(async { Ok::<_, Error>(1) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
