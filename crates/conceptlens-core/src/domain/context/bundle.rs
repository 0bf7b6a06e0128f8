//! Context bundle returned by the context store

use serde::{Deserialize, Serialize};

/// Internal notes, excerpts and related concepts retrieved for one concept
///
/// Produced fresh per call. A miss is represented by empty collections,
/// never by an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    /// The concept this bundle was retrieved for
    pub concept: String,
    /// Notes mentioning the concept
    pub notes: Vec<NoteExcerpt>,
    /// Book passages mentioning the concept
    pub book_excerpts: Vec<BookExcerpt>,
    /// Concepts the store relates to this one
    pub related_concepts: Vec<String>,
    /// Observability data about the retrieval
    pub query_metadata: QueryMetadata,
}

/// A note excerpt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteExcerpt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A passage from a book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookExcerpt {
    pub book_id: String,
    pub book_title: String,
    pub text: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Retrieval metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub execution_time_ms: u64,
    pub result_count: usize,
}

impl ContextBundle {
    /// An empty bundle for a concept with no internal matches
    pub fn empty(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            ..Default::default()
        }
    }

    /// Number of notes plus excerpts, used as the node weight
    pub fn evidence_count(&self) -> usize {
        self.notes.len() + self.book_excerpts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence_count() == 0 && self.related_concepts.is_empty()
    }

    /// All tags attached to notes and excerpts, lowercased
    pub fn tags(&self) -> impl Iterator<Item = String> + '_ {
        self.notes
            .iter()
            .flat_map(|n| n.tags.iter())
            .chain(self.book_excerpts.iter().flat_map(|e| e.tags.iter()))
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }
}
