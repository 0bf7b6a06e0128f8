//! In-memory context store
//!
//! Holds notes, book excerpts and explicit concept relations, and answers
//! context bundle queries by tag-free concept matching. Loadable from a
//! JSON document so the CLI can run against exported user data.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::concept::normalize;
use crate::error::{Error, Result};

use super::bundle::{BookExcerpt, ContextBundle, NoteExcerpt, QueryMetadata};
use super::retriever::ContextRetriever;

/// A stored note with the concepts it was tagged with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNote {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// A stored book excerpt with the concepts it was tagged with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExcerpt {
    pub book_id: String,
    pub book_title: String,
    pub text: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// In-memory implementation of [`ContextRetriever`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryContextStore {
    #[serde(default)]
    notes: Vec<StoredNote>,
    #[serde(default)]
    excerpts: Vec<StoredExcerpt>,
    /// Explicit concept → related concepts edges
    #[serde(default)]
    relations: BTreeMap<String, Vec<String>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store from its JSON representation
    ///
    /// Every note needs a non-blank id.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let store: Self = serde_json::from_str(json)?;
        if let Some(pos) = store.notes.iter().position(|n| n.id.trim().is_empty()) {
            return Err(Error::InvalidInput(format!("note #{} has no id", pos + 1)));
        }
        Ok(store)
    }

    /// Load a store from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ContextRetrievalFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn with_note(mut self, note: StoredNote) -> Self {
        self.add_note(note);
        self
    }

    pub fn with_excerpt(mut self, excerpt: StoredExcerpt) -> Self {
        self.add_excerpt(excerpt);
        self
    }

    pub fn with_relation(mut self, concept: &str, related: &[&str]) -> Self {
        for r in related {
            self.add_relation(concept, r);
        }
        self
    }

    pub fn add_note(&mut self, note: StoredNote) {
        self.notes.push(note);
    }

    pub fn add_excerpt(&mut self, excerpt: StoredExcerpt) {
        self.excerpts.push(excerpt);
    }

    /// Add a relation; stored under the normalized concept, no duplicates
    pub fn add_relation(&mut self, concept: &str, related: &str) {
        let related = normalize(related);
        let entry = self.relations.entry(normalize(concept)).or_default();
        if !related.is_empty() && !entry.contains(&related) {
            entry.push(related);
        }
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn excerpt_count(&self) -> usize {
        self.excerpts.len()
    }

    fn mentions(tagged: &[String], text: &str, concept: &str) -> bool {
        tagged.iter().any(|c| normalize(c) == concept) || text.to_lowercase().contains(concept)
    }

    fn bundle_for(&self, concept: &str) -> ContextBundle {
        let started = Instant::now();
        let concept = normalize(concept);
        if concept.is_empty() {
            return ContextBundle::empty(concept);
        }

        let mut related: BTreeSet<String> = BTreeSet::new();

        let notes: Vec<NoteExcerpt> = self
            .notes
            .iter()
            .filter(|n| {
                Self::mentions(&n.concepts, &format!("{} {}", n.title, n.content), &concept)
            })
            .inspect(|n| related.extend(n.concepts.iter().map(|c| normalize(c))))
            .map(|n| NoteExcerpt {
                id: n.id.clone(),
                title: n.title.clone(),
                content: n.content.clone(),
                tags: n.tags.clone(),
            })
            .collect();

        let book_excerpts: Vec<BookExcerpt> = self
            .excerpts
            .iter()
            .filter(|e| Self::mentions(&e.concepts, &e.text, &concept))
            .inspect(|e| related.extend(e.concepts.iter().map(|c| normalize(c))))
            .map(|e| BookExcerpt {
                book_id: e.book_id.clone(),
                book_title: e.book_title.clone(),
                text: e.text.clone(),
                page: e.page,
                tags: e.tags.clone(),
            })
            .collect();

        if let Some(explicit) = self.relations.get(&concept) {
            related.extend(explicit.iter().cloned());
        }
        // Relations are symmetric from the reader's point of view
        for (source, targets) in &self.relations {
            if targets.iter().any(|t| t == &concept) {
                related.insert(source.clone());
            }
        }
        related.remove(&concept);
        related.retain(|c| !c.is_empty());

        let result_count = notes.len() + book_excerpts.len();
        ContextBundle {
            concept,
            notes,
            book_excerpts,
            related_concepts: related.into_iter().collect(),
            query_metadata: QueryMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                result_count,
            },
        }
    }
}

#[async_trait]
impl ContextRetriever for InMemoryContextStore {
    async fn get_context_bundle(&self, concept: &str) -> Result<ContextBundle> {
        let bundle = self.bundle_for(concept);
        debug!(
            concept = %bundle.concept,
            results = bundle.query_metadata.result_count,
            related = bundle.related_concepts.len(),
            "Context bundle retrieved"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryContextStore {
        InMemoryContextStore::new()
            .with_note(StoredNote {
                id: "n1".into(),
                title: "Thermodynamics".into(),
                content: "Entropy always increases in a closed system".into(),
                tags: vec!["physics".into()],
                concepts: vec!["entropy".into(), "Heat".into()],
            })
            .with_excerpt(StoredExcerpt {
                book_id: "b1".into(),
                book_title: "Information Theory".into(),
                text: "Shannon entropy measures uncertainty".into(),
                page: Some(12),
                tags: vec!["information".into()],
                concepts: vec!["entropy".into(), "information theory".into()],
            })
            .with_relation("entropy", &["disorder"])
            .with_relation("statistical mechanics", &["entropy"])
    }

    #[tokio::test]
    async fn test_bundle_collects_notes_excerpts_and_relations() {
        let bundle = store().get_context_bundle("Entropy").await.unwrap();

        assert_eq!(bundle.concept, "entropy");
        assert_eq!(bundle.notes.len(), 1);
        assert_eq!(bundle.book_excerpts.len(), 1);
        assert_eq!(bundle.query_metadata.result_count, 2);
        assert_eq!(
            bundle.related_concepts,
            vec!["disorder", "heat", "information theory", "statistical mechanics"]
        );
    }

    #[tokio::test]
    async fn test_miss_returns_empty_bundle() {
        let bundle = store().get_context_bundle("quantum chromodynamics").await.unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.query_metadata.result_count, 0);
    }

    #[tokio::test]
    async fn test_retrieval_is_deterministic() {
        let store = store();
        let a = store.get_context_bundle("entropy").await.unwrap();
        let b = store.get_context_bundle("entropy").await.unwrap();
        assert_eq!(a.notes, b.notes);
        assert_eq!(a.related_concepts, b.related_concepts);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "notes": [{"id": "n1", "title": "t", "content": "graph theory", "concepts": ["graphs"]}],
            "relations": {"graphs": ["trees"]}
        }"#;
        let store = InMemoryContextStore::from_json_str(json).unwrap();
        assert_eq!(store.note_count(), 1);
        assert_eq!(store.excerpt_count(), 0);
    }

    #[test]
    fn test_note_without_id_is_rejected() {
        let json = r#"{"notes": [{"id": " ", "title": "t", "content": "c"}]}"#;
        let err = InMemoryContextStore::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(err.code(), "E001");
    }

    #[test]
    fn test_missing_file_is_a_retrieval_failure() {
        let err = InMemoryContextStore::load(Path::new("/nonexistent/conceptlens/context.json"))
            .unwrap_err();
        assert!(matches!(err, Error::ContextRetrievalFailed(_)));
        assert!(err.to_string().contains("context.json"));
        assert!(err.is_dependency_error());
    }

    #[test]
    fn test_add_relation_deduplicates() {
        let mut store = InMemoryContextStore::new();
        store.add_relation("A", "B");
        store.add_relation("a", "b");
        assert_eq!(store.relations.get("a").map(|v| v.len()), Some(1));
    }
}
