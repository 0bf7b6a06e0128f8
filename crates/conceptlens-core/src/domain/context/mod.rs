//! Internal context retrieval boundary
//!
//! The context store that holds a user's notes and book excerpts is an
//! external collaborator. This module defines the single operation the
//! engine consumes from it, plus an in-memory adapter used by the CLI and
//! by tests.

mod bundle;
mod memory;
mod retriever;

pub use bundle::{BookExcerpt, ContextBundle, NoteExcerpt, QueryMetadata};
pub use memory::{InMemoryContextStore, StoredExcerpt, StoredNote};
pub use retriever::ContextRetriever;
