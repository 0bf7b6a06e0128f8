//! Context retriever trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::bundle::ContextBundle;

/// Source of a user's internal notes and excerpts for a concept
///
/// Implementations must be deterministic for a given store state and must
/// return an empty bundle, not an error, when nothing matches. Errors are
/// reserved for the store itself being unreachable.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Retrieve the context bundle for a concept
    async fn get_context_bundle(&self, concept: &str) -> Result<ContextBundle>;
}

#[async_trait]
impl<T: ContextRetriever + ?Sized> ContextRetriever for Arc<T> {
    async fn get_context_bundle(&self, concept: &str) -> Result<ContextBundle> {
        (**self).get_context_bundle(concept).await
    }
}
