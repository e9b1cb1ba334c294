//! Embedding capability: text in, fixed-length vector out.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Turns text into an embedding vector of a fixed dimension.
///
/// Implementations must fail rather than return an empty or zero vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Vector length every successful `embed` returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
