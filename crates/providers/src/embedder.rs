//! Embedding adapter: exposes a [`Provider`]'s `/embeddings` support as an
//! [`EmbeddingProvider`] with a fixed, checked dimension.

use async_trait::async_trait;
use hrcounsel_core::embedding::EmbeddingProvider;
use hrcounsel_core::error::ProviderError;
use hrcounsel_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tracing::debug;

/// Embeds single texts through a provider, rejecting degenerate vectors.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for ProviderEmbedder {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".into()))?;

        if embedding.len() != self.dimension {
            return Err(ProviderError::InvalidResponse(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimension
            )));
        }

        if embedding.iter().all(|v| *v == 0.0) {
            return Err(ProviderError::InvalidResponse("zero embedding vector".into()));
        }

        debug!(model = %self.model, chars = text.len(), "Embedded text");
        Ok(embedding)
    }
}
