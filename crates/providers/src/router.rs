//! Provider router: selects the correct LLM provider based on config.

use std::collections::HashMap;
use std::sync::Arc;
use hrcounsel_core::error::ProviderError;
use hrcounsel_core::provider::Provider;
use crate::embedder::ProviderEmbedder;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes requests to the correct provider by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` table becomes an OpenAI-compatible provider;
/// the default provider and the embedding provider are created from
/// well-known base URLs when not configured explicitly.
pub fn build_from_config(config: &hrcounsel_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    for name in [config.default_provider.as_str(), config.embedding_provider()] {
        if router.get(name).is_none() {
            let api_key = config.api_key.clone().unwrap_or_default();
            router.register(
                name.to_string(),
                Arc::new(OpenAiCompatProvider::new(name, default_base_url(name), api_key)),
            );
        }
    }

    router
}

/// Build the embedder for the configured embedding provider and model.
pub fn build_embedder(
    config: &hrcounsel_config::AppConfig,
    router: &ProviderRouter,
) -> Result<ProviderEmbedder, ProviderError> {
    let name = config.embedding_provider();
    let provider = router
        .get(name)
        .ok_or_else(|| ProviderError::NotConfigured(format!("embedding provider '{name}'")))?;
    Ok(ProviderEmbedder::new(
        provider,
        &config.embedding.model,
        config.embedding.dimension,
    ))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
