//! Builds the conversation pipeline and its collaborators from config.
//!
//! Shared by the HTTP gateway and the CLI, so both run the exact same
//! stack: one provider router, one set of stores, one identity chain.

use std::path::PathBuf;
use std::sync::Arc;

use hrcounsel_assistant::{AssistantSettings, ConversationSession, ProviderSynthesizer};
use hrcounsel_config::{AppConfig, StorageConfig};
use hrcounsel_core::error::{ProviderError, StoreError};
use hrcounsel_core::{
    ConversationStore, EmbeddingProvider, Error, EventBus, KnowledgeStore, SummaryStore,
};
use hrcounsel_memory::{InMemoryConversationStore, InMemoryKnowledgeStore, InMemorySummaryStore, SqliteStore};
use hrcounsel_security::ResolverChain;
use tracing::{info, warn};

/// The three stores behind a turn.
#[derive(Clone)]
pub struct Stores {
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            knowledge: Arc::new(InMemoryKnowledgeStore::new()),
            conversations: Arc::new(InMemoryConversationStore::new()),
            summaries: Arc::new(InMemorySummaryStore::new()),
        }
    }

    /// Open the backend named by `[storage]`.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.backend.as_str() {
            "memory" => Ok(Self::in_memory()),
            _ => {
                if let Some(dir) = database_dir(config) {
                    std::fs::create_dir_all(&dir).map_err(|e| {
                        StoreError::Storage(format!("Cannot create {}: {e}", dir.display()))
                    })?;
                }
                let store = Arc::new(SqliteStore::new(&config.database_url()).await?);
                Ok(Self {
                    knowledge: store.clone(),
                    conversations: store.clone(),
                    summaries: store,
                })
            }
        }
    }
}

/// Directory that has to exist before SQLite can create its file.
fn database_dir(config: &StorageConfig) -> Option<PathBuf> {
    match config.path.as_deref() {
        Some(p) if p.starts_with("sqlite:") => None,
        Some(p) => PathBuf::from(p).parent().map(PathBuf::from).filter(|d| !d.as_os_str().is_empty()),
        None => Some(AppConfig::config_dir()),
    }
}

/// Everything needed to answer questions and maintain the knowledge base.
pub struct Services {
    pub session: Arc<ConversationSession>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub stores: Stores,
    pub identity: Arc<ResolverChain>,
    pub events: Arc<EventBus>,
}

/// Wire providers, stores and identity resolution from `config`.
pub async fn build_services(config: &AppConfig) -> Result<Services, Error> {
    let router = hrcounsel_providers::build_from_config(config);
    let provider = router.default().ok_or_else(|| {
        ProviderError::NotConfigured(format!("default provider '{}'", config.default_provider))
    })?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(hrcounsel_providers::build_embedder(config, &router)?);

    let stores = Stores::open(&config.storage).await?;
    let identity = Arc::new(hrcounsel_security::build_from_config(config));
    if identity.is_empty() {
        warn!("No credentials configured; set auth.token_secret or auth.tokens to accept questions");
    }

    let settings = AssistantSettings::from_config(config);
    let synthesizer = Arc::new(ProviderSynthesizer::new(provider, &settings));
    let events = Arc::new(EventBus::default());

    let session = Arc::new(ConversationSession::new(
        embedder.clone(),
        stores.knowledge.clone(),
        stores.conversations.clone(),
        stores.summaries.clone(),
        synthesizer,
        identity.clone(),
        events.clone(),
        settings,
    ));

    info!(
        provider = %config.default_provider,
        model = %config.generation.model,
        embedding_model = %config.embedding.model,
        storage = %config.storage.backend,
        resolvers = ?identity.names(),
        "Services ready"
    );

    Ok(Services {
        session,
        embedder,
        stores,
        identity,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_builds_services() {
        let mut config = AppConfig::default();
        config.storage.backend = "memory".into();
        config.api_key = Some("sk-test".into());
        config.auth.token_secret = Some("s3cret".into());

        let services = build_services(&config).await.unwrap();
        assert_eq!(services.stores.knowledge.name(), "in_memory");
        assert_eq!(services.identity.len(), 1);
        assert_eq!(services.embedder.dimension(), 1536);
    }

    #[tokio::test]
    async fn sqlite_backend_opens_in_memory_url() {
        let config = StorageConfig {
            backend: "sqlite".into(),
            path: Some("sqlite::memory:".into()),
        };
        let stores = Stores::open(&config).await.unwrap();
        assert_eq!(stores.conversations.name(), "sqlite");
        assert_eq!(stores.knowledge.count().await.unwrap(), 0);
    }

    #[test]
    fn database_dir_for_plain_paths() {
        let config = StorageConfig {
            backend: "sqlite".into(),
            path: Some("/var/lib/hrcounsel/app.db".into()),
        };
        assert_eq!(database_dir(&config), Some(PathBuf::from("/var/lib/hrcounsel")));
        let url = StorageConfig {
            backend: "sqlite".into(),
            path: Some("sqlite::memory:".into()),
        };
        assert_eq!(database_dir(&url), None);
    }
}
