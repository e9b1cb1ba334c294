//! In-memory stores: useful for testing and ephemeral deployments.

use async_trait::async_trait;
use hrcounsel_core::error::StoreError;
use hrcounsel_core::knowledge::{KnowledgeChunk, KnowledgeQuery, KnowledgeStore, SearchResult};
use hrcounsel_core::memory::{ConversationStore, SimilarQuery, SummaryStore};
use hrcounsel_core::message::{ConversationSummary, Message, SessionKey, SimilarMessage};
use hrcounsel_core::Role;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::vector::{rank_by_similarity, MIN_RELATED_SIMILARITY};

/// Knowledge chunks held in a Vec, searched by brute-force cosine similarity.
pub struct InMemoryKnowledgeStore {
    chunks: Arc<RwLock<Vec<KnowledgeChunk>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, StoreError> {
        let chunks = self.chunks.read().await;
        let candidates = chunks
            .iter()
            .filter(|c| c.is_visible_to(query.role))
            .map(|c| (c, c.embedding.clone()));

        Ok(rank_by_similarity(candidates, &query.embedding, query.limit, query.threshold)
            .into_iter()
            .map(|(chunk, similarity)| SearchResult {
                chunk: chunk.clone(),
                similarity,
            })
            .collect())
    }

    async fn insert(&self, mut chunk: KnowledgeChunk) -> Result<String, StoreError> {
        if chunk.id.is_empty() {
            chunk.id = Uuid::new_v4().to_string();
        }
        let id = chunk.id.clone();
        self.chunks.write().await.push(chunk);
        Ok(id)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.chunks.read().await.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.chunks.write().await.clear();
        Ok(())
    }
}

/// Append-only message log held in a Vec.
pub struct InMemoryConversationStore {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of every logged message, in append order.
    pub async fn all(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;
        let mut session: Vec<Message> = messages
            .iter()
            .filter(|m| {
                m.user_id == key.user_id && m.role == key.role && m.session_id == key.session_id
            })
            .cloned()
            .collect();

        session.sort_by_key(|m| m.created_at);
        let skip = session.len().saturating_sub(limit);
        Ok(session.split_off(skip))
    }

    async fn search_similar(&self, query: &SimilarQuery) -> Result<Vec<SimilarMessage>, StoreError> {
        let messages = self.messages.read().await;
        let candidates = messages
            .iter()
            .filter(|m| {
                m.user_id == query.user_id
                    && m.role == query.role
                    && m.session_id != query.exclude_session
            })
            .filter_map(|m| m.embedding.clone().map(|e| (m, e)));

        Ok(rank_by_similarity(candidates, &query.embedding, query.limit, MIN_RELATED_SIMILARITY)
            .into_iter()
            .map(|(message, similarity)| SimilarMessage {
                message: message.clone(),
                similarity: similarity.min(1.0),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.messages.read().await.len())
    }
}

/// Session summaries held in a Vec. Summaries are written by an external
/// process; `insert` exists so tests and tooling can seed them.
pub struct InMemorySummaryStore {
    summaries: Arc<RwLock<Vec<ConversationSummary>>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self {
            summaries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn insert(&self, summary: ConversationSummary) {
        self.summaries.write().await.push(summary);
    }
}

impl Default for InMemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn recent(
        &self,
        user_id: &str,
        role: Role,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let summaries = self.summaries.read().await;
        let mut matching: Vec<ConversationSummary> = summaries
            .iter()
            .filter(|s| s.user_id == user_id && s.role == role)
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
