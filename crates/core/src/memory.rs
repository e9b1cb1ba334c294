//! Conversation memory traits.
//!
//! Short-term memory is the verbatim log of the live session. Long-term
//! memory comes in two forms: compressed summaries of earlier sessions and
//! semantic search over the raw log of those sessions.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ConversationSummary, Message, SessionId, SessionKey, SimilarMessage};
use crate::role::Role;

/// Cross-session similarity query.
#[derive(Debug, Clone)]
pub struct SimilarQuery {
    pub user_id: String,
    pub role: Role,
    /// Messages of this session are never returned
    pub exclude_session: SessionId,
    pub embedding: Vec<f32>,
    pub limit: usize,
}

/// Append-only message log.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Durably append a message. Messages are never updated or deleted.
    async fn append(&self, message: &Message) -> Result<(), StoreError>;

    /// The most recent `limit` messages of exactly this session, oldest first.
    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Messages from the user's other sessions in this role, most similar first.
    async fn search_similar(&self, query: &SimilarQuery) -> Result<Vec<SimilarMessage>, StoreError>;

    /// Total number of logged messages.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Read access to externally produced session summaries.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    fn name(&self) -> &str;

    /// The most recent `limit` summaries for (user, role), newest first.
    async fn recent(
        &self,
        user_id: &str,
        role: Role,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, StoreError>;
}
