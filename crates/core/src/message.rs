//! Conversation log domain types.
//!
//! A question and its answer become two immutable [`Message`]s in an
//! append-only log, keyed by (user, role, session). Summaries of older
//! sessions are produced elsewhere and only read here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live conversation thread for one user in one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub role: Role,
    /// True when the id was minted for this request
    pub is_new: bool,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey {
            user_id: self.user_id.clone(),
            role: self.role,
            session_id: self.id.clone(),
        }
    }
}

/// The (user, role, session) triple every log read is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub role: Role,
    pub session_id: SessionId,
}

/// Who authored a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageType::User),
            "assistant" => Ok(MessageType::Assistant),
            other => Err(format!("unknown message type '{other}'")),
        }
    }
}

/// A knowledge excerpt cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub section: String,

    /// Article number, when the excerpt belongs to one
    pub article: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    /// Similarity as a rounded percentage (0-100)
    pub similarity: u8,
}

/// One immutable entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    pub session_id: SessionId,

    pub user_id: String,

    /// Audience role the conversation runs under
    pub role: Role,

    pub message_type: MessageType,

    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Citations; `None` on user messages, possibly empty on answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,

    /// Article numbers cited; `None` on user messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_articles: Option<Vec<String>>,

    /// Embedding of `content`, when one could be computed
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// Rough size metric, never used for gating
    pub token_estimate: usize,
}

impl Message {
    fn new(key: &SessionKey, message_type: MessageType, content: String) -> Self {
        let token_estimate = estimate_tokens(&content);
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: key.session_id.clone(),
            user_id: key.user_id.clone(),
            role: key.role,
            message_type,
            content,
            created_at: Utc::now(),
            sources: None,
            related_articles: None,
            embedding: None,
            token_estimate,
        }
    }

    /// Create a user question for the given session.
    pub fn user(key: &SessionKey, content: impl Into<String>) -> Self {
        Self::new(key, MessageType::User, content.into())
    }

    /// Create an assistant answer for the given session, with no citations yet.
    pub fn assistant(key: &SessionKey, content: impl Into<String>) -> Self {
        Self {
            sources: Some(Vec::new()),
            related_articles: Some(Vec::new()),
            ..Self::new(key, MessageType::Assistant, content.into())
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_citations(mut self, sources: Vec<SourceCitation>, related_articles: Vec<String>) -> Self {
        self.sources = Some(sources);
        self.related_articles = Some(related_articles);
        self
    }
}

/// A past message matched by embedding similarity.
#[derive(Debug, Clone)]
pub struct SimilarMessage {
    pub message: Message,
    pub similarity: f32,
}

/// A compressed digest of an earlier session, produced by an external process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub user_id: String,

    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    pub summary: String,

    #[serde(default)]
    pub key_topics: Vec<String>,

    #[serde(default)]
    pub articles_referenced: Vec<String>,

    pub created_at: DateTime<Utc>,
}

/// Estimate token count (4 chars per token, rounded up).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey {
            user_id: "u1".into(),
            role: Role::Candidate,
            session_id: SessionId::from("s1"),
        }
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user(&key(), "What is Article 295?");
        assert_eq!(msg.message_type, MessageType::User);
        assert_eq!(msg.session_id.as_str(), "s1");
        assert_eq!(msg.role, Role::Candidate);
        assert!(msg.embedding.is_none());
        assert!(msg.sources.is_none());
        assert!(msg.related_articles.is_none());
    }

    #[test]
    fn answers_carry_citation_lists() {
        let bare = Message::assistant(&key(), "No matching provision.");
        assert_eq!(bare.sources, Some(vec![]));
        assert_eq!(bare.related_articles, Some(vec![]));

        let json = serde_json::to_value(Message::user(&key(), "q")).unwrap();
        assert!(json.get("sources").is_none());
        assert_eq!(serde_json::to_value(&bare).unwrap()["sources"], serde_json::json!([]));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        let msg = Message::assistant(&key(), "12345678901234567890");
        assert_eq!(msg.token_estimate, 5);
    }

    #[test]
    fn fresh_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert!(!SessionId::new().as_str().is_empty());
    }

    #[test]
    fn message_type_round_trips_through_str() {
        assert_eq!("assistant".parse::<MessageType>().unwrap(), MessageType::Assistant);
        assert_eq!(MessageType::User.as_str(), "user");
        assert!("system".parse::<MessageType>().is_err());
    }

    #[test]
    fn embedding_is_not_serialized() {
        let msg = Message::user(&key(), "hi").with_embedding(vec![0.1, 0.2]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("embedding"));
        assert!(json.contains("\"message_type\":\"user\""));
    }
}
