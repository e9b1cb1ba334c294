//! # hrcounsel Core
//!
//! Domain types, traits, and error definitions for the hrcounsel labor-law
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! Every external capability the assistant needs (embedding, knowledge search,
//! the conversation log, summaries, text generation, identity) is a trait
//! here. Implementations live in their respective crates, so tests can
//! substitute call-counting mocks for any of them.

pub mod error;
pub mod role;
pub mod message;
pub mod knowledge;
pub mod memory;
pub mod embedding;
pub mod provider;
pub mod identity;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{AssistantError, AuthError, Error, ProviderError, Result, StoreError};
pub use role::{Principal, Role};
pub use message::{
    ConversationSummary, Message, MessageType, Session, SessionId, SessionKey, SimilarMessage,
    SourceCitation,
};
pub use knowledge::{KnowledgeChunk, KnowledgeQuery, KnowledgeStore, SearchResult};
pub use memory::{ConversationStore, SimilarQuery, SummaryStore};
pub use embedding::EmbeddingProvider;
pub use provider::{ChatMessage, ChatRole, Provider, ProviderRequest, ProviderResponse};
pub use identity::{IdentityResolver, StaticTokenResolver};
pub use event::{DomainEvent, EventBus};
