//! Knowledge base trait: pre-embedded labor-code excerpts with role-scoped
//! semantic search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::StoreError;
use crate::message::SourceCitation;
use crate::role::Role;

/// A single excerpt of the labor code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Unique chunk ID
    pub id: String,

    /// The excerpt text
    pub content: String,

    /// Book / title / chapter the excerpt belongs to
    pub section: String,

    /// Article number, when the excerpt sits under an article heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_number: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    /// Roles allowed to see this chunk
    pub allowed_roles: BTreeSet<Role>,

    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl KnowledgeChunk {
    pub fn is_visible_to(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// A chunk matched by a search, with its cosine similarity.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: KnowledgeChunk,
    pub similarity: f32,
}

impl SearchResult {
    /// The citation shown to callers and stored with the answer.
    pub fn citation(&self) -> SourceCitation {
        SourceCitation {
            section: self.chunk.section.clone(),
            article: self.chunk.article_number.clone(),
            topics: self.chunk.topics.clone(),
            similarity: (self.similarity.clamp(0.0, 1.0) * 100.0).round() as u8,
        }
    }
}

/// A role-scoped nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct KnowledgeQuery {
    pub embedding: Vec<f32>,
    pub role: Role,
    /// Minimum cosine similarity for a result to be returned
    pub threshold: f32,
    pub limit: usize,
}

/// Storage for knowledge chunks.
///
/// `search` results are sorted by non-increasing similarity, all at or above
/// the threshold, and never include chunks the role may not see. An empty
/// result is success, distinct from an error.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, StoreError>;

    /// Insert a chunk, returning its ID.
    async fn insert(&self, chunk: KnowledgeChunk) -> Result<String, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Remove every chunk (used before a full re-ingest).
    async fn clear(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(roles: &[Role]) -> KnowledgeChunk {
        KnowledgeChunk {
            id: "c1".into(),
            content: "Termination by employer".into(),
            section: "BOOK VI - Title I".into(),
            article_number: Some("295".into()),
            topics: vec!["termination".into()],
            allowed_roles: roles.iter().copied().collect(),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn citation_rounds_similarity_to_percent() {
        let result = SearchResult { chunk: chunk(&Role::ALL), similarity: 0.9149 };
        let citation = result.citation();
        assert_eq!(citation.similarity, 91);
        assert_eq!(citation.article.as_deref(), Some("295"));
        assert_eq!(citation.topics, vec!["termination".to_string()]);
    }

    #[test]
    fn visibility_follows_allowed_roles() {
        let c = chunk(&[Role::Recruiter, Role::Admin]);
        assert!(!c.is_visible_to(Role::Candidate));
        assert!(c.is_visible_to(Role::Admin));
    }
}
