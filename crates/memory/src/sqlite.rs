//! SQLite stores for knowledge chunks, the conversation log, and summaries.
//!
//! One database file, three tables:
//! - `knowledge_chunks`: labor-code excerpts with their embeddings
//! - `conversation_messages`: the append-only message log
//! - `conversation_summaries`: digests written by the external summarizer
//!
//! Embeddings are little-endian `f32` BLOBs; similarity is computed in Rust.

use crate::vector::{blob_to_embedding, embedding_to_blob, rank_by_similarity, MIN_RELATED_SIMILARITY};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hrcounsel_core::error::StoreError;
use hrcounsel_core::knowledge::{KnowledgeChunk, KnowledgeQuery, KnowledgeStore, SearchResult};
use hrcounsel_core::memory::{ConversationStore, SimilarQuery, SummaryStore};
use hrcounsel_core::message::{
    ConversationSummary, Message, MessageType, SessionId, SessionKey, SimilarMessage,
};
use hrcounsel_core::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed implementation of every store trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database exists per connection, so pin the pool to one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "knowledge_chunks table",
                r#"
                CREATE TABLE IF NOT EXISTS knowledge_chunks (
                    iid            INTEGER PRIMARY KEY AUTOINCREMENT,
                    id             TEXT UNIQUE NOT NULL,
                    content        TEXT NOT NULL,
                    section        TEXT NOT NULL,
                    article_number TEXT,
                    topics         TEXT NOT NULL DEFAULT '[]',
                    allowed_roles  TEXT NOT NULL DEFAULT '[]',
                    embedding      BLOB NOT NULL
                )
                "#,
            ),
            (
                "conversation_messages table",
                r#"
                CREATE TABLE IF NOT EXISTS conversation_messages (
                    iid              INTEGER PRIMARY KEY AUTOINCREMENT,
                    id               TEXT UNIQUE NOT NULL,
                    session_id       TEXT NOT NULL,
                    user_id          TEXT NOT NULL,
                    role             TEXT NOT NULL,
                    message_type     TEXT NOT NULL,
                    content          TEXT NOT NULL,
                    created_at       TEXT NOT NULL,
                    sources          TEXT,
                    related_articles TEXT,
                    embedding        BLOB,
                    token_estimate   INTEGER NOT NULL DEFAULT 0
                )
                "#,
            ),
            (
                "conversation_messages session index",
                "CREATE INDEX IF NOT EXISTS idx_messages_session
                 ON conversation_messages(user_id, role, session_id, created_at)",
            ),
            (
                "conversation_summaries table",
                r#"
                CREATE TABLE IF NOT EXISTS conversation_summaries (
                    iid                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id             TEXT NOT NULL,
                    role                TEXT NOT NULL,
                    session_id          TEXT,
                    summary             TEXT NOT NULL,
                    key_topics          TEXT NOT NULL DEFAULT '[]',
                    articles_referenced TEXT NOT NULL DEFAULT '[]',
                    created_at          TEXT NOT NULL
                )
                "#,
            ),
            (
                "conversation_summaries index",
                "CREATE INDEX IF NOT EXISTS idx_summaries_user
                 ON conversation_summaries(user_id, role, created_at DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Record a summary. Called by the external summarizer and by tooling.
    pub async fn insert_summary(&self, summary: &ConversationSummary) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_summaries
                (user_id, role, session_id, summary, key_topics, articles_referenced, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&summary.user_id)
        .bind(summary.role.as_str())
        .bind(summary.session_id.as_ref().map(|s| s.as_str()))
        .bind(&summary.summary)
        .bind(to_json(&summary.key_topics)?)
        .bind(to_json(&summary.articles_referenced)?)
        .bind(timestamp(&summary.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("summary INSERT failed: {e}")))?;
        Ok(())
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<KnowledgeChunk, StoreError> {
        let topics: String = column(row, "topics")?;
        let roles: String = column(row, "allowed_roles")?;
        let blob: Vec<u8> = column(row, "embedding")?;

        Ok(KnowledgeChunk {
            id: column(row, "id")?,
            content: column(row, "content")?,
            section: column(row, "section")?,
            article_number: column(row, "article_number")?,
            topics: from_json(&topics)?,
            allowed_roles: from_json::<BTreeSet<Role>>(&roles)?,
            embedding: blob_to_embedding(&blob),
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
        let role: String = column(row, "role")?;
        let message_type: String = column(row, "message_type")?;
        let created_at: String = column(row, "created_at")?;
        let sources: Option<String> = column(row, "sources")?;
        let related: Option<String> = column(row, "related_articles")?;
        let session_id: String = column(row, "session_id")?;
        let blob: Option<Vec<u8>> = column(row, "embedding")?;
        let token_estimate: i64 = column(row, "token_estimate")?;

        Ok(Message {
            id: column(row, "id")?,
            session_id: SessionId(session_id),
            user_id: column(row, "user_id")?,
            role: parse_role(&role)?,
            message_type: MessageType::from_str(&message_type).map_err(StoreError::QueryFailed)?,
            content: column(row, "content")?,
            created_at: parse_timestamp(&created_at)?,
            sources: sources.as_deref().map(from_json).transpose()?,
            related_articles: related.as_deref().map(from_json).transpose()?,
            embedding: blob.map(|b| blob_to_embedding(&b)),
            token_estimate: token_estimate.max(0) as usize,
        })
    }

    fn row_to_summary(row: &SqliteRow) -> Result<ConversationSummary, StoreError> {
        let role: String = column(row, "role")?;
        let session_id: Option<String> = column(row, "session_id")?;
        let key_topics: String = column(row, "key_topics")?;
        let articles: String = column(row, "articles_referenced")?;
        let created_at: String = column(row, "created_at")?;

        Ok(ConversationSummary {
            user_id: column(row, "user_id")?,
            role: parse_role(&role)?,
            session_id: session_id.map(SessionId),
            summary: column(row, "summary")?,
            key_topics: from_json(&key_topics)?,
            articles_referenced: from_json(&articles)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Storage(format!("JSON encode: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::QueryFailed(format!("JSON decode: {e}")))
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse::<Role>()
        .map_err(|e| StoreError::QueryFailed(e.to_string()))
}

/// Fixed-width RFC 3339 so lexicographic order equals chronological order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("created_at: {e}")))
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, StoreError> {
        // Role names are a closed set of plain words, safe inside a LIKE pattern.
        let role_pattern = format!("%\"{}\"%", query.role.as_str());
        let rows = sqlx::query("SELECT * FROM knowledge_chunks WHERE allowed_roles LIKE ?1")
            .bind(role_pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("knowledge scan: {e}")))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk = Self::row_to_chunk(row)?;
            if chunk.embedding.len() != query.embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: chunk.embedding.len(),
                    actual: query.embedding.len(),
                });
            }
            if chunk.is_visible_to(query.role) {
                let embedding = chunk.embedding.clone();
                candidates.push((chunk, embedding));
            }
        }

        Ok(rank_by_similarity(candidates, &query.embedding, query.limit, query.threshold)
            .into_iter()
            .map(|(chunk, similarity)| SearchResult { chunk, similarity })
            .collect())
    }

    async fn insert(&self, mut chunk: KnowledgeChunk) -> Result<String, StoreError> {
        if chunk.id.is_empty() {
            chunk.id = Uuid::new_v4().to_string();
        }

        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks
                (id, content, section, article_number, topics, allowed_roles, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                section = excluded.section,
                article_number = excluded.article_number,
                topics = excluded.topics,
                allowed_roles = excluded.allowed_roles,
                embedding = excluded.embedding
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.content)
        .bind(&chunk.section)
        .bind(&chunk.article_number)
        .bind(to_json(&chunk.topics)?)
        .bind(to_json(&chunk.allowed_roles)?)
        .bind(embedding_to_blob(&chunk.embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("chunk INSERT failed: {e}")))?;

        Ok(chunk.id)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM knowledge_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let n: i64 = column(&row, "n")?;
        Ok(n as usize)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM knowledge_chunks")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_messages
                (id, session_id, user_id, role, message_type, content, created_at,
                 sources, related_articles, embedding, token_estimate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&message.id)
        .bind(message.session_id.as_str())
        .bind(&message.user_id)
        .bind(message.role.as_str())
        .bind(message.message_type.as_str())
        .bind(&message.content)
        .bind(timestamp(&message.created_at))
        .bind(message.sources.as_ref().map(to_json).transpose()?)
        .bind(message.related_articles.as_ref().map(to_json).transpose()?)
        .bind(message.embedding.as_deref().map(embedding_to_blob))
        .bind(message.token_estimate as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("message INSERT failed: {e}")))?;

        debug!(session_id = %message.session_id, kind = message.message_type.as_str(), "Appended message");
        Ok(())
    }

    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversation_messages
            WHERE user_id = ?1 AND role = ?2 AND session_id = ?3
            ORDER BY created_at DESC, iid DESC
            LIMIT ?4
            "#,
        )
        .bind(&key.user_id)
        .bind(key.role.as_str())
        .bind(key.session_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn search_similar(&self, query: &SimilarQuery) -> Result<Vec<SimilarMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversation_messages
            WHERE user_id = ?1 AND role = ?2 AND session_id != ?3 AND embedding IS NOT NULL
            "#,
        )
        .bind(&query.user_id)
        .bind(query.role.as_str())
        .bind(query.exclude_session.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("similar messages: {e}")))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let message = Self::row_to_message(row)?;
            if let Some(embedding) = message.embedding.clone() {
                candidates.push((message, embedding));
            }
        }

        Ok(rank_by_similarity(candidates, &query.embedding, query.limit, MIN_RELATED_SIMILARITY)
            .into_iter()
            .map(|(message, similarity)| SimilarMessage {
                message,
                similarity: similarity.min(1.0),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM conversation_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let n: i64 = column(&row, "n")?;
        Ok(n as usize)
    }
}

#[async_trait]
impl SummaryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn recent(
        &self,
        user_id: &str,
        role: Role,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversation_summaries
            WHERE user_id = ?1 AND role = ?2
            ORDER BY created_at DESC, iid DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent summaries: {e}")))?;

        rows.iter().map(Self::row_to_summary).collect()
    }
}
