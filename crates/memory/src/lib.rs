//! Store implementations for hrcounsel.
//!
//! - [`in_memory`]: Vec-backed stores for tests and ephemeral runs
//! - [`sqlite`]: durable stores on a single SQLite file
//! - [`ingest`]: labor-code parsing and knowledge-base population

pub mod in_memory;
pub mod ingest;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::{InMemoryConversationStore, InMemoryKnowledgeStore, InMemorySummaryStore};
pub use ingest::{ingest_document, parse_document, IngestReport, ParsedChunk};
pub use vector::{cosine_similarity, rank_by_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
