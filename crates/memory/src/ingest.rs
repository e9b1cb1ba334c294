//! Knowledge-base ingestion: labor-code markdown → embedded, role-tagged chunks.
//!
//! Parsing is line-oriented. `BOOK`, `TITLE`/`CHAPTER` and `Article N`
//! headings start a new chunk and update the current section; body lines
//! accumulate until a chunk passes ~1000 characters at a sentence end.

use futures::future::join_all;
use hrcounsel_core::embedding::EmbeddingProvider;
use hrcounsel_core::error::{Error, Result};
use hrcounsel_core::knowledge::{KnowledgeChunk, KnowledgeStore};
use hrcounsel_core::Role;
use regex_lite::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{info, warn};

const MAX_CHUNK_CHARS: usize = 1000;
const MIN_CHUNK_CHARS: usize = 50;
const DEFAULT_SECTION: &str = "General Provisions";

static BOOK_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^book\s+[ivx]+").expect("valid regex"));
static TITLE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(title|chapter)\s+([ivx]+|\d+)").expect("valid regex"));
static ARTICLE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(article|art\.)\s*(\d+)").expect("valid regex"));

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("regularization", &["regular employment", "regularization", "probationary", "six months", "status"]),
    ("termination", &["termination", "dismissal", "separation", "just cause", "authorized cause", "redundancy"]),
    ("wages", &["wage", "salary", "compensation", "minimum wage", "payment"]),
    ("benefits", &["13th month", "sss", "philhealth", "pag-ibig", "benefits", "allowance"]),
    ("leave", &["leave", "vacation", "sick", "maternity", "paternity", "parental"]),
    ("working_hours", &["working hours", "eight hours", "overtime", "night shift", "rest day"]),
    ("contract", &["contract", "employment contract", "agreement", "terms and conditions"]),
    ("rights", &["rights", "protection", "security of tenure", "due process"]),
    ("obligations", &["obligation", "duty", "requirement", "must", "shall"]),
    ("violations", &["violation", "penalty", "sanction", "illegal", "prohibited"]),
];

fn role_patterns(role: Role) -> &'static [&'static str] {
    match role {
        Role::Candidate => &[
            "employment", "termination", "resignation", "probationary", "regular employment",
            "wages", "overtime", "benefits", "13th month", "leave", "holiday",
            "working hours", "rest day", "maternity", "paternity", "sick leave",
            "rights", "employee", "worker", "separation pay", "retirement",
            "discrimination", "harassment", "safety", "health",
        ],
        Role::Recruiter => &[
            "hiring", "recruitment", "employment contract", "probationary period",
            "job posting", "labor standards", "working conditions", "employment status",
            "reporting requirements", "employer obligations", "payroll", "compensation",
            "termination grounds", "dismissal", "regularization", "contractual",
            "compliance", "inspection", "registration",
        ],
        Role::Admin => &[
            "compliance", "penalties", "enforcement", "inspection", "registration",
            "reporting", "documentation", "liability", "administrative", "legal",
            "violations", "sanctions", "authorities", "dole", "labor standards",
            "establishment", "employer registration", "recordkeeping",
        ],
    }
}

/// A parsed chunk, not yet embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChunk {
    pub content: String,
    pub section: String,
    pub article_number: Option<String>,
    pub topics: Vec<String>,
    pub allowed_roles: BTreeSet<Role>,
}

/// Topics whose keyword lists occur in the text, in table order.
pub fn extract_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}

/// Roles the text is relevant to; text matching no role is visible to all.
pub fn role_relevance(text: &str) -> BTreeSet<Role> {
    let lower = text.to_lowercase();
    let roles: BTreeSet<Role> = Role::ALL
        .into_iter()
        .filter(|role| role_patterns(*role).iter().any(|p| lower.contains(p)))
        .collect();

    if roles.is_empty() {
        Role::ALL.into_iter().collect()
    } else {
        roles
    }
}

#[derive(Default)]
struct ParserState {
    book: Option<String>,
    article: Option<String>,
    section: String,
    lines: Vec<String>,
    chunks: Vec<ParsedChunk>,
}

impl ParserState {
    fn current_len(&self) -> usize {
        self.lines.iter().map(|l| l.len()).sum::<usize>() + self.lines.len().saturating_sub(1)
    }

    fn flush(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let text = self.lines.join("\n").trim().to_string();
        self.lines.clear();
        if text.chars().count() < MIN_CHUNK_CHARS {
            return;
        }

        let section = if self.section.is_empty() {
            DEFAULT_SECTION.to_string()
        } else {
            self.section.clone()
        };

        self.chunks.push(ParsedChunk {
            topics: extract_topics(&text),
            allowed_roles: role_relevance(&text),
            content: text,
            section,
            article_number: self.article.clone(),
        });
    }
}

/// Split a labor-code markdown document into chunks.
pub fn parse_document(text: &str) -> Vec<ParsedChunk> {
    let mut state = ParserState::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line == "---" || line.starts_with("<!--") {
            continue;
        }

        if BOOK_HEADING.is_match(line) {
            state.flush();
            state.book = Some(line.to_string());
            state.section = line.to_string();
        } else if TITLE_HEADING.is_match(line) {
            state.flush();
            state.section = match &state.book {
                Some(book) => format!("{book} - {line}"),
                None => line.to_string(),
            };
        } else if let Some(caps) = ARTICLE_HEADING.captures(line) {
            state.flush();
            state.article = caps.get(2).map(|m| m.as_str().to_string());
            state.section = line.to_string();
            state.lines.push(line.to_string());
        } else {
            state.lines.push(line.to_string());
            if state.current_len() > MAX_CHUNK_CHARS && line.ends_with('.') {
                state.flush();
            }
        }
    }

    state.flush();
    state.chunks
}

/// Outcome of an ingest run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub parsed: usize,
    pub inserted: usize,
    pub failed: usize,
    pub per_role: BTreeMap<Role, usize>,
    pub per_topic: BTreeMap<String, usize>,
}

impl IngestReport {
    /// The `n` most frequent topics, most frequent first.
    pub fn top_topics(&self, n: usize) -> Vec<(&str, usize)> {
        let mut topics: Vec<(&str, usize)> =
            self.per_topic.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        topics.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        topics.truncate(n);
        topics
    }
}

/// Embed and store parsed chunks, `batch_size` at a time.
///
/// A chunk whose embedding or insert fails is counted and skipped.
pub async fn ingest_chunks(
    chunks: Vec<ParsedChunk>,
    embedder: &dyn EmbeddingProvider,
    store: &dyn KnowledgeStore,
    batch_size: usize,
) -> IngestReport {
    let mut report = IngestReport {
        parsed: chunks.len(),
        ..IngestReport::default()
    };

    for (batch_no, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
        let embeddings = join_all(batch.iter().map(|c| embedder.embed(&c.content))).await;

        for (parsed, embedding) in batch.iter().zip(embeddings) {
            let embedding = match embedding {
                Ok(e) => e,
                Err(e) => {
                    warn!(section = %parsed.section, error = %e, "Embedding failed, skipping chunk");
                    report.failed += 1;
                    continue;
                }
            };

            let chunk = KnowledgeChunk {
                id: String::new(),
                content: parsed.content.clone(),
                section: parsed.section.clone(),
                article_number: parsed.article_number.clone(),
                topics: parsed.topics.clone(),
                allowed_roles: parsed.allowed_roles.clone(),
                embedding,
            };

            match store.insert(chunk).await {
                Ok(_) => {
                    report.inserted += 1;
                    for role in &parsed.allowed_roles {
                        *report.per_role.entry(*role).or_default() += 1;
                    }
                    for topic in &parsed.topics {
                        *report.per_topic.entry(topic.clone()).or_default() += 1;
                    }
                }
                Err(e) => {
                    warn!(section = %parsed.section, error = %e, "Insert failed, skipping chunk");
                    report.failed += 1;
                }
            }
        }

        info!(batch = batch_no + 1, inserted = report.inserted, failed = report.failed, "Ingest batch done");
    }

    report
}

/// Parse a document and ingest it, optionally replacing the existing knowledge base.
pub async fn ingest_document(
    text: &str,
    embedder: &dyn EmbeddingProvider,
    store: &dyn KnowledgeStore,
    replace: bool,
    batch_size: usize,
) -> Result<IngestReport> {
    let chunks = parse_document(text);
    if chunks.is_empty() {
        return Err(Error::Internal("document produced no chunks".into()));
    }

    if replace {
        store.clear().await?;
    }

    info!(chunks = chunks.len(), store = store.name(), "Ingesting knowledge base");
    Ok(ingest_chunks(chunks, embedder, store, batch_size).await)
}
