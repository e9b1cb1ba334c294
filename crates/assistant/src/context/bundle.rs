//! Context bundle rendering under a token budget.
//!
//! The bundle renders four layers into the system block, most authoritative
//! first:
//!
//! 1. **Knowledge** (labor-code excerpts), never trimmed
//! 2. **Session history** (this session, oldest to newest)
//! 3. **Summaries** (digests of earlier sessions)
//! 4. **Related discussions** (similar messages from other sessions)
//!
//! When the estimate exceeds the budget, layers are trimmed from the least
//! reliable up: related (lowest similarity first), then summaries (oldest
//! first), then history (oldest first).
//!
//! Rendering is deterministic: identical bundles and budgets always produce
//! identical text and metadata.

use hrcounsel_core::message::{estimate_tokens, MessageType};
use hrcounsel_core::{ConversationSummary, Message, SearchResult, SimilarMessage};
use serde::{Deserialize, Serialize};

const HISTORY_HEADER: &str = "CONVERSATION HISTORY (this session):";
const SUMMARY_HEADER: &str = "PAST CONVERSATIONS SUMMARY:";
const RELATED_HEADER: &str = "RELATED PAST DISCUSSIONS:";
const KNOWLEDGE_SEPARATOR: &str = "\n\n---\n\n";

/// Everything gathered for one turn.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    /// Knowledge hits, by non-increasing similarity.
    pub knowledge: Vec<SearchResult>,
    /// Live-session messages, oldest first.
    pub history: Vec<Message>,
    /// Earlier-session summaries, newest first.
    pub summaries: Vec<ConversationSummary>,
    /// Messages from other sessions, by non-increasing similarity.
    pub related: Vec<SimilarMessage>,
}

/// The rendered context block plus how it was built.
#[derive(Debug, Clone)]
pub struct RenderedContext {
    pub text: String,
    pub metadata: AssemblyMetadata,
}

/// Detailed metadata about the rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Estimated tokens in the rendered context.
    pub total_tokens: usize,
    /// Configured token budget.
    pub budget: usize,
    /// Budget utilization percentage.
    pub utilization_pct: f32,
    pub per_layer: Vec<LayerStats>,
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single context layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub tokens: usize,
    /// Items included after budget trimming.
    pub items_included: usize,
    /// Items available before trimming.
    pub items_total: usize,
}

/// Items dropped from a layer during budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: String,
}

/// One layer's lines, with the range still kept after trimming.
struct Layer {
    name: &'static str,
    header: &'static str,
    lines: Vec<String>,
    /// Kept lines are `lines[start..end]`.
    start: usize,
    end: usize,
    reason: &'static str,
}

impl Layer {
    fn new(name: &'static str, header: &'static str, lines: Vec<String>, reason: &'static str) -> Self {
        let end = lines.len();
        Self { name, header, lines, start: 0, end, reason }
    }

    fn kept(&self) -> &[String] {
        &self.lines[self.start..self.end]
    }

    fn render(&self) -> Option<String> {
        let kept = self.kept();
        if kept.is_empty() {
            return None;
        }
        Some(format!("{}\n{}", self.header, kept.join("\n")))
    }

    fn tokens(&self) -> usize {
        self.render().map(|s| estimate_tokens(&s)).unwrap_or(0)
    }

    fn stats(&self) -> LayerStats {
        LayerStats {
            name: self.name.into(),
            tokens: self.tokens(),
            items_included: self.kept().len(),
            items_total: self.lines.len(),
        }
    }

    fn drop_info(&self) -> Option<DropInfo> {
        let dropped: Vec<&String> = self.lines[..self.start]
            .iter()
            .chain(self.lines[self.end..].iter())
            .collect();
        if dropped.is_empty() {
            return None;
        }
        Some(DropInfo {
            layer: self.name.into(),
            items_dropped: dropped.len(),
            tokens_dropped: dropped.iter().map(|l| estimate_tokens(l)).sum(),
            reason: self.reason.into(),
        })
    }
}

impl ContextBundle {
    pub fn has_knowledge(&self) -> bool {
        !self.knowledge.is_empty()
    }

    /// Render the bundle into a context block no larger than `budget`
    /// estimated tokens, except that knowledge is always kept whole.
    pub fn render(&self, budget: usize) -> RenderedContext {
        let knowledge_text = self
            .knowledge
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[Source {} - {}]\n{}", i + 1, source_label(hit), hit.chunk.content))
            .collect::<Vec<_>>()
            .join(KNOWLEDGE_SEPARATOR);
        let knowledge_tokens = estimate_tokens(&knowledge_text);

        let mut history = Layer::new(
            "history",
            HISTORY_HEADER,
            self.history.iter().map(history_line).collect(),
            "Oldest session messages dropped",
        );
        let mut summaries = Layer::new(
            "summaries",
            SUMMARY_HEADER,
            self.summaries.iter().map(summary_line).collect(),
            "Oldest summaries dropped",
        );
        let mut related = Layer::new(
            "related",
            RELATED_HEADER,
            self.related.iter().map(related_line).collect(),
            "Least similar discussions dropped",
        );

        let total = |h: &Layer, s: &Layer, r: &Layer| knowledge_tokens + h.tokens() + s.tokens() + r.tokens();

        // related and summaries are ordered best-first, so trim from the end;
        // history is oldest-first, so trim from the front
        while total(&history, &summaries, &related) > budget && related.end > related.start {
            related.end -= 1;
        }
        while total(&history, &summaries, &related) > budget && summaries.end > summaries.start {
            summaries.end -= 1;
        }
        while total(&history, &summaries, &related) > budget && history.start < history.end {
            history.start += 1;
        }

        let mut sections = Vec::new();
        if !knowledge_text.is_empty() {
            sections.push(knowledge_text);
        }
        for layer in [&history, &summaries, &related] {
            if let Some(section) = layer.render() {
                sections.push(section);
            }
        }
        let text = sections.join("\n\n");

        let mut per_layer = vec![LayerStats {
            name: "knowledge".into(),
            tokens: knowledge_tokens,
            items_included: self.knowledge.len(),
            items_total: self.knowledge.len(),
        }];
        let mut drops = Vec::new();
        for layer in [&history, &summaries, &related] {
            per_layer.push(layer.stats());
            if let Some(d) = layer.drop_info() {
                drops.push(d);
            }
        }

        let total_tokens: usize = per_layer.iter().map(|s| s.tokens).sum();
        let utilization_pct = if budget == 0 {
            100.0
        } else {
            (total_tokens as f32 / budget as f32) * 100.0
        };

        RenderedContext {
            text,
            metadata: AssemblyMetadata {
                total_tokens,
                budget,
                utilization_pct,
                per_layer,
                drops,
            },
        }
    }
}

fn source_label(hit: &SearchResult) -> String {
    match &hit.chunk.article_number {
        Some(article) => format!("Article {article}"),
        None => hit.chunk.section.clone(),
    }
}

fn history_line(message: &Message) -> String {
    let speaker = match message.message_type {
        MessageType::User => "User",
        MessageType::Assistant => "Assistant",
    };
    format!("{speaker}: {}", message.content)
}

fn summary_line(summary: &ConversationSummary) -> String {
    format!("- {} (Topics: {})", summary.summary, summary.key_topics.join(", "))
}

fn related_line(similar: &SimilarMessage) -> String {
    let pct = (similar.similarity.clamp(0.0, 1.0) * 100.0).round() as u8;
    format!("- {} ({pct}% similar)", similar.message.content)
}
