//! Per-turn tunables, resolved once from [`AppConfig`].

use std::time::Duration;

use hrcounsel_config::AppConfig;

/// Retrieval, generation and timeout knobs for a conversation turn.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    pub similarity_threshold: f32,
    pub knowledge_limit: usize,
    pub history_limit: usize,
    pub summary_limit: usize,
    pub related_limit: usize,
    /// Session messages replayed verbatim to the model
    pub replay_limit: usize,
    pub context_token_budget: usize,
    pub max_question_chars: usize,

    pub embedding_timeout: Duration,
    pub knowledge_timeout: Duration,
    pub store_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let r = &config.retrieval;
        let t = &config.timeouts;
        Self {
            model: config.generation.model.clone(),
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            similarity_threshold: r.similarity_threshold,
            knowledge_limit: r.knowledge_limit,
            history_limit: r.history_limit,
            summary_limit: r.summary_limit,
            related_limit: r.related_limit,
            replay_limit: r.replay_limit,
            context_token_budget: r.context_token_budget,
            max_question_chars: r.max_question_chars,
            embedding_timeout: t.embedding(),
            knowledge_timeout: t.knowledge(),
            store_timeout: t.store(),
            synthesis_timeout: t.synthesis(),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
