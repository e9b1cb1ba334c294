//! Answer synthesis, the one call into a text-generation model per turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hrcounsel_core::message::MessageType;
use hrcounsel_core::{AssistantError, ChatMessage, Message, Provider, ProviderRequest, Role};
use tracing::debug;

use crate::context::ContextBundle;
use crate::prompts::{system_prompt, EMPTY_COMPLETION_ANSWER};
use crate::settings::AssistantSettings;

/// Turns a question and its gathered context into an answer.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// `history` is the live session, oldest first; implementations decide
    /// how much of it to replay.
    async fn synthesize(
        &self,
        role: Role,
        question: &str,
        context: &ContextBundle,
        history: &[Message],
    ) -> Result<String, AssistantError>;
}

/// Synthesizer backed by a chat-completion [`Provider`].
pub struct ProviderSynthesizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    replay_limit: usize,
    context_budget: usize,
    timeout: Duration,
}

impl ProviderSynthesizer {
    pub fn new(provider: Arc<dyn Provider>, settings: &AssistantSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            replay_limit: settings.replay_limit,
            context_budget: settings.context_token_budget,
            timeout: settings.synthesis_timeout,
        }
    }

    /// Build the chat request: system block, replayed history, then the question.
    pub fn build_request(
        &self,
        role: Role,
        question: &str,
        context: &ContextBundle,
        history: &[Message],
    ) -> ProviderRequest {
        let rendered = context.render(self.context_budget);
        debug!(
            total_tokens = rendered.metadata.total_tokens,
            budget = rendered.metadata.budget,
            utilization = rendered.metadata.utilization_pct,
            drops = rendered.metadata.drops.len(),
            "Context rendered"
        );

        let mut messages = Vec::with_capacity(history.len().min(self.replay_limit) + 2);
        messages.push(ChatMessage::system(system_prompt(role, &rendered.text)));

        let skip = history.len().saturating_sub(self.replay_limit);
        messages.extend(history[skip..].iter().map(|m| match m.message_type {
            MessageType::User => ChatMessage::user(m.content.clone()),
            MessageType::Assistant => ChatMessage::assistant(m.content.clone()),
        }));
        messages.push(ChatMessage::user(question));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stop: Vec::new(),
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for ProviderSynthesizer {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn synthesize(
        &self,
        role: Role,
        question: &str,
        context: &ContextBundle,
        history: &[Message],
    ) -> Result<String, AssistantError> {
        let request = self.build_request(role, question, context, history);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                AssistantError::SynthesisUnavailable(format!(
                    "completion timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AssistantError::SynthesisUnavailable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                model = %response.model,
                "Completion received"
            );
        }

        let answer = response.message.content.trim();
        if answer.is_empty() {
            Ok(EMPTY_COMPLETION_ANSWER.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{hit, ScriptedProvider};
    use hrcounsel_core::{ChatRole, SessionId, SessionKey};

    fn key() -> SessionKey {
        SessionKey {
            user_id: "alice".into(),
            role: Role::Candidate,
            session_id: SessionId::from("s1"),
        }
    }

    fn bundle() -> ContextBundle {
        ContextBundle {
            knowledge: vec![hit(Some("295"), 0.91)],
            ..Default::default()
        }
    }

    fn history(turns: usize) -> Vec<Message> {
        (0..turns)
            .flat_map(|i| {
                [
                    Message::user(&key(), format!("question {i}")),
                    Message::assistant(&key(), format!("answer {i}")),
                ]
            })
            .collect()
    }

    #[tokio::test]
    async fn request_carries_policy_and_order() {
        let provider = Arc::new(ScriptedProvider::replying("Article 295 says so."));
        let synth = ProviderSynthesizer::new(provider.clone(), &AssistantSettings::default());

        let answer = synth
            .synthesize(Role::Candidate, "What is regular employment?", &bundle(), &history(1))
            .await
            .unwrap();
        assert_eq!(answer, "Article 295 says so.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gpt-4o-mini");
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(800));

        let roles: Vec<ChatRole> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]);
        assert!(req.messages[0].content.contains("[Source 1 - Article 295]"));
        assert_eq!(req.messages[3].content, "What is regular employment?");
    }

    #[tokio::test]
    async fn replays_only_the_last_messages() {
        let provider = Arc::new(ScriptedProvider::replying("ok"));
        let synth = ProviderSynthesizer::new(provider, &AssistantSettings::default());

        // 8 turns = 16 messages, only the last 10 are replayed
        let req = synth.build_request(Role::Candidate, "next?", &bundle(), &history(8));
        assert_eq!(req.messages.len(), 1 + 10 + 1);
        assert_eq!(req.messages[1].content, "question 3");
        assert_eq!(req.messages[10].content, "answer 7");
    }

    #[tokio::test]
    async fn empty_completion_uses_fixed_text() {
        let provider = Arc::new(ScriptedProvider::replying("   "));
        let synth = ProviderSynthesizer::new(provider, &AssistantSettings::default());
        let answer = synth.synthesize(Role::Admin, "q", &bundle(), &[]).await.unwrap();
        assert_eq!(answer, EMPTY_COMPLETION_ANSWER);
    }

    #[tokio::test]
    async fn provider_failure_is_synthesis_unavailable() {
        let provider = Arc::new(ScriptedProvider::failing());
        let synth = ProviderSynthesizer::new(provider, &AssistantSettings::default());
        let err = synth.synthesize(Role::Recruiter, "q", &bundle(), &[]).await.unwrap_err();
        assert!(matches!(err, AssistantError::SynthesisUnavailable(_)));
        assert_eq!(err.code(), "SYNTHESIS_UNAVAILABLE");
    }
}
