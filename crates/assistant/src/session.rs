//! The conversation turn pipeline.
//!
//! ```text
//! Validating → Embedding → AssemblingContext
//!     → ShortCircuitNoKnowledge | Synthesizing
//!     → Persisting → Done
//! ```
//!
//! Each collaborator is injected, so any of them can be replaced by a
//! call-counting mock. Log writes never fail a turn: their errors go to the
//! [`EventBus`] as `PersistenceFailed`.

use std::sync::Arc;

use chrono::Utc;
use hrcounsel_core::error::AuthError;
use hrcounsel_core::{
    AssistantError, ConversationStore, DomainEvent, EmbeddingProvider, EventBus, IdentityResolver,
    KnowledgeStore, Message, MessageType, Principal, Role, Session, SessionId, SourceCitation,
    SummaryStore,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::context::{ContextAssembler, ContextBundle};
use crate::prompts::NO_KNOWLEDGE_ANSWER;
use crate::settings::AssistantSettings;
use crate::synthesizer::AnswerSynthesizer;

/// An incoming question, as received from the caller.
///
/// Fields are optional so that missing values surface as `InvalidInput`
/// rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, role: Role) -> Self {
        Self {
            question: Some(question.into()),
            role: Some(role.as_str().to_string()),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// How much context a turn drew on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsed {
    pub current_session: usize,
    pub summaries: usize,
    pub related_past_discussions: usize,
}

/// The answer to one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub related_articles: Vec<String>,
    pub session_id: String,
    pub has_history: bool,
    pub context_used: ContextUsed,
}

/// Pipeline stage, recorded on the turn span and on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Validating,
    Embedding,
    AssemblingContext,
    ShortCircuitNoKnowledge,
    Synthesizing,
    Persisting,
    Done,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Validating => "validating",
            TurnStage::Embedding => "embedding",
            TurnStage::AssemblingContext => "assembling_context",
            TurnStage::ShortCircuitNoKnowledge => "short_circuit_no_knowledge",
            TurnStage::Synthesizing => "synthesizing",
            TurnStage::Persisting => "persisting",
            TurnStage::Done => "done",
        }
    }
}

/// Continue the provided session, or start a fresh one when none (or a
/// blank id) is given.
pub fn resolve_session(provided: Option<&str>, principal: &Principal, role: Role) -> Session {
    match provided.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => Session {
            id: SessionId::from(id),
            user_id: principal.id.clone(),
            role,
            is_new: false,
        },
        None => Session {
            id: SessionId::new(),
            user_id: principal.id.clone(),
            role,
            is_new: true,
        },
    }
}

/// Keep the first occurrence of each article number, in citation order.
pub fn related_articles(sources: &[SourceCitation]) -> Vec<String> {
    let mut seen = Vec::new();
    for article in sources.iter().filter_map(|s| s.article.as_ref()) {
        if !seen.contains(article) {
            seen.push(article.clone());
        }
    }
    seen
}

/// A validated question, ready for the pipeline.
struct ValidTurn {
    question: String,
    role: Role,
    principal: Principal,
    session_id: Option<String>,
}

/// Answers questions, one turn at a time.
pub struct ConversationSession {
    embedder: Arc<dyn EmbeddingProvider>,
    conversations: Arc<dyn ConversationStore>,
    assembler: ContextAssembler,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    identity: Arc<dyn IdentityResolver>,
    events: Arc<EventBus>,
    settings: AssistantSettings,
}

impl ConversationSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        knowledge: Arc<dyn KnowledgeStore>,
        conversations: Arc<dyn ConversationStore>,
        summaries: Arc<dyn SummaryStore>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        identity: Arc<dyn IdentityResolver>,
        events: Arc<EventBus>,
        settings: AssistantSettings,
    ) -> Self {
        let assembler = ContextAssembler::new(
            knowledge,
            conversations.clone(),
            summaries,
            events.clone(),
            settings.clone(),
        );
        Self {
            embedder,
            conversations,
            assembler,
            synthesizer,
            identity,
            events,
            settings,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Answer one question.
    ///
    /// `credential` is the caller's bearer credential. Nothing is embedded,
    /// searched or stored until the input and the credential are valid.
    pub async fn ask(&self, credential: Option<&str>, request: AskRequest) -> Result<AskResponse, AssistantError> {
        let span = info_span!("turn", stage = field::Empty, session = field::Empty);
        let mut stage = TurnStage::Validating;

        match self.run(&mut stage, credential, request).instrument(span).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_client_error() {
                    warn!(stage = stage.as_str(), code = e.code(), error = %e, "Turn rejected");
                } else {
                    error!(stage = stage.as_str(), code = e.code(), error = %e, "Turn failed");
                }
                self.events.publish(DomainEvent::TurnFailed {
                    stage: stage.as_str().into(),
                    code: e.code().into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        stage: &mut TurnStage,
        credential: Option<&str>,
        request: AskRequest,
    ) -> Result<AskResponse, AssistantError> {
        enter(stage, TurnStage::Validating);
        let turn = self.validate(credential, request).await?;
        let session = resolve_session(turn.session_id.as_deref(), &turn.principal, turn.role);
        Span::current().record("session", session.id.as_str());

        self.events.publish(DomainEvent::QuestionReceived {
            session_id: session.id.to_string(),
            role: session.role.to_string(),
            new_session: session.is_new,
            timestamp: Utc::now(),
        });

        enter(stage, TurnStage::Embedding);
        let embedding = self.embed(&turn.question).await?;

        enter(stage, TurnStage::AssemblingContext);
        let bundle = self.assembler.gather(&session, &embedding).await?;
        let context_used = ContextUsed {
            current_session: bundle.history.len(),
            summaries: bundle.summaries.len(),
            related_past_discussions: bundle.related.len(),
        };

        // The question is logged while the answer is produced
        let key = session.key();
        let question_message = Message::user(&key, turn.question.clone()).with_embedding(embedding);
        let user_write = self.spawn_append(question_message);

        if !bundle.has_knowledge() {
            enter(stage, TurnStage::ShortCircuitNoKnowledge);
            self.events.publish(DomainEvent::KnowledgeNotFound {
                session_id: session.id.to_string(),
                role: session.role.to_string(),
                timestamp: Utc::now(),
            });
            info!(role = %session.role, session = %session.id, "No knowledge above threshold");

            enter(stage, TurnStage::Persisting);
            self.await_write(user_write, &session, MessageType::User).await;
            let answer_message = Message::assistant(&key, NO_KNOWLEDGE_ANSWER);
            let answer_write = self.spawn_append(answer_message);
            self.await_write(answer_write, &session, MessageType::Assistant).await;

            enter(stage, TurnStage::Done);
            return Ok(AskResponse {
                answer: NO_KNOWLEDGE_ANSWER.to_string(),
                sources: Vec::new(),
                related_articles: Vec::new(),
                session_id: session.id.to_string(),
                has_history: !bundle.history.is_empty(),
                context_used,
            });
        }

        enter(stage, TurnStage::Synthesizing);
        let answer = self.synthesize(&session, &turn.question, &bundle).await?;
        let sources: Vec<SourceCitation> = bundle.knowledge.iter().map(|hit| hit.citation()).collect();
        let related = related_articles(&sources);

        enter(stage, TurnStage::Persisting);
        let mut answer_message =
            Message::assistant(&key, answer.clone()).with_citations(sources.clone(), related.clone());
        match tokio::time::timeout(self.settings.embedding_timeout, self.embedder.embed(&answer)).await {
            Ok(Ok(vector)) => answer_message = answer_message.with_embedding(vector),
            Ok(Err(e)) => self.persistence_failed(&session, MessageType::Assistant, format!("answer embedding failed: {e}")),
            Err(_) => self.persistence_failed(&session, MessageType::Assistant, "answer embedding timed out".into()),
        }
        self.await_write(user_write, &session, MessageType::User).await;
        let answer_write = self.spawn_append(answer_message);
        self.await_write(answer_write, &session, MessageType::Assistant).await;

        self.events.publish(DomainEvent::AnswerGenerated {
            session_id: session.id.to_string(),
            sources: sources.len(),
            history_messages: context_used.current_session,
            summaries: context_used.summaries,
            related: context_used.related_past_discussions,
            timestamp: Utc::now(),
        });
        info!(
            role = %session.role,
            session = %session.id,
            sources = sources.len(),
            history = context_used.current_session,
            summaries = context_used.summaries,
            related = context_used.related_past_discussions,
            "Answered question"
        );

        enter(stage, TurnStage::Done);
        Ok(AskResponse {
            answer,
            sources,
            related_articles: related,
            session_id: session.id.to_string(),
            has_history: !bundle.history.is_empty(),
            context_used,
        })
    }

    async fn validate(&self, credential: Option<&str>, request: AskRequest) -> Result<ValidTurn, AssistantError> {
        let question = request
            .question
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AssistantError::InvalidInput("Question is required".into()))?;
        if question.chars().count() > self.settings.max_question_chars {
            return Err(AssistantError::InvalidInput(format!(
                "Question exceeds {} characters",
                self.settings.max_question_chars
            )));
        }

        let role: Role = request
            .role
            .as_deref()
            .ok_or_else(|| AssistantError::InvalidInput("Role is required".into()))?
            .parse()?;

        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        let principal = self.identity.resolve(credential).await?;

        // A credential pinned to a role may only ask as that role
        if let Some(pinned) = principal.role.filter(|r| *r != role) {
            warn!(user = %principal.id, pinned = %pinned, requested = %role, "Requested role differs from credential role");
            return Err(AssistantError::Unauthenticated(format!(
                "credential is not valid for role '{role}'"
            )));
        }

        Ok(ValidTurn {
            question,
            role,
            principal,
            session_id: request.session_id,
        })
    }

    async fn embed(&self, question: &str) -> Result<Vec<f32>, AssistantError> {
        match tokio::time::timeout(self.settings.embedding_timeout, self.embedder.embed(question)).await {
            Ok(Ok(vector)) => Ok(vector),
            Ok(Err(e)) => Err(AssistantError::EmbeddingUnavailable(e.to_string())),
            Err(_) => Err(AssistantError::EmbeddingUnavailable(format!(
                "embedding timed out after {}s",
                self.settings.embedding_timeout.as_secs()
            ))),
        }
    }

    async fn synthesize(&self, session: &Session, question: &str, bundle: &ContextBundle) -> Result<String, AssistantError> {
        debug!(synthesizer = self.synthesizer.name(), knowledge = bundle.knowledge.len(), "Synthesizing answer");
        self.synthesizer
            .synthesize(session.role, question, bundle, &bundle.history)
            .await
    }

    /// Write a message on its own task, so it completes even if the caller
    /// goes away.
    fn spawn_append(&self, message: Message) -> JoinHandle<Result<(), String>> {
        let store = self.conversations.clone();
        let timeout = self.settings.store_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, store.append(&message)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("write timed out after {}s", timeout.as_secs())),
            }
        })
    }

    async fn await_write(&self, handle: JoinHandle<Result<(), String>>, session: &Session, message_type: MessageType) {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(format!("write task failed: {e}")),
        };
        if let Err(error_message) = outcome {
            self.persistence_failed(session, message_type, error_message);
        }
    }

    fn persistence_failed(&self, session: &Session, message_type: MessageType, error_message: String) {
        warn!(session = %session.id, message_type = message_type.as_str(), error = %error_message, "Conversation log write failed");
        self.events.publish(DomainEvent::PersistenceFailed {
            session_id: session.id.to_string(),
            message_type: message_type.as_str().into(),
            error_message,
            timestamp: Utc::now(),
        });
    }
}

fn enter(stage: &mut TurnStage, next: TurnStage) {
    *stage = next;
    Span::current().record("stage", next.as_str());
    debug!(stage = next.as_str(), "Turn stage");
}
