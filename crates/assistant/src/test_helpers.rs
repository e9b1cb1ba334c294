//! Shared call-counting mocks for assistant tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hrcounsel_core::error::{ProviderError, StoreError};
use hrcounsel_core::provider::Usage;
use hrcounsel_core::{
    AssistantError, ChatMessage, ConversationStore, ConversationSummary, DomainEvent,
    EmbeddingProvider, EventBus, KnowledgeChunk, KnowledgeQuery, KnowledgeStore, Message, Provider,
    ProviderRequest, ProviderResponse, Role, SearchResult, SessionKey, SimilarMessage, SimilarQuery,
    StaticTokenResolver, SummaryStore,
};
use hrcounsel_memory::{InMemoryConversationStore, InMemorySummaryStore};
use tokio::sync::{broadcast, Notify};

use crate::context::ContextBundle;
use crate::session::ConversationSession;
use crate::settings::AssistantSettings;
use crate::synthesizer::AnswerSynthesizer;

/// Bearer token the harness resolves to user "alice".
pub const TOKEN: &str = "tok-alice";

/// A knowledge hit with fixed content.
pub fn hit(article: Option<&str>, similarity: f32) -> SearchResult {
    SearchResult {
        chunk: KnowledgeChunk {
            id: format!("chunk-{}", article.unwrap_or("general")),
            content: "An employee who is allowed to work after a probationary period shall be considered a regular employee.".into(),
            section: "BOOK SIX - POST EMPLOYMENT".into(),
            article_number: article.map(String::from),
            topics: vec!["regularization".into()],
            allowed_roles: Role::ALL.iter().copied().collect(),
            embedding: vec![1.0, 0.0],
        },
        similarity,
    }
}

/// Embedder returning a constant vector.
pub struct MockEmbedder {
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { fail: true, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Network("connection refused".into()));
        }
        Ok(vec![1.0, 0.0])
    }
}

/// Knowledge store returning a fixed result list.
pub struct ScriptedKnowledgeStore {
    results: Vec<SearchResult>,
    fail: bool,
    searches: AtomicUsize,
}

impl ScriptedKnowledgeStore {
    pub fn returning(results: Vec<SearchResult>) -> Self {
        Self { results, fail: false, searches: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { results: Vec::new(), fail: true, searches: AtomicUsize::new(0) }
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeStore for ScriptedKnowledgeStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, _query: &KnowledgeQuery) -> Result<Vec<SearchResult>, StoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::QueryFailed("index unavailable".into()));
        }
        Ok(self.results.clone())
    }

    async fn insert(&self, chunk: KnowledgeChunk) -> Result<String, StoreError> {
        Ok(chunk.id)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.results.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Conversation store where every operation fails.
pub struct FailingConversationStore {
    appends: AtomicUsize,
}

impl FailingConversationStore {
    pub fn new() -> Self {
        Self { appends: AtomicUsize::new(0) }
    }

    #[allow(dead_code)]
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationStore for FailingConversationStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn append(&self, _message: &Message) -> Result<(), StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Storage("disk full".into()))
    }

    async fn recent(&self, _key: &SessionKey, _limit: usize) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn search_similar(&self, _query: &SimilarQuery) -> Result<Vec<SimilarMessage>, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Summary store that never answers.
pub struct StalledSummaryStore;

#[async_trait]
impl SummaryStore for StalledSummaryStore {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn recent(&self, _user_id: &str, _role: Role, _limit: usize) -> Result<Vec<ConversationSummary>, StoreError> {
        std::future::pending().await
    }
}

/// Holds a synthesis call open until the test releases it.
#[derive(Default)]
pub struct SynthesisGate {
    started: Notify,
    release: Notify,
}

impl SynthesisGate {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Synthesizer returning a fixed answer and remembering what it was shown.
pub struct MockSynthesizer {
    fail: bool,
    gate: Option<Arc<SynthesisGate>>,
    calls: AtomicUsize,
    last_history_len: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self { fail: false, gate: None, calls: AtomicUsize::new(0), last_history_len: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn gated(gate: Arc<SynthesisGate>) -> Self {
        Self { gate: Some(gate), ..Self::new() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_history_len(&self) -> usize {
        self.last_history_len.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(
        &self,
        _role: Role,
        _question: &str,
        _context: &ContextBundle,
        history: &[Message],
    ) -> Result<String, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_history_len.store(history.len(), Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.fail {
            return Err(AssistantError::SynthesisUnavailable("upstream 503".into()));
        }
        Ok("mock answer".into())
    }
}

/// Chat provider that replies with fixed text and records every request.
pub struct ScriptedProvider {
    reply: Option<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self { reply: Some(text.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(text) => Ok(ProviderResponse {
                message: ChatMessage::assistant(text.clone()),
                usage: Some(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
                model: "mock-model".into(),
            }),
            None => Err(ProviderError::ApiError { status_code: 503, message: "overloaded".into() }),
        }
    }
}

/// A fully wired [`ConversationSession`] with handles on every mock.
pub struct Harness {
    pub session: Arc<ConversationSession>,
    pub embedder: Arc<MockEmbedder>,
    pub knowledge: Arc<ScriptedKnowledgeStore>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub summaries: Arc<InMemorySummaryStore>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub events: Arc<EventBus>,
    rx: broadcast::Receiver<Arc<DomainEvent>>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            knowledge: ScriptedKnowledgeStore::returning(Vec::new()),
            embedder: MockEmbedder::new(),
            synthesizer: MockSynthesizer::new(),
            failing_conversations: false,
            identity: StaticTokenResolver::new().with_token(TOKEN, "alice", None),
        }
    }

    /// Panic if any log write failed since the harness was built.
    pub fn assert_no_persistence_failures(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            if let DomainEvent::PersistenceFailed { error_message, .. } = event.as_ref() {
                panic!("unexpected persistence failure: {error_message}");
            }
        }
    }
}

/// Poll the log until it holds `count` messages.
pub async fn wait_for_log(conversations: &InMemoryConversationStore, count: usize) -> Vec<Message> {
    let poll = async {
        loop {
            let logged = conversations.all().await;
            if logged.len() >= count {
                return logged;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(2), poll)
        .await
        .expect("log write never landed")
}

pub struct HarnessBuilder {
    knowledge: ScriptedKnowledgeStore,
    embedder: MockEmbedder,
    synthesizer: MockSynthesizer,
    failing_conversations: bool,
    identity: StaticTokenResolver,
}

impl HarnessBuilder {
    pub fn with_knowledge(mut self, results: Vec<SearchResult>) -> Self {
        self.knowledge = ScriptedKnowledgeStore::returning(results);
        self
    }

    pub fn failing_knowledge(mut self) -> Self {
        self.knowledge = ScriptedKnowledgeStore::failing();
        self
    }

    pub fn failing_embedder(mut self) -> Self {
        self.embedder = MockEmbedder::failing();
        self
    }

    pub fn failing_synthesizer(mut self) -> Self {
        self.synthesizer = MockSynthesizer::failing();
        self
    }

    pub fn gated_synthesizer(mut self, gate: Arc<SynthesisGate>) -> Self {
        self.synthesizer = MockSynthesizer::gated(gate);
        self
    }

    pub fn failing_conversations(mut self) -> Self {
        self.failing_conversations = true;
        self
    }

    pub fn with_token(mut self, token: &str, user_id: &str, role: Option<Role>) -> Self {
        self.identity = self.identity.with_token(token, user_id, role);
        self
    }

    pub fn build(self) -> Harness {
        let embedder = Arc::new(self.embedder);
        let knowledge = Arc::new(self.knowledge);
        let conversations = Arc::new(InMemoryConversationStore::new());
        let summaries = Arc::new(InMemorySummaryStore::new());
        let synthesizer = Arc::new(self.synthesizer);
        let events = Arc::new(EventBus::default());
        let rx = events.subscribe();

        let log: Arc<dyn ConversationStore> = if self.failing_conversations {
            Arc::new(FailingConversationStore::new())
        } else {
            conversations.clone()
        };

        let session = Arc::new(ConversationSession::new(
            embedder.clone(),
            knowledge.clone(),
            log,
            summaries.clone(),
            synthesizer.clone(),
            Arc::new(self.identity),
            events.clone(),
            AssistantSettings::default(),
        ));

        Harness {
            session,
            embedder,
            knowledge,
            conversations,
            summaries,
            synthesizer,
            events,
            rx,
        }
    }
}
