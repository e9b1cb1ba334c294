//! Concurrent context retrieval.
//!
//! Four lookups run side by side for every turn, each under its own timeout:
//!
//! | Lookup | On failure or timeout |
//! |--------|-----------------------|
//! | knowledge search | turn fails with `KnowledgeSearchFailed` |
//! | session history | empty, `LookupDegraded` published |
//! | summaries | empty, `LookupDegraded` published |
//! | related discussions | empty, `LookupDegraded` published |
//!
//! The fan-out is a single `tokio::join!`, so dropping the turn cancels
//! every lookup still in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hrcounsel_core::error::StoreError;
use hrcounsel_core::{
    AssistantError, ConversationStore, DomainEvent, EventBus, KnowledgeQuery, KnowledgeStore,
    Session, SimilarQuery, SummaryStore,
};
use tracing::{debug, warn};

use crate::context::bundle::ContextBundle;
use crate::settings::AssistantSettings;

/// Gathers the [`ContextBundle`] for a turn.
pub struct ContextAssembler {
    knowledge: Arc<dyn KnowledgeStore>,
    conversations: Arc<dyn ConversationStore>,
    summaries: Arc<dyn SummaryStore>,
    events: Arc<EventBus>,
    settings: AssistantSettings,
}

impl ContextAssembler {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        conversations: Arc<dyn ConversationStore>,
        summaries: Arc<dyn SummaryStore>,
        events: Arc<EventBus>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            knowledge,
            conversations,
            summaries,
            events,
            settings,
        }
    }

    /// Run all four lookups for `session` using the question's embedding.
    ///
    /// Only the knowledge lookup can fail the turn. An empty knowledge
    /// result is a success; the caller decides what to do with it.
    pub async fn gather(&self, session: &Session, embedding: &[f32]) -> Result<ContextBundle, AssistantError> {
        let s = &self.settings;
        let key = session.key();

        let knowledge_query = KnowledgeQuery {
            embedding: embedding.to_vec(),
            role: session.role,
            threshold: s.similarity_threshold,
            limit: s.knowledge_limit,
        };
        let similar_query = SimilarQuery {
            user_id: session.user_id.clone(),
            role: session.role,
            exclude_session: session.id.clone(),
            embedding: embedding.to_vec(),
            limit: s.related_limit,
        };

        let knowledge = async {
            match tokio::time::timeout(s.knowledge_timeout, self.knowledge.search(&knowledge_query)).await {
                Ok(Ok(hits)) => Ok(hits),
                Ok(Err(e)) => Err(AssistantError::KnowledgeSearchFailed(e.to_string())),
                Err(_) => Err(AssistantError::KnowledgeSearchFailed(format!(
                    "knowledge search timed out after {}s",
                    s.knowledge_timeout.as_secs()
                ))),
            }
        };
        let history = self.degrade(
            "history",
            session,
            s.store_timeout,
            self.conversations.recent(&key, s.history_limit),
        );
        let summaries = self.degrade(
            "summaries",
            session,
            s.store_timeout,
            self.summaries.recent(&session.user_id, session.role, s.summary_limit),
        );
        let related = self.degrade(
            "related",
            session,
            s.store_timeout,
            self.conversations.search_similar(&similar_query),
        );

        let (knowledge, history, summaries, related) = tokio::join!(knowledge, history, summaries, related);

        let bundle = ContextBundle {
            knowledge: knowledge?,
            history,
            summaries,
            related,
        };
        debug!(
            session = %session.id,
            knowledge = bundle.knowledge.len(),
            history = bundle.history.len(),
            summaries = bundle.summaries.len(),
            related = bundle.related.len(),
            "Context gathered"
        );
        Ok(bundle)
    }

    /// Await a non-essential lookup, replacing failure with an empty result.
    async fn degrade<T>(
        &self,
        lookup: &str,
        session: &Session,
        timeout: Duration,
        fut: impl Future<Output = Result<Vec<T>, StoreError>>,
    ) -> Vec<T> {
        let error_message = match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(items)) => return items,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", timeout.as_secs()),
        };

        warn!(lookup, session = %session.id, error = %error_message, "Context lookup degraded");
        self.events.publish(DomainEvent::LookupDegraded {
            lookup: lookup.into(),
            session_id: session.id.to_string(),
            error_message,
            timestamp: Utc::now(),
        });
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{hit, FailingConversationStore, ScriptedKnowledgeStore, StalledSummaryStore};
    use hrcounsel_core::{Message, Role, SessionId};
    use hrcounsel_memory::{InMemoryConversationStore, InMemorySummaryStore};

    fn session(id: &str) -> Session {
        Session {
            id: SessionId::from(id),
            user_id: "alice".into(),
            role: Role::Candidate,
            is_new: false,
        }
    }

    fn assembler(
        knowledge: Arc<dyn KnowledgeStore>,
        conversations: Arc<dyn ConversationStore>,
        summaries: Arc<dyn SummaryStore>,
        events: Arc<EventBus>,
    ) -> ContextAssembler {
        ContextAssembler::new(knowledge, conversations, summaries, events, AssistantSettings::default())
    }

    #[tokio::test]
    async fn gathers_all_layers() {
        let conversations = Arc::new(InMemoryConversationStore::new());
        let live = session("live").key();
        let old = session("old").key();
        conversations.append(&Message::user(&live, "earlier question")).await.unwrap();
        conversations
            .append(&Message::user(&old, "old question").with_embedding(vec![1.0, 0.0]))
            .await
            .unwrap();

        let knowledge = Arc::new(ScriptedKnowledgeStore::returning(vec![hit(Some("295"), 0.91)]));
        let a = assembler(
            knowledge.clone(),
            conversations,
            Arc::new(InMemorySummaryStore::new()),
            Arc::new(EventBus::default()),
        );

        let bundle = a.gather(&session("live"), &[1.0, 0.0]).await.unwrap();
        assert_eq!(bundle.knowledge.len(), 1);
        assert_eq!(bundle.history.len(), 1);
        assert_eq!(bundle.history[0].content, "earlier question");
        assert_eq!(bundle.related.len(), 1);
        assert_eq!(bundle.related[0].message.content, "old question");
        assert!(bundle.summaries.is_empty());
        assert_eq!(knowledge.search_count(), 1);
    }

    #[tokio::test]
    async fn knowledge_failure_is_fatal() {
        let a = assembler(
            Arc::new(ScriptedKnowledgeStore::failing()),
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemorySummaryStore::new()),
            Arc::new(EventBus::default()),
        );
        let err = a.gather(&session("s"), &[1.0]).await.unwrap_err();
        assert!(matches!(err, AssistantError::KnowledgeSearchFailed(_)));
    }

    #[tokio::test]
    async fn store_failures_degrade_and_publish() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let a = assembler(
            Arc::new(ScriptedKnowledgeStore::returning(vec![hit(Some("295"), 0.9)])),
            Arc::new(FailingConversationStore::new()),
            Arc::new(InMemorySummaryStore::new()),
            events,
        );

        let bundle = a.gather(&session("s"), &[1.0]).await.unwrap();
        assert_eq!(bundle.knowledge.len(), 1);
        assert!(bundle.history.is_empty());
        assert!(bundle.related.is_empty());

        let mut degraded = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::LookupDegraded { lookup, .. } = event.as_ref() {
                degraded.push(lookup.clone());
            }
        }
        degraded.sort();
        assert_eq!(degraded, vec!["history", "related"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_summaries_time_out_to_empty() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let a = assembler(
            Arc::new(ScriptedKnowledgeStore::returning(vec![hit(None, 0.8)])),
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(StalledSummaryStore),
            events,
        );

        let bundle = a.gather(&session("s"), &[1.0]).await.unwrap();
        assert!(bundle.summaries.is_empty());
        let event = rx.try_recv().unwrap();
        match event.as_ref() {
            DomainEvent::LookupDegraded { lookup, error_message, .. } => {
                assert_eq!(lookup, "summaries");
                assert!(error_message.contains("timed out"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
