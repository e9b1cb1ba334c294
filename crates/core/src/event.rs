//! Domain event system: side channel for turn telemetry.
//!
//! Non-fatal failures (a degraded lookup, a lost log write) never change a
//! turn's result. They are published here so operators and tests can
//! observe them without coupling to the pipeline's return type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A validated question entered the pipeline
    QuestionReceived {
        session_id: String,
        role: String,
        new_session: bool,
        timestamp: DateTime<Utc>,
    },

    /// A context lookup failed or timed out and was replaced by an empty result
    LookupDegraded {
        lookup: String,
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// No knowledge matched; the fixed fallback answer was returned
    KnowledgeNotFound {
        session_id: String,
        role: String,
        timestamp: DateTime<Utc>,
    },

    /// An answer was synthesized and returned
    AnswerGenerated {
        session_id: String,
        sources: usize,
        history_messages: usize,
        summaries: usize,
        related: usize,
        timestamp: DateTime<Utc>,
    },

    /// A log write (or the embedding it needed) failed
    PersistenceFailed {
        session_id: String,
        message_type: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn failed with a typed error
    TurnFailed {
        stage: String,
        code: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::PersistenceFailed {
            session_id: "s1".into(),
            message_type: "user".into(),
            error_message: "disk full".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::PersistenceFailed { session_id, message_type, .. } => {
                assert_eq!(session_id, "s1");
                assert_eq!(message_type, "user");
            }
            _ => panic!("Expected PersistenceFailed event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::TurnFailed {
            stage: "embedding".into(),
            code: "EMBEDDING_UNAVAILABLE".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
