//! Error types for the hrcounsel domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AssistantError`] is the
//! taxonomy surfaced to callers of a conversation turn.

use thiserror::Error;

/// The top-level error type for tooling and wiring code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

/// Failures of a single conversation turn.
///
/// Persistence failures are deliberately absent: they are reported through
/// [`crate::event::DomainEvent::PersistenceFailed`] and never fail a turn.
#[derive(Debug, Clone, Error)]
pub enum AssistantError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("knowledge search failed: {0}")]
    KnowledgeSearchFailed(String),

    #[error("answer synthesis unavailable: {0}")]
    SynthesisUnavailable(String),
}

impl AssistantError {
    /// Stable machine-readable code, safe to expose to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            Self::KnowledgeSearchFailed(_) => "KNOWLEDGE_SEARCH_FAILED",
            Self::SynthesisUnavailable(_) => "SYNTHESIS_UNAVAILABLE",
        }
    }

    /// Whether the failure was caused by the caller rather than a dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Unauthenticated(_))
    }
}

impl From<AuthError> for AssistantError {
    fn from(err: AuthError) -> Self {
        Self::Unauthenticated(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn assistant_error_codes_are_stable() {
        assert_eq!(AssistantError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(
            AssistantError::KnowledgeSearchFailed("db down".into()).code(),
            "KNOWLEDGE_SEARCH_FAILED"
        );
        assert!(AssistantError::Unauthenticated("x".into()).is_client_error());
        assert!(!AssistantError::SynthesisUnavailable("x".into()).is_client_error());
    }

    #[test]
    fn auth_error_maps_to_unauthenticated() {
        let err: AssistantError = AuthError::MissingCredential.into();
        assert!(matches!(err, AssistantError::Unauthenticated(_)));
        assert!(err.to_string().contains("missing bearer"));
    }

    #[test]
    fn dimension_mismatch_displays_both_sizes() {
        let err = StoreError::DimensionMismatch { expected: 1536, actual: 3 };
        assert!(err.to_string().contains("1536"));
        assert!(err.to_string().contains('3'));
    }
}
