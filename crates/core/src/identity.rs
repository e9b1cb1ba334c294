//! Identity resolution: bearer credential to principal.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::role::Role;
use crate::Principal;

/// Resolves an opaque bearer credential to a [`Principal`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, credential: &str) -> Result<Principal, AuthError>;
}

/// Resolver backed by a fixed list of principals, keyed by token.
///
/// Used for tests and for single-tenant deployments that hand out
/// long-lived tokens from configuration.
pub struct StaticTokenResolver {
    tokens: std::collections::HashMap<String, Principal>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self { tokens: std::collections::HashMap::new() }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>, role: Option<Role>) -> Self {
        let principal = Principal { id: user_id.into(), role };
        self.tokens.insert(token.into(), principal);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for StaticTokenResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, credential: &str) -> Result<Principal, AuthError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredential("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_finds_known_token() {
        let resolver = StaticTokenResolver::new().with_token("tok-1", "user-1", Some(Role::Candidate));
        let principal = resolver.resolve("tok-1").await.unwrap();
        assert_eq!(principal.id, "user-1");
        assert_eq!(principal.role, Some(Role::Candidate));
    }

    #[tokio::test]
    async fn static_resolver_rejects_unknown_token() {
        let resolver = StaticTokenResolver::new().with_token("tok-1", "user-1", None);
        let err = resolver.resolve("nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }
}
