//! Ordered identity resolution and config wiring.

use std::sync::Arc;

use async_trait::async_trait;
use hrcounsel_config::AppConfig;
use hrcounsel_core::error::AuthError;
use hrcounsel_core::{IdentityResolver, Principal, StaticTokenResolver};
use tracing::debug;

use crate::token::HmacTokenResolver;

/// Tries each resolver in order; the first success wins.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn IdentityResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Names of the resolvers, in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

#[async_trait]
impl IdentityResolver for ResolverChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn resolve(&self, credential: &str) -> Result<Principal, AuthError> {
        for resolver in &self.resolvers {
            match resolver.resolve(credential).await {
                Ok(principal) => return Ok(principal),
                Err(e) => debug!(resolver = resolver.name(), error = %e, "Resolver declined credential"),
            }
        }
        Err(AuthError::InvalidCredential("credential not recognised".into()))
    }
}

/// Build the resolver chain described by `[auth]`: configured static
/// tokens first, then HMAC tokens when a secret is set.
pub fn build_from_config(config: &AppConfig) -> ResolverChain {
    let mut chain = ResolverChain::new();

    if !config.auth.tokens.is_empty() {
        let table = config
            .auth
            .tokens
            .iter()
            .fold(StaticTokenResolver::new(), |table, t| {
                table.with_token(t.token.clone(), t.user_id.clone(), t.role)
            });
        chain = chain.with(Arc::new(table));
    }

    if let Some(secret) = config.auth.token_secret.as_deref().filter(|s| !s.is_empty()) {
        chain = chain.with(Arc::new(HmacTokenResolver::new(secret)));
    }

    chain
}
