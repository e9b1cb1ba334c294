//! HMAC-signed bearer tokens.
//!
//! A token reads `<user_id>.<role|any>.<hex signature>`, where the signature
//! is HMAC-SHA256 over `<user_id>.<role|any>` keyed by the deployment secret.
//! Tokens carry no expiry; rotating the secret revokes all of them.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use hrcounsel_core::error::AuthError;
use hrcounsel_core::{IdentityResolver, Principal, Role};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const ANY_ROLE: &str = "any";

/// Issues and verifies HMAC-signed bearer tokens.
#[derive(Clone)]
pub struct HmacTokenResolver {
    mac: HmacSha256,
}

impl std::fmt::Debug for HmacTokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenResolver").finish_non_exhaustive()
    }
}

impl HmacTokenResolver {
    pub fn new(secret: &str) -> Self {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        Self { mac }
    }

    /// Issue a token for `user_id`, optionally pinned to a role.
    pub fn mint(&self, user_id: &str, role: Option<Role>) -> String {
        let claims = format!("{user_id}.{}", role.map(|r| r.as_str()).unwrap_or(ANY_ROLE));
        let mut mac = self.mac.clone();
        mac.update(claims.as_bytes());
        format!("{claims}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a token's signature and decode its claims.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let invalid = |why: &str| AuthError::InvalidCredential(why.to_string());

        // The user id may itself contain dots, so split from the right
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(role), Some(user_id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("malformed token"));
        };
        if user_id.is_empty() {
            return Err(invalid("malformed token"));
        }

        let provided = hex::decode(signature).map_err(|_| invalid("malformed signature"))?;
        let mut mac = self.mac.clone();
        mac.update(format!("{user_id}.{role}").as_bytes());
        // Constant-time comparison
        mac.verify_slice(&provided).map_err(|_| invalid("bad signature"))?;

        let role = match role {
            ANY_ROLE => None,
            other => Some(other.parse::<Role>().map_err(|_| invalid("unknown role claim"))?),
        };
        Ok(Principal {
            id: user_id.to_string(),
            role,
        })
    }
}

#[async_trait]
impl IdentityResolver for HmacTokenResolver {
    fn name(&self) -> &str {
        "hmac"
    }

    async fn resolve(&self, credential: &str) -> Result<Principal, AuthError> {
        self.verify(credential)
    }
}
