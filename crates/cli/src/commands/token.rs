//! `hrcounsel token`: mint an HMAC bearer token.

use hrcounsel_config::AppConfig;
use hrcounsel_core::Role;
use hrcounsel_security::HmacTokenResolver;

pub fn run(user: String, role: Option<Role>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let secret = config
        .auth
        .token_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or("auth.token_secret is not set (or export HRCOUNSEL_TOKEN_SECRET)")?;

    if user.is_empty() || user.contains('.') {
        return Err("user id must be non-empty and must not contain '.'".into());
    }

    println!("{}", HmacTokenResolver::new(secret).mint(&user, role));
    Ok(())
}
