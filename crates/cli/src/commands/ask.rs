//! `hrcounsel ask`: answer one question in-process.

use hrcounsel_assistant::AskRequest;
use hrcounsel_config::{AppConfig, StaticTokenConfig};
use hrcounsel_gateway::build_services;

/// Credential the local operator acts under; it never leaves the process.
const LOCAL_TOKEN: &str = "cli-local";

pub async fn run(
    user: String,
    role: String,
    session: Option<String>,
    question: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.auth.tokens.push(StaticTokenConfig {
        token: LOCAL_TOKEN.into(),
        user_id: user,
        role: None,
    });

    let services = build_services(&config).await?;
    let request = AskRequest {
        question: Some(question),
        role: Some(role),
        session_id: session,
    };
    let response = services.session.ask(Some(LOCAL_TOKEN), request).await?;

    println!("\n{}\n", response.answer);

    if !response.sources.is_empty() {
        println!("Sources:");
        for (i, source) in response.sources.iter().enumerate() {
            let label = source
                .article
                .as_deref()
                .map(|a| format!("Article {a}"))
                .unwrap_or_else(|| source.section.clone());
            println!("  [{}] {label} ({}% match)", i + 1, source.similarity);
        }
        println!();
    }

    let used = response.context_used;
    println!("Session: {}", response.session_id);
    println!(
        "Context: {} session message(s), {} summary(ies), {} related discussion(s)",
        used.current_session, used.summaries, used.related_past_discussions
    );
    Ok(())
}
