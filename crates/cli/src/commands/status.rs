//! `hrcounsel status`: show effective configuration and store counts.

use hrcounsel_config::AppConfig;
use hrcounsel_core::{ConversationStore, KnowledgeStore};
use hrcounsel_gateway::Stores;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("hrcounsel status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.generation.model);
    println!("  Temperature:  {}", config.generation.temperature);
    println!(
        "  Embedding:    {} ({} dims via {})",
        config.embedding.model,
        config.embedding.dimension,
        config.embedding_provider()
    );
    println!("  Threshold:    {}", config.retrieval.similarity_threshold);
    println!("  Storage:      {}", config.storage.backend);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!(
        "  Auth:         {} static token(s), HMAC {}",
        config.auth.tokens.len(),
        if config.auth.token_secret.as_deref().is_some_and(|s| !s.is_empty()) { "enabled" } else { "disabled" }
    );

    match Stores::open(&config.storage).await {
        Ok(stores) => {
            let chunks = stores.knowledge.count().await?;
            let messages = stores.conversations.count().await?;
            println!("\n  Knowledge chunks:  {chunks}");
            println!("  Stored messages:   {messages}");
            if chunks == 0 {
                println!("\n  ⚠️  Knowledge base is empty. Run `hrcounsel ingest <file>` first");
            }
        }
        Err(e) => println!("\n  ❌ Storage unavailable: {e}"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file. Run `hrcounsel onboard` first");
    }

    Ok(())
}
