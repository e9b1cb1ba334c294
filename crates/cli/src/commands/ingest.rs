//! `hrcounsel ingest`: load a labor-code document into the knowledge base.

use std::path::PathBuf;

use hrcounsel_config::AppConfig;
use hrcounsel_core::KnowledgeStore;
use hrcounsel_gateway::build_services;
use hrcounsel_memory::ingest_document;

const BATCH_SIZE: usize = 10;

pub async fn run(path: PathBuf, replace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;

    let services = build_services(&config).await?;
    let report = ingest_document(
        &text,
        services.embedder.as_ref(),
        services.stores.knowledge.as_ref(),
        replace,
        BATCH_SIZE,
    )
    .await?;

    println!("\n📚 Ingest complete: {}", path.display());
    println!("  Chunks parsed:    {}", report.parsed);
    println!("  Chunks stored:    {}", report.inserted);
    if report.failed > 0 {
        println!("  Chunks failed:    {}", report.failed);
    }

    println!("\n  By role:");
    for (role, count) in &report.per_role {
        println!("    {:<10} {count}", role.as_str());
    }

    println!("\n  Top topics:");
    for (topic, count) in report.top_topics(5) {
        println!("    {topic:<14} {count}");
    }

    println!("\n  Knowledge base now holds {} chunks", services.stores.knowledge.count().await?);
    Ok(())
}
