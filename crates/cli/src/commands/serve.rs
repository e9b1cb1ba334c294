//! `hrcounsel serve`: run the HTTP gateway.

use hrcounsel_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("hrcounsel gateway on http://{}:{}", config.gateway.host, config.gateway.port);
    println!("  POST /ask     ask a question (Bearer token required)");
    println!("  GET  /health  liveness\n");

    hrcounsel_gateway::start(config).await
}
