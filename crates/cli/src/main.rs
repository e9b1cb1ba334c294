//! hrcounsel CLI, the main entry point.
//!
//! Commands:
//! - `onboard`  Initialize config
//! - `serve`    Start the HTTP gateway
//! - `ask`      Ask one question in-process
//! - `ingest`   Load a labor-code document into the knowledge base
//! - `token`    Mint a bearer token
//! - `status`   Show configuration and store counts

use clap::{Parser, Subcommand};
use hrcounsel_core::Role;

mod commands;

#[derive(Parser)]
#[command(
    name = "hrcounsel",
    about = "hrcounsel: labor-law Q&A assistant for candidates, recruiters and admins",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// User the turn is recorded under
        #[arg(short, long)]
        user: String,

        /// Audience role: candidate, recruiter or admin
        #[arg(short, long, default_value = "candidate")]
        role: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        question: String,
    },

    /// Ingest a labor-code markdown document
    Ingest {
        path: std::path::PathBuf,

        /// Clear the knowledge base first
        #[arg(long)]
        replace: bool,
    },

    /// Mint an HMAC bearer token
    Token {
        #[arg(short, long)]
        user: String,

        /// Pin the token to one role
        #[arg(short, long)]
        role: Option<Role>,
    },

    /// Show system status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { user, role, session, question } => {
            commands::ask::run(user, role, session, question).await?
        }
        Commands::Ingest { path, replace } => commands::ingest::run(path, replace).await?,
        Commands::Token { user, role } => commands::token::run(user, role)?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
