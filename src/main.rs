//! chatgate - quota-enforced streaming chat gateway
//!
#![doc = "Main entry point for the chatgate application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatgate::cli::{Cli, Commands};
use chatgate::commands;
use chatgate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    // If the user supplied a database path on the CLI, mirror it into
    // CHATGATE_DB so the storage initializer can pick it up.
    if let Some(db_path) = &cli.db {
        std::env::set_var("CHATGATE_DB", db_path);
        tracing::info!("Using database override from CLI: {}", db_path);
    }

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path)?;
    config.validate()?;

    match cli.command {
        Commands::Chat {
            key,
            resume,
            search,
            attach,
        } => {
            tracing::info!("Starting interactive chat");
            if let Some(r) = &resume {
                tracing::debug!("Resuming session: {}", r);
            }
            commands::run_chat(config, key, resume, search, attach).await?;
            Ok(())
        }
        Commands::History { key, command } => {
            commands::history::handle_history(command, key, config.gateway.history_limit).await?;
            Ok(())
        }
    }
}

/// Initialize the tracing subscriber
///
/// Uses RUST_LOG when set, defaulting to warnings plus chatgate info.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,chatgate=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
