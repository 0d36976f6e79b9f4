//! Parley - chat relay server and terminal client
//!
#![doc = "Parley - chat relay server and terminal client"]
#![doc = "Main entry point for the Parley application."]

use anyhow::Result;

use parley::cli::{Cli, Commands};
use parley::commands;
use parley::config::Config;
use parley::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_logging(cli.verbose, cli.json_logs)?;

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { .. } => {
            commands::serve::run_server(config).await?;
            Ok(())
        }
        Commands::Chat { .. } => {
            tracing::info!("Starting interactive chat mode");
            commands::chat::run_chat(&config.client.server_url).await?;
            Ok(())
        }
        Commands::Sessions { command, .. } => {
            tracing::debug!("Starting sessions command");
            commands::sessions::handle_sessions(&config.client.server_url, command).await?;
            Ok(())
        }
    }
}
