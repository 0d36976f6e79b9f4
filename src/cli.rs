//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the server and talking to it.

use clap::{Parser, Subcommand};

/// Parley - chat relay server and terminal client
///
/// Persists chat sessions and relays them to an LLM chat completion API.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PARLEY_LOG_JSON")]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Interface to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT and config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Persistence connection string (overrides DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Keep sessions in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Start an interactive chat against a running server
    Chat {
        /// Server base URL (overrides config)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Manage stored sessions on a running server
    Sessions {
        /// Server base URL (overrides config)
        #[arg(short, long)]
        server: Option<String>,

        /// Session subcommand
        #[command(subcommand)]
        command: SessionsCommand,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionsCommand {
    /// List sessions, most recently updated first
    List,

    /// Delete a session
    Delete {
        /// Session identifier
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_parse() {
        let cli = Cli::parse_from([
            "parley",
            "serve",
            "--port",
            "8080",
            "--database-url",
            "sqlite://chat.db",
        ]);
        match cli.command {
            Commands::Serve {
                port,
                database_url,
                ephemeral,
                ..
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(database_url.as_deref(), Some("sqlite://chat.db"));
                assert!(!ephemeral);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_sessions_delete_parses_id() {
        let cli = Cli::parse_from(["parley", "sessions", "delete", "01HXYZ"]);
        match cli.command {
            Commands::Sessions {
                command: SessionsCommand::Delete { id },
                ..
            } => assert_eq!(id, "01HXYZ"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["parley", "chat"]);
        assert_eq!(cli.config.as_deref(), Some("config/config.yaml"));
    }
}
