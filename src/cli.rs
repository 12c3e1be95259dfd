//! Command-line interface definition for chatgate
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive chat command and session history management.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatgate - quota-enforced streaming chat gateway
///
/// Chat through a streaming model provider with per-key usage quotas,
/// persistent conversation history, and optional search and file
/// augmentation.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the database path (also via CHATGATE_DB)
    #[arg(long)]
    pub db: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatgate
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// User key for quota accounting
        #[arg(short, long, env = "CHATGATE_USER_KEY")]
        key: String,

        /// Resume a stored session by id
        #[arg(short, long)]
        resume: Option<String>,

        /// Augment turns with web search results
        #[arg(short, long)]
        search: bool,

        /// Attach files to the first turn (repeatable)
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },

    /// Manage stored conversation history
    History {
        /// User key owning the sessions
        #[arg(short, long, env = "CHATGATE_USER_KEY")]
        key: String,

        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List recent sessions, most recently updated first
    List,

    /// Print a stored session transcript
    Show {
        /// Session id
        id: String,
    },

    /// Rename a session
    Rename {
        /// Session id
        id: String,

        /// New display name
        name: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
