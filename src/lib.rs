//! chatgate - quota-enforced streaming chat gateway library
//!
//! This library implements a multi-tenant chat front end that proxies a
//! streaming model API: it validates per-user bearer keys, enforces
//! usage quotas with admission control, augments prompts with web search
//! and uploaded files, streams replies incrementally, and durably commits
//! conversation history and usage counters.
//!
//! # Architecture
//!
//! - `gateway`: the core pipeline (quota ledger, cost estimator, prompt
//!   assembler, session store, orchestrator)
//! - `providers`: streaming model provider abstraction and the
//!   OpenAI-compatible implementation
//! - `storage`: SQLite persistence for sessions and credentials
//! - `search` / `extract`: collaborator contracts for web search and
//!   uploaded-file extraction
//! - `config`: configuration management
//! - `error`: error types and result alias
//! - `cli` / `commands`: terminal front end
//!
//! # Example
//!
//! ```no_run
//! use chatgate::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod providers;
pub mod search;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatgateError, Result};
pub use gateway::{ChatOrchestrator, QuotaLedger, SessionStore, TurnOutcome, TurnRequest};
pub use providers::{ChatProvider, Message};

#[cfg(test)]
pub mod test_utils;
