//! Session history management commands

use crate::cli::HistoryCommand;
use crate::error::{ChatgateError, Result};
use crate::gateway::quota::{CredentialStore, QuotaLedger};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{format, Table};
use std::sync::Arc;
use uuid::Uuid;

/// Handle history commands
///
/// All subcommands resolve the key to its owner first; a session can only
/// be listed, shown, renamed, or deleted by its owner.
pub async fn handle_history(command: HistoryCommand, key: String, limit: usize) -> Result<()> {
    let storage = Arc::new(SqliteStorage::new()?);
    let ledger = QuotaLedger::new(Arc::clone(&storage) as Arc<dyn CredentialStore>);
    let credential = ledger.lookup(&key).await?;

    match command {
        HistoryCommand::List => {
            let sessions = storage.list_recent(&credential.owner, limit)?;

            if sessions.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Name".bold(),
                "Turns".bold(),
                "Last Updated".bold()
            ]);

            for session in sessions {
                let id_short = &session.id[..8];
                let name = if session.name.len() > 40 {
                    format!("{}...", &session.name[..37])
                } else {
                    session.name
                };
                let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![
                    id_short.cyan(),
                    name,
                    session.message_count,
                    updated
                ]);
            }

            println!("\nConversation History:");
            table.printstd();
            println!();
            println!(
                "Use {} to resume a session.",
                "chatgate chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let session = load_owned(&storage, &id, &credential.owner)?;
            let (_, name, messages) = session;
            println!("\n{}\n", name.bold());
            for message in messages {
                match message.role.as_str() {
                    "system" => println!("{}", message.content.dimmed()),
                    "user" => println!("{} {}", ">".green().bold(), message.content),
                    _ => println!("{}", message.content),
                }
                println!();
            }
        }
        HistoryCommand::Rename { id, name } => {
            load_owned(&storage, &id, &credential.owner)?;
            storage.rename_session(&id, &name)?;
            println!("{}", format!("Renamed session {} to '{}'", id, name).green());
        }
        HistoryCommand::Delete { id } => {
            load_owned(&storage, &id, &credential.owner)?;
            storage.delete_session(&id)?;
            println!("{}", format!("Deleted session {}", id).green());
        }
    }

    Ok(())
}

/// Load a session and check it belongs to the expected owner
fn load_owned(
    storage: &SqliteStorage,
    id: &str,
    owner: &str,
) -> Result<(String, String, Vec<crate::providers::Message>)> {
    // Accept either a full UUID or an unambiguous stored id string.
    Uuid::parse_str(id)
        .map_err(|_| ChatgateError::SessionNotFound(id.to_string()))?;
    let session = storage
        .load_session(id)?
        .ok_or_else(|| ChatgateError::SessionNotFound(id.to_string()))?;
    if session.0 != owner {
        return Err(ChatgateError::InvalidCredential(
            "session belongs to another owner".to_string(),
        )
        .into());
    }
    Ok(session)
}
