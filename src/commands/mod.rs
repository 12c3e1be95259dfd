//! Command handlers for the chatgate CLI
//!
//! The chat REPL drives the turn pipeline interactively; history
//! management lives in the `history` submodule.

pub mod history;

use crate::config::Config;
use crate::error::{ChatgateError, Result};
use crate::extract::FileExtractor;
use crate::gateway::orchestrator::{ChatOrchestrator, TurnRequest};
use crate::gateway::quota::{CredentialStore, QuotaLedger};
use crate::gateway::session::SessionStore;
use crate::providers::{ChatProvider, Message, OpenAiProvider};
use crate::search::{HttpSearchProvider, SearchProvider};
use crate::storage::SqliteStorage;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Run the interactive chat loop
///
/// Validates the key up front, starts (or resumes) a session, then reads
/// turns from the terminal and streams replies as they arrive. Pending
/// attachments are consumed by the next submission whether or not it
/// succeeds.
pub async fn run_chat(
    config: Config,
    key: String,
    resume: Option<String>,
    search: bool,
    attach: Vec<PathBuf>,
) -> Result<()> {
    let storage = Arc::new(SqliteStorage::new()?);
    let ledger = Arc::new(QuotaLedger::new(
        Arc::clone(&storage) as Arc<dyn CredentialStore>
    ));
    let credential = match ledger.lookup(&key).await {
        Ok(credential) => credential,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            return Ok(());
        }
    };

    let sessions = Arc::new(SessionStore::new(Arc::clone(&storage)));
    let provider: Arc<dyn ChatProvider> = Arc::new(OpenAiProvider::new(
        &config.provider.base_url,
        config.provider.api_key()?,
        &config.provider.model,
    ));
    let search_provider: Option<Arc<dyn SearchProvider>> = config
        .search
        .endpoint
        .as_ref()
        .map(|endpoint| {
            Arc::new(HttpSearchProvider::new(endpoint, config.search.api_key()))
                as Arc<dyn SearchProvider>
        });

    let orchestrator = ChatOrchestrator::new(
        provider,
        Arc::clone(&ledger),
        Arc::clone(&sessions),
        search_provider,
        Arc::new(FileExtractor),
        config.gateway.commit_on_cancel,
    );

    let system_turns = vec![Message::system(config.gateway.system_prompt.clone())];
    let mut session_id = match &resume {
        Some(id) => {
            let id = Uuid::parse_str(id)
                .map_err(|_| ChatgateError::SessionNotFound(id.clone()))?;
            sessions.load(id, &credential.owner)?
        }
        None => sessions.start_new(&credential.owner, system_turns.clone()),
    };

    let mut search_enabled = search;
    let mut pending: Vec<PathBuf> = attach;

    println!(
        "{} model={} usage={}/{} units",
        "chatgate".bold(),
        config.provider.model.cyan(),
        credential.used_units,
        credential.total_units
    );
    println!("{}", "Type /help for commands, /quit to exit.".dimmed());

    let mut editor = DefaultEditor::new().map_err(|e| ChatgateError::Config(e.to_string()))?;

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "(interrupted, /quit to exit)".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(ChatgateError::Config(e.to_string()).into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        if let Some(command) = input.strip_prefix('/') {
            let mut parts = command.splitn(2, ' ');
            match (parts.next().unwrap_or(""), parts.next()) {
                ("quit", _) | ("exit", _) => break,
                ("help", _) => print_help(),
                ("new", _) => {
                    // Carry the system preamble over, drop everything else.
                    let preamble = match sessions.handle(session_id) {
                        Ok(handle) => handle.lock().await.system_turns(),
                        Err(_) => system_turns.clone(),
                    };
                    session_id = sessions.start_new(&credential.owner, preamble);
                    println!("{}", format!("Started session {}", session_id).green());
                }
                ("sessions", _) => {
                    let recent =
                        sessions.list_recent(&credential.owner, config.gateway.history_limit)?;
                    if recent.is_empty() {
                        println!("{}", "No stored sessions.".yellow());
                    }
                    for session in recent {
                        println!(
                            "{}  {}  ({} turns)",
                            session.id[..8].cyan(),
                            session.name,
                            session.message_count
                        );
                    }
                }
                ("quota", _) => match ledger.lookup(&key).await {
                    Ok(current) => println!(
                        "{} used of {} units",
                        current.used_units, current.total_units
                    ),
                    Err(e) => eprintln!("{}", render_error(&e)),
                },
                ("search", _) => {
                    search_enabled = !search_enabled;
                    println!(
                        "search {}",
                        if search_enabled {
                            "enabled".green()
                        } else {
                            "disabled".yellow()
                        }
                    );
                }
                ("attach", Some(path)) => {
                    pending.push(PathBuf::from(path.trim()));
                    println!("{} file(s) pending", pending.len());
                }
                ("attach", None) => println!("usage: /attach <path>"),
                (other, _) => println!("unknown command: /{}", other),
            }
            continue;
        }

        let request = TurnRequest {
            key: key.clone(),
            session_id,
            text: input.to_string(),
            attachments: pending.clone(),
            search: search_enabled,
        };
        // Consumed exactly once, whatever happens downstream.
        pending.clear();

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            }
        });

        let cancel = CancellationToken::new();
        let turn = orchestrator.send_turn(request, tx, cancel.clone());
        tokio::pin!(turn);
        let result = tokio::select! {
            res = &mut turn => res,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn.await
            }
        };
        let _ = printer.await;
        println!();

        match result {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    println!("{}", format!("warning: {}", warning).yellow());
                }
                println!(
                    "{}",
                    format!(
                        "[{} units this turn, {}/{} used]",
                        outcome.cost, outcome.used_units, outcome.total_units
                    )
                    .dimmed()
                );
            }
            Err(e) => eprintln!("{}", render_error(&e)),
        }
    }

    Ok(())
}

fn print_help() {
    println!("/new            start a fresh session (keeps the system preamble)");
    println!("/sessions       list recent sessions");
    println!("/quota          show usage for the active key");
    println!("/search         toggle web search augmentation");
    println!("/attach <path>  attach a file to the next turn");
    println!("/quit           exit");
}

/// Render an error for the terminal
///
/// User-facing errors get a distinct message; everything else is shown
/// generically (details are in the logs).
fn render_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ChatgateError>() {
        Some(e @ ChatgateError::InsufficientQuota { .. }) => {
            format!("{}", format!("{} - contact your administrator", e).yellow())
        }
        Some(e @ ChatgateError::InvalidCredential(_)) => format!("{}", e.to_string().red()),
        Some(e @ ChatgateError::StreamFailed(_)) => format!(
            "{}",
            format!("{} (partial output above is not saved)", e).red()
        ),
        Some(e) => format!("{}", e.to_string().red()),
        None => format!("{}", error.to_string().red()),
    }
}
