//! Per-turn orchestration
//!
//! Composes the assembler, estimator, ledger, provider, and session store
//! into the request pipeline: Assembling, Estimating, Admitting,
//! Streaming, Committing. Denied admission and failed streams exit back
//! to idle without committing; only a completed stream appends the
//! assistant turn, charges the ledger, and persists the session.
//!
//! Lock order within a turn is fixed: the per-key quota lease is acquired
//! before the per-session lock, and both are held until the turn
//! resolves. Turns on the same credential serialize at the lease; turns
//! on the same session serialize at the session lock; everything else
//! runs concurrently.

use crate::error::{ChatgateError, Result};
use crate::extract::ContentExtractor;
use crate::gateway::estimator::estimate;
use crate::gateway::prompt;
use crate::gateway::quota::QuotaLedger;
use crate::gateway::session::SessionStore;
use crate::providers::{ChatProvider, Message};
use crate::search::SearchProvider;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One user turn to run through the pipeline
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Bearer key identifying the quota-bounded user
    pub key: String,
    /// Session the turn belongs to; must be active
    pub session_id: Uuid,
    /// The raw message the user typed
    pub text: String,
    /// Pending attachments; the caller clears its buffer after submission
    /// regardless of the outcome, so files attached to a denied turn are
    /// gone
    pub attachments: Vec<PathBuf>,
    /// Whether to augment the turn with web search snippets
    pub search: bool,
}

/// Non-fatal degradations surfaced alongside a committed turn
#[derive(Debug, Clone)]
pub enum TurnWarning {
    /// Search was requested but unavailable; the turn ran without it
    SearchDegraded(String),
    /// One attachment failed extraction and was skipped
    AttachmentSkipped(String),
}

impl std::fmt::Display for TurnWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SearchDegraded(msg) => write!(f, "search degraded: {}", msg),
            Self::AttachmentSkipped(msg) => write!(f, "attachment skipped: {}", msg),
        }
    }
}

/// Result of a committed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Session the turn was applied to
    pub session_id: Uuid,
    /// Full accumulated assistant reply
    pub assistant_text: String,
    /// Units charged for the turn
    pub cost: u64,
    /// Units consumed by the key after commit
    pub used_units: u64,
    /// The key's total allowance
    pub total_units: u64,
    /// Degradations that occurred while assembling the turn
    pub warnings: Vec<TurnWarning>,
}

/// Drives the admission-controlled streaming pipeline
pub struct ChatOrchestrator {
    provider: Arc<dyn ChatProvider>,
    ledger: Arc<QuotaLedger>,
    sessions: Arc<SessionStore>,
    search: Option<Arc<dyn SearchProvider>>,
    extractor: Arc<dyn ContentExtractor>,
    commit_on_cancel: bool,
}

impl ChatOrchestrator {
    /// Create an orchestrator over its collaborators
    ///
    /// # Arguments
    ///
    /// * `provider` - Streaming model back end
    /// * `ledger` - Quota ledger shared across all turns
    /// * `sessions` - Session store shared across all turns
    /// * `search` - Optional search collaborator
    /// * `extractor` - Attachment extractor
    /// * `commit_on_cancel` - When true, a caller-cancelled stream commits
    ///   the partial reply and charges the full turn cost; when false,
    ///   cancellation takes the failed-stream exit and commits nothing
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        ledger: Arc<QuotaLedger>,
        sessions: Arc<SessionStore>,
        search: Option<Arc<dyn SearchProvider>>,
        extractor: Arc<dyn ContentExtractor>,
        commit_on_cancel: bool,
    ) -> Self {
        Self {
            provider,
            ledger,
            sessions,
            search,
            extractor,
            commit_on_cancel,
        }
    }

    /// Run one turn through the pipeline
    ///
    /// Chunks are forwarded through `chunks` as they arrive; the caller
    /// observes incremental output before the turn resolves. Dropping the
    /// receiver, or cancelling `cancel`, stops the stream promptly.
    ///
    /// # Errors
    ///
    /// * `ChatgateError::InvalidCredential` - unknown/inactive key, or a
    ///   session owned by someone else; nothing mutated
    /// * `ChatgateError::InsufficientQuota` - admission denied; the turn
    ///   is discarded without touching the session
    /// * `ChatgateError::ExtractionFailed` - every attached file failed
    /// * `ChatgateError::StreamFailed` - the stream errored or was
    ///   cancelled; the user turn stays appended in memory but no
    ///   assistant turn is added, nothing is persisted, nothing charged
    /// * `ChatgateError::PersistenceFailed` - the session could not be
    ///   saved after the ledger was already charged
    pub async fn send_turn(
        &self,
        req: TurnRequest,
        chunks: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let credential = self.ledger.lookup(&req.key).await?;
        let session_handle = self.sessions.handle(req.session_id)?;

        let mut warnings = Vec::new();

        // Assembling
        let search_block = if req.search {
            match &self.search {
                Some(provider) => match provider.search(&req.text).await {
                    Ok(block) => Some(block),
                    Err(e) => {
                        tracing::warn!("search degraded for turn: {}", e);
                        warnings.push(TurnWarning::SearchDegraded(e.to_string()));
                        None
                    }
                },
                None => {
                    warnings.push(TurnWarning::SearchDegraded(
                        "no search provider configured".to_string(),
                    ));
                    None
                }
            }
        } else {
            None
        };

        let mut file_texts = Vec::new();
        for path in &req.attachments {
            match self.extractor.extract(path).await {
                Ok(text) => file_texts.push(text),
                Err(e) => {
                    tracing::warn!("attachment skipped: {}", e);
                    warnings.push(TurnWarning::AttachmentSkipped(e.to_string()));
                }
            }
        }
        if !req.attachments.is_empty() && file_texts.is_empty() {
            return Err(ChatgateError::ExtractionFailed(
                "every attached file failed extraction".to_string(),
            )
            .into());
        }

        let assembled = prompt::assemble(&req.text, search_block.as_deref(), &file_texts);

        // Estimating
        let cost = estimate(&assembled);
        tracing::debug!(
            "turn estimated at {} units for key {}",
            cost,
            credential.owner
        );

        // Admitting. The lease is held until the turn resolves so no other
        // turn on this key can slip a commit in between.
        let lease = self.ledger.begin(&req.key).await;
        self.ledger.admit(&lease, cost).await?;

        // Streaming. Session lock acquired after the lease (fixed order).
        let mut session = session_handle.lock().await;
        if session.owner != credential.owner {
            return Err(ChatgateError::InvalidCredential(
                "session belongs to another owner".to_string(),
            )
            .into());
        }

        session.turns.push(Message::user(assembled));

        let mut stream = self
            .provider
            .stream_chat(&session.turns)
            .await
            .map_err(|e| ChatgateError::StreamFailed(e.to_string()))?;

        let mut assistant_text = String::new();
        let mut cancelled = false;
        let mut stream_error: Option<anyhow::Error> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                item = stream.next() => match item {
                    Some(Ok(chunk)) => {
                        assistant_text.push_str(&chunk);
                        if chunks.send(chunk).is_err() {
                            // Receiver dropped: the caller disconnected.
                            cancelled = true;
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        stream_error = Some(e);
                        break;
                    }
                    None => break,
                }
            }
        }
        // Dropping the stream closes the provider connection.
        drop(stream);

        if let Some(e) = stream_error {
            tracing::warn!("stream failed mid-turn: {}", e);
            return Err(ChatgateError::StreamFailed(e.to_string()).into());
        }
        if cancelled && !(self.commit_on_cancel && !assistant_text.is_empty()) {
            return Err(ChatgateError::StreamFailed("cancelled by caller".to_string()).into());
        }

        // Committing: assistant turn, ledger, then durable session, in
        // that order. A persistence failure after the ledger commit is a
        // charged-but-unsaved turn and is logged distinctly.
        session.turns.push(Message::assistant(assistant_text.clone()));

        let updated = self.ledger.commit(&lease, cost).await?;

        if let Err(e) = self.sessions.persist(&session) {
            tracing::error!(
                "session {} charged {} units but not persisted: {}",
                session.id,
                cost,
                e
            );
            return Err(ChatgateError::PersistenceFailed(e.to_string()).into());
        }

        tracing::info!(
            "turn committed: session={} cost={} used={}/{}",
            session.id,
            cost,
            updated.used_units,
            updated.total_units
        );

        Ok(TurnOutcome {
            session_id: req.session_id,
            assistant_text,
            cost,
            used_units: updated.used_units,
            total_units: updated.total_units,
            warnings,
        })
    }
}
