//! Active conversation sessions
//!
//! Owns the in-memory ordered turn list for each active conversation and
//! moves transcripts to and from durable storage. Session identifiers are
//! threaded through every call; there is no ambient "current session"
//! pointer. Each active session sits behind its own async mutex, so turns
//! within one session apply in send order while different sessions never
//! contend.

use crate::error::{ChatgateError, Result};
use crate::providers::Message;
use crate::storage::{SqliteStorage, StoredSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Display names derived from the first user turn are capped at this many
/// characters.
const NAME_MAX_CHARS: usize = 40;

/// One active conversation's in-memory state
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Session identifier, generated at session start
    pub id: Uuid,
    /// Key holder the session belongs to
    pub owner: String,
    /// User-editable display name; derived from the first user turn when
    /// unset
    pub name: Option<String>,
    /// Ordered turn list; system preamble first, then append-only
    pub turns: Vec<Message>,
}

impl ActiveSession {
    /// Resolve the display name used when persisting
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.turns
            .iter()
            .find(|t| t.role == "user")
            .map(|t| truncate_chars(&t.content, NAME_MAX_CHARS))
            .unwrap_or_else(|| "New session".to_string())
    }

    /// The system preamble turns, in order
    pub fn system_turns(&self) -> Vec<Message> {
        self.turns.iter().filter(|t| t.is_system()).cloned().collect()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

/// Manages active sessions and their durable records
pub struct SessionStore {
    storage: Arc<SqliteStorage>,
    active: Mutex<HashMap<Uuid, Arc<AsyncMutex<ActiveSession>>>>,
}

impl SessionStore {
    /// Create a session store over the durable backend
    pub fn new(storage: Arc<SqliteStorage>) -> Self {
        Self {
            storage,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start a fresh session
    ///
    /// Generates a new UUID and resets the in-memory turn list to exactly
    /// the provided system turns. Used both for the first session and for
    /// the "new session" action, where the caller passes the preamble
    /// carried over from the previous session.
    pub fn start_new(&self, owner: &str, system_turns: Vec<Message>) -> Uuid {
        let id = Uuid::new_v4();
        let session = ActiveSession {
            id,
            owner: owner.to_string(),
            name: None,
            turns: system_turns,
        };
        self.active
            .lock()
            .expect("active map poisoned")
            .insert(id, Arc::new(AsyncMutex::new(session)));
        id
    }

    /// Handle to an active session's lock
    ///
    /// The orchestrator holds this lock for the span of a turn so that
    /// concurrent turns against the same session serialize.
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::SessionNotFound` if the id is not active
    pub fn handle(&self, id: Uuid) -> Result<Arc<AsyncMutex<ActiveSession>>> {
        self.active
            .lock()
            .expect("active map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| ChatgateError::SessionNotFound(id.to_string()).into())
    }

    /// Append one turn to an active session
    pub async fn append(&self, id: Uuid, turn: Message) -> Result<()> {
        let handle = self.handle(id)?;
        let mut session = handle.lock().await;
        session.turns.push(turn);
        Ok(())
    }

    /// Persist a session snapshot
    ///
    /// Upserts the durable record keyed by session id; the full turn
    /// sequence including the system preamble is what is stored and later
    /// restored.
    pub fn persist(&self, session: &ActiveSession) -> Result<()> {
        self.storage.upsert_session(
            &session.id.to_string(),
            &session.owner,
            &session.display_name(),
            &session.turns,
        )
    }

    /// Load a stored session into the active map, replacing any in-memory
    /// state for that id wholesale
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::SessionNotFound` for unknown ids and
    /// `ChatgateError::InvalidCredential` when the session belongs to a
    /// different owner.
    pub fn load(&self, id: Uuid, expected_owner: &str) -> Result<Uuid> {
        let (owner, name, turns) = self
            .storage
            .load_session(&id.to_string())?
            .ok_or_else(|| ChatgateError::SessionNotFound(id.to_string()))?;
        if owner != expected_owner {
            return Err(ChatgateError::InvalidCredential(
                "session belongs to another owner".to_string(),
            )
            .into());
        }
        let session = ActiveSession {
            id,
            owner,
            name: Some(name),
            turns,
        };
        self.active
            .lock()
            .expect("active map poisoned")
            .insert(id, Arc::new(AsyncMutex::new(session)));
        Ok(id)
    }

    /// List an owner's stored sessions, most recently updated first
    pub fn list_recent(&self, owner: &str, limit: usize) -> Result<Vec<StoredSession>> {
        self.storage.list_recent(owner, limit)
    }

    /// Rename a session in storage and, if active, in memory
    pub async fn rename(&self, id: Uuid, new_name: &str) -> Result<()> {
        self.storage.rename_session(&id.to_string(), new_name)?;
        if let Ok(handle) = self.handle(id) {
            handle.lock().await.name = Some(new_name.to_string());
        }
        Ok(())
    }

    /// Delete a session's durable record and drop it from the active map
    ///
    /// Succeeds even when the session is currently active; the caller is
    /// responsible for starting a new session afterwards.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.storage.delete_session(&id.to_string())?;
        self.active
            .lock()
            .expect("active map poisoned")
            .remove(&id);
        Ok(())
    }

    /// Snapshot of an active session's turns
    pub async fn snapshot(&self, id: Uuid) -> Result<Vec<Message>> {
        let handle = self.handle(id)?;
        let session = handle.lock().await;
        Ok(session.turns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let storage = SqliteStorage::new_with_path(dir.path().join("chatgate.db"))
            .expect("storage");
        (SessionStore::new(Arc::new(storage)), dir)
    }

    fn preamble() -> Vec<Message> {
        vec![Message::system("You are a helpful assistant.")]
    }

    #[tokio::test]
    async fn test_start_new_resets_to_system_turns() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        let turns = store.snapshot(id).await.expect("snapshot");
        assert_eq!(turns.len(), 1);
        assert!(turns[0].is_system());
    }

    #[tokio::test]
    async fn test_append_keeps_order() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store.append(id, Message::user("q")).await.expect("append");
        store
            .append(id, Message::assistant("a"))
            .await
            .expect("append");

        let turns = store.snapshot(id).await.expect("snapshot");
        let roles: Vec<&str> = turns.iter().map(|t| t.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[tokio::test]
    async fn test_reset_carries_system_turns_with_fresh_id() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store.append(id, Message::user("q")).await.expect("append");
        store
            .append(id, Message::assistant("a"))
            .await
            .expect("append");

        let handle = store.handle(id).expect("handle");
        let system_turns = handle.lock().await.system_turns();
        let new_id = store.start_new("alice", system_turns);

        assert_ne!(new_id, id);
        let turns = store.snapshot(new_id).await.expect("snapshot");
        assert_eq!(turns.len(), 1);
        assert!(turns[0].is_system());
    }

    #[tokio::test]
    async fn test_persist_and_load_roundtrip() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store
            .append(id, Message::user("what is rust?"))
            .await
            .expect("append");
        store
            .append(id, Message::assistant("a language"))
            .await
            .expect("append");

        {
            let handle = store.handle(id).expect("handle");
            let session = handle.lock().await;
            store.persist(&session).expect("persist");
        }

        // Listing and loading read from the durable record.
        let listed = store.list_recent("alice", 10).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "what is rust?");

        let loaded = store.load(id, "alice").expect("load");
        let turns = store.snapshot(loaded).await.expect("snapshot");
        assert_eq!(turns.len(), 3);
    }

    #[tokio::test]
    async fn test_load_rejects_wrong_owner() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store.append(id, Message::user("q")).await.expect("append");
        {
            let handle = store.handle(id).expect("handle");
            let session = handle.lock().await;
            store.persist(&session).expect("persist");
        }

        assert!(store.load(id, "mallory").is_err());
    }

    #[tokio::test]
    async fn test_load_unknown_session() {
        let (store, _dir) = test_store();
        assert!(store.load(Uuid::new_v4(), "alice").is_err());
    }

    #[tokio::test]
    async fn test_delete_active_session_succeeds() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store.append(id, Message::user("q")).await.expect("append");
        {
            let handle = store.handle(id).expect("handle");
            let session = handle.lock().await;
            store.persist(&session).expect("persist");
        }

        store.delete(id).expect("delete");
        assert!(store.handle(id).is_err());
        assert!(store.list_recent("alice", 10).expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_rename_updates_storage_and_memory() {
        let (store, _dir) = test_store();
        let id = store.start_new("alice", preamble());
        store.append(id, Message::user("q")).await.expect("append");
        {
            let handle = store.handle(id).expect("handle");
            let session = handle.lock().await;
            store.persist(&session).expect("persist");
        }

        store.rename(id, "My chat").await.expect("rename");
        let listed = store.list_recent("alice", 10).expect("list");
        assert_eq!(listed[0].name, "My chat");

        let handle = store.handle(id).expect("handle");
        assert_eq!(handle.lock().await.display_name(), "My chat");
    }

    #[test]
    fn test_display_name_truncates_long_first_message() {
        let long = "x".repeat(60);
        let session = ActiveSession {
            id: Uuid::new_v4(),
            owner: "alice".to_string(),
            name: None,
            turns: vec![Message::system("p"), Message::user(long)],
        };
        let name = session.display_name();
        assert!(name.ends_with("..."));
        assert_eq!(name.chars().count(), NAME_MAX_CHARS + 3);
    }

    #[test]
    fn test_display_name_defaults_without_user_turn() {
        let session = ActiveSession {
            id: Uuid::new_v4(),
            owner: "alice".to_string(),
            name: None,
            turns: vec![Message::system("p")],
        };
        assert_eq!(session.display_name(), "New session");
    }
}
