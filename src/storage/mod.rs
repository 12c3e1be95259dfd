use crate::error::{ChatgateError, Result};
use crate::gateway::quota::{Credential, CredentialStore};
use crate::providers::Message;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

pub mod types;
pub use types::StoredSession;

/// Alias for a deserialized session record: (owner, name, messages).
type LoadedSession = (String, String, Vec<Message>);

/// Storage backend for conversation history and credentials
///
/// One SQLite file holds both the `sessions` table (durable transcripts,
/// keyed by session id, queryable by owner) and the `api_keys` table (the
/// credential store the quota ledger runs against).
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        // Allow override of the DB path via environment variable. This
        // makes it easy to point the binary at a test DB or alternate
        // file without changing the user's application data dir.
        if let Ok(override_path) = std::env::var("CHATGATE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("io", "chatgate", "chatgate")
            .ok_or_else(|| ChatgateError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        let db_path = data_dir.join("chatgate.db");
        let storage = Self { db_path };

        storage.init()?;

        Ok(storage)
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// This is primarily useful for tests where the default application
    /// data directory is not desirable.
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatgateError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                messages JSON NOT NULL
            )",
            [],
        )
        .context("Failed to create sessions table")
        .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_owner_updated
             ON sessions (owner, updated_at DESC)",
            [],
        )
        .context("Failed to create sessions index")
        .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                used_units INTEGER NOT NULL DEFAULT 0,
                total_units INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )
        .context("Failed to create api_keys table")
        .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Save or update a session transcript
    ///
    /// Upserts by session id; `created_at` is preserved on update and
    /// `updated_at` is set to the commit time.
    pub fn upsert_session(
        &self,
        id: &str,
        owner: &str,
        name: &str,
        messages: &[Message],
    ) -> Result<()> {
        let mut conn = self.open()?;

        let messages_json = serde_json::to_string(messages)
            .context("Failed to serialize messages")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        // Check if exists to preserve created_at
        let exists: bool = tx
            .query_row("SELECT 1 FROM sessions WHERE id = ?", params![id], |_| {
                Ok(true)
            })
            .optional()
            .unwrap_or(Some(false))
            .unwrap_or(false);

        if exists {
            tx.execute(
                "UPDATE sessions SET
                    owner = ?,
                    name = ?,
                    updated_at = ?,
                    messages = ?
                WHERE id = ?",
                params![owner, name, now, messages_json, id],
            )
            .context("Failed to update session")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        } else {
            tx.execute(
                "INSERT INTO sessions (id, owner, name, created_at, updated_at, messages)
                VALUES (?, ?, ?, ?, ?, ?)",
                params![id, owner, name, now, now, messages_json],
            )
            .context("Failed to insert session")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Load a session transcript by id
    pub fn load_session(&self, id: &str) -> Result<Option<LoadedSession>> {
        let conn = self.open()?;

        let result = conn
            .query_row(
                "SELECT owner, name, messages FROM sessions WHERE id = ?",
                params![id],
                |row| {
                    let owner: String = row.get(0)?;
                    let name: String = row.get(1)?;
                    let messages_json: String = row.get(2)?;
                    Ok((owner, name, messages_json))
                },
            )
            .optional()
            .context("Failed to query session")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        match result {
            Some((owner, name, messages_json)) => {
                let messages: Vec<Message> = serde_json::from_str(&messages_json)
                    .context("Failed to deserialize messages")
                    .map_err(|e| ChatgateError::Storage(e.to_string()))?;
                Ok(Some((owner, name, messages)))
            }
            None => Ok(None),
        }
    }

    /// List an owner's sessions, most recently updated first
    pub fn list_recent(&self, owner: &str, limit: usize) -> Result<Vec<StoredSession>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, owner, name, created_at, updated_at, messages
                FROM sessions
                WHERE owner = ?
                ORDER BY updated_at DESC
                LIMIT ?",
            )
            .context("Failed to prepare statement")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        let sessions_iter = stmt
            .query_map(params![owner, limit as i64], |row| {
                let id: String = row.get(0)?;
                let owner: String = row.get(1)?;
                let name: String = row.get(2)?;
                let created_at_str: String = row.get(3)?;
                let updated_at_str: String = row.get(4)?;
                let messages_json: String = row.get(5)?;

                let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());

                let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());

                let message_count =
                    if let Ok(val) = serde_json::from_str::<serde_json::Value>(&messages_json) {
                        val.as_array().map(|a| a.len()).unwrap_or(0)
                    } else {
                        0
                    };

                Ok(StoredSession {
                    id,
                    owner,
                    name,
                    created_at,
                    updated_at,
                    message_count,
                })
            })
            .context("Failed to query sessions")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        let mut sessions = Vec::new();
        for s in sessions_iter.flatten() {
            sessions.push(s);
        }

        Ok(sessions)
    }

    /// Rename a session
    pub fn rename_session(&self, id: &str, new_name: &str) -> Result<()> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE sessions SET name = ? WHERE id = ?",
                params![new_name, id],
            )
            .context("Failed to rename session")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        if changed == 0 {
            return Err(ChatgateError::SessionNotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Delete a session record
    ///
    /// Succeeds even when the id is currently the active session; the
    /// caller is responsible for resetting active state. Idempotent.
    pub fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM sessions WHERE id = ?", params![id])
            .context("Failed to delete session")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Insert a credential row
    ///
    /// Used by deployment bootstrap and tests; key provisioning has no
    /// CLI surface.
    pub fn create_credential(&self, key: &str, owner: &str, total_units: u64) -> Result<Credential> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO api_keys (key, owner, used_units, total_units, is_active)
             VALUES (?, ?, 0, ?, 1)",
            params![key, owner, total_units as i64],
        )
        .context("Failed to insert credential")
        .map_err(|e| ChatgateError::Storage(e.to_string()))?;

        let id = conn.last_insert_rowid();
        Ok(Credential {
            id,
            key: key.to_string(),
            owner: owner.to_string(),
            used_units: 0,
            total_units,
            active: true,
        })
    }

    /// Deactivate a credential without removing its usage history
    pub fn deactivate_credential(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE api_keys SET is_active = 0 WHERE key = ?",
                params![key],
            )
            .context("Failed to deactivate credential")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        if changed == 0 {
            return Err(ChatgateError::InvalidCredential("unknown key".to_string()).into());
        }
        Ok(())
    }

    fn read_credential(&self, key: &str) -> Result<Option<Credential>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, key, owner, used_units, total_units, is_active
             FROM api_keys WHERE key = ?",
            params![key],
            |row| {
                Ok(Credential {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    owner: row.get(2)?,
                    used_units: row.get::<_, i64>(3)? as u64,
                    total_units: row.get::<_, i64>(4)? as u64,
                    active: row.get::<_, i64>(5)? != 0,
                })
            },
        )
        .optional()
        .context("Failed to query credential")
        .map_err(|e| ChatgateError::Storage(e.to_string()).into())
    }

    fn write_credential_used(&self, key: &str, used_units: u64) -> Result<()> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE api_keys SET used_units = ? WHERE key = ?",
                params![used_units as i64, key],
            )
            .context("Failed to update credential usage")
            .map_err(|e| ChatgateError::Storage(e.to_string()))?;
        if changed == 0 {
            return Err(ChatgateError::InvalidCredential("unknown key".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteStorage {
    async fn read(&self, key: &str) -> Result<Option<Credential>> {
        self.read_credential(key)
    }

    async fn write_used(&self, key: &str, used_units: u64) -> Result<()> {
        self.write_credential_used(key, used_units)
    }
}
