use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a stored conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Unique identifier for the session
    pub id: String,
    /// Key holder the session belongs to
    pub owner: String,
    /// User-editable display name
    pub name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last committed
    pub updated_at: DateTime<Utc>,
    /// Number of turns in the session
    pub message_count: usize,
}
