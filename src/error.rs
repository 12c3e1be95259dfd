//! Error types for chatgate
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatgate operations
///
/// This enum encompasses all possible errors that can occur while
/// validating credentials, enforcing quotas, streaming completions,
/// and persisting conversation history.
///
/// Only `InvalidCredential`, `InsufficientQuota`, and `StreamFailed` are
/// expected to reach the end user as distinct messages. `SearchUnavailable`
/// and `ExtractionFailed` are absorbed with degraded behavior where
/// possible; `PersistenceFailed` is an operational alert.
#[derive(Error, Debug)]
pub enum ChatgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown, malformed, or inactive user key
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Admission denied: the turn would reach or exceed the key's allowance
    #[error("Insufficient quota: {used}/{total} units used, turn costs {requested}")]
    InsufficientQuota {
        /// Units already consumed by this key
        used: u64,
        /// Total allowance for this key
        total: u64,
        /// Estimated cost of the rejected turn
        requested: u64,
    },

    /// Web search collaborator failed; the turn degrades and continues
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// An attached file could not be turned into text
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The model stream ended with a transport or provider error
    #[error("Stream failed: {0}")]
    StreamFailed(String),

    /// Session persistence failed after the ledger was already charged
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Provider-related errors (request building, bad responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Conversation or credential storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session lookup failed
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for chatgate operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

impl ChatgateError {
    /// Returns true for errors that should be rendered to the end user
    /// as a distinct message rather than logged as operational noise.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential(_) | Self::InsufficientQuota { .. } | Self::StreamFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ChatgateError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_invalid_credential_display() {
        let error = ChatgateError::InvalidCredential("unknown key".to_string());
        assert_eq!(error.to_string(), "Invalid credential: unknown key");
    }

    #[test]
    fn test_insufficient_quota_display() {
        let error = ChatgateError::InsufficientQuota {
            used: 9,
            total: 10,
            requested: 1,
        };
        let s = error.to_string();
        assert!(s.contains("9/10"));
        assert!(s.contains("costs 1"));
    }

    #[test]
    fn test_stream_failed_display() {
        let error = ChatgateError::StreamFailed("connection reset".to_string());
        assert_eq!(error.to_string(), "Stream failed: connection reset");
    }

    #[test]
    fn test_persistence_failed_display() {
        let error = ChatgateError::PersistenceFailed("disk full".to_string());
        assert_eq!(error.to_string(), "Persistence failed: disk full");
    }

    #[test]
    fn test_search_unavailable_display() {
        let error = ChatgateError::SearchUnavailable("timeout".to_string());
        assert_eq!(error.to_string(), "Search unavailable: timeout");
    }

    #[test]
    fn test_extraction_failed_display() {
        let error = ChatgateError::ExtractionFailed("unsupported: report.pdf".to_string());
        assert!(error.to_string().contains("report.pdf"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ChatgateError = io_error.into();
        assert!(matches!(error, ChatgateError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: ChatgateError = json_error.into();
        assert!(matches!(error, ChatgateError::Serialization(_)));
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(ChatgateError::InvalidCredential("x".into()).is_user_facing());
        assert!(ChatgateError::StreamFailed("x".into()).is_user_facing());
        assert!(ChatgateError::InsufficientQuota {
            used: 0,
            total: 0,
            requested: 0
        }
        .is_user_facing());
        assert!(!ChatgateError::SearchUnavailable("x".into()).is_user_facing());
        assert!(!ChatgateError::PersistenceFailed("x".into()).is_user_facing());
        assert!(!ChatgateError::Storage("x".into()).is_user_facing());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatgateError>();
    }
}
