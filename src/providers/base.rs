//! Base provider trait and common types for chatgate
//!
//! This module defines the ChatProvider trait that all model providers must
//! implement, along with the message type shared by the session store, the
//! orchestrator, and the wire protocol.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Message structure for conversation
///
/// Represents one turn in the conversation. The full ordered turn list,
/// including the system preamble, is resent to the provider on every
/// completion request; no server-side conversation state is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Arguments
    ///
    /// * `content` - The message content
    ///
    /// # Examples
    ///
    /// ```
    /// use chatgate::providers::Message;
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    ///
    /// # Arguments
    ///
    /// * `content` - The message content
    ///
    /// # Examples
    ///
    /// ```
    /// use chatgate::providers::Message;
    ///
    /// let msg = Message::assistant("Hello, user!");
    /// assert_eq!(msg.role, "assistant");
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new system message
    ///
    /// # Arguments
    ///
    /// * `content` - The message content
    ///
    /// # Examples
    ///
    /// ```
    /// use chatgate::providers::Message;
    ///
    /// let msg = Message::system("You are a helpful assistant");
    /// assert_eq!(msg.role, "system");
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Returns true if this turn is part of the fixed system preamble
    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// A finite, non-restartable lazy sequence of completion text chunks
///
/// The sequence terminates when the provider signals end-of-stream. A
/// transport error mid-stream surfaces as a terminal `Err` item, never as
/// a silent truncation; chunks already yielded remain with the caller.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Provider trait for streaming model back ends
///
/// All model providers must implement this trait. Each call opens a fresh
/// completion request carrying the full ordered message history; the
/// returned stream yields incremental text deltas.
///
/// # Examples
///
/// ```no_run
/// use chatgate::providers::{ChatProvider, ChunkStream, Message};
/// use chatgate::error::Result;
/// use async_trait::async_trait;
/// use futures::stream;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl ChatProvider for EchoProvider {
///     async fn stream_chat(&self, _messages: &[Message]) -> Result<ChunkStream> {
///         Ok(Box::pin(stream::iter(vec![Ok("hello".to_string())])))
///     }
///
///     fn model(&self) -> &str {
///         "echo"
///     }
/// }
/// ```
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Opens a streaming completion request for the given history
    ///
    /// # Arguments
    ///
    /// * `messages` - Full ordered conversation history, including the
    ///   just-appended user turn
    ///
    /// # Returns
    ///
    /// Returns a stream of incremental text chunks
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be opened; errors after the
    /// stream has started are delivered as stream items
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChunkStream>;

    /// Model identifier sent with each request
    fn model(&self) -> &str;
}
