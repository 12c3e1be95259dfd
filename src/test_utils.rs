//! Test utilities for chatgate
//!
//! This module provides common test doubles: an in-memory credential
//! store, a scripted streaming provider, and canned search collaborators.

use crate::error::{ChatgateError, Result};
use crate::gateway::quota::{Credential, CredentialStore};
use crate::providers::{ChatProvider, ChunkStream, Message};
use crate::search::SearchProvider;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory credential store
///
/// Backs the quota ledger in unit tests; counts reads so tests can assert
/// that malformed keys never reach the store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<HashMap<String, Credential>>,
    reads: AtomicUsize,
}

impl MemoryCredentialStore {
    /// Insert or replace a credential
    pub fn insert(&self, credential: Credential) {
        self.inner
            .lock()
            .expect("store poisoned")
            .insert(credential.key.clone(), credential);
    }

    /// Number of `read` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<Credential>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.lock().expect("store poisoned").get(key).cloned())
    }

    async fn write_used(&self, key: &str, used_units: u64) -> Result<()> {
        let mut inner = self.inner.lock().expect("store poisoned");
        let credential = inner
            .get_mut(key)
            .ok_or_else(|| ChatgateError::InvalidCredential("unknown key".to_string()))?;
        credential.used_units = used_units;
        Ok(())
    }
}

/// One scripted stream item
#[derive(Debug, Clone)]
pub enum ScriptedChunk {
    /// A text delta
    Text(String),
    /// A terminal stream error
    Error(String),
}

impl ScriptedChunk {
    /// Text delta shorthand
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    /// Terminal error shorthand
    pub fn error(s: &str) -> Self {
        Self::Error(s.to_string())
    }
}

/// Provider that replays the same scripted chunks on every call
///
/// Records the message history of each call so tests can assert that the
/// full conversation is resent every turn.
pub struct ScriptedProvider {
    script: Vec<ScriptedChunk>,
    never_ending: bool,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    /// Create a provider replaying the given chunks then ending
    pub fn new(script: Vec<ScriptedChunk>) -> Self {
        Self {
            script,
            never_ending: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// After the scripted chunks, pend forever instead of ending
    ///
    /// Used by cancellation tests: the stream only terminates when the
    /// caller cancels or drops it.
    pub fn never_ending(mut self) -> Self {
        self.never_ending = true;
        self
    }

    /// Message histories passed to `stream_chat`, in call order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChunkStream> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(messages.to_vec());

        let items: Vec<Result<String>> = self
            .script
            .iter()
            .map(|chunk| match chunk {
                ScriptedChunk::Text(s) => Ok(s.clone()),
                ScriptedChunk::Error(s) => {
                    Err(ChatgateError::StreamFailed(s.clone()).into())
                }
            })
            .collect();

        if self.never_ending {
            Ok(Box::pin(
                futures::stream::iter(items).chain(futures::stream::pending()),
            ))
        } else {
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Search collaborator returning a fixed snippet block
pub struct FixedSearch {
    block: String,
}

impl FixedSearch {
    /// Create a search double returning `block` for every query
    pub fn new(block: &str) -> Self {
        Self {
            block: block.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok(self.block.clone())
    }
}

/// Search collaborator that always fails
pub struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Err(ChatgateError::SearchUnavailable("provider down".to_string()).into())
    }
}
