//! Per-key usage quota tracking and admission control
//!
//! This module owns the quota ledger: it decides whether a turn may run
//! (`admit`) and charges the key after a successful stream (`commit`).
//! The two calls form a single admission-then-reservation unit per
//! request: both require a [`KeyLease`], and the lease holds a per-key
//! mutex, so no commit from another request on the same key can land
//! between a request's admit and its own commit.

use crate::error::{ChatgateError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A quota-bounded credential record
///
/// Owned by the credential store; the ledger reads and updates it through
/// the [`CredentialStore`] trait. The invariant `used_units < total_units`
/// holds after every successful commit because admission denies any turn
/// that would reach the cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Row identifier
    pub id: i64,
    /// Opaque bearer token, unique and immutable
    pub key: String,
    /// Holder of the key; sessions are indexed by this owner
    pub owner: String,
    /// Units consumed so far
    pub used_units: u64,
    /// Total allowance
    pub total_units: u64,
    /// Inactive keys are rejected at validation
    pub active: bool,
}

/// Credential store collaborator contract
///
/// Implemented outside the core (the SQLite storage backend in
/// production, an in-memory map in tests).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the full credential for a key, `None` if unknown
    async fn read(&self, key: &str) -> Result<Option<Credential>>;

    /// Overwrite the consumed-units counter for a key
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::InvalidCredential` if the key is unknown
    async fn write_used(&self, key: &str, used_units: u64) -> Result<()>;

    /// Resolve a key to its owner and active flag, `None` if unknown
    async fn validate(&self, key: &str) -> Result<Option<(String, bool)>> {
        Ok(self.read(key).await?.map(|c| (c.owner, c.active)))
    }
}

/// Keys are opaque alphanumeric tokens; anything else is rejected before
/// any store access.
pub fn is_well_formed_key(key: &str) -> bool {
    static KEY_RE: OnceLock<regex::Regex> = OnceLock::new();
    KEY_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9]+$").expect("static pattern"))
        .is_match(key)
}

/// Exclusive lease on a credential key
///
/// Holding a lease serializes all ledger operations for that key. The
/// orchestrator acquires it before admission and releases it (by drop)
/// after commit or on any error exit, so admission decisions never see a
/// stale usage counter.
pub struct KeyLease {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyLease {
    /// The key this lease covers
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLease").field("key", &self.key).finish()
    }
}

/// Tracks consumed versus total allowance per credential
///
/// The ledger is the only shared mutable state that requires
/// synchronization across concurrent turns; sessions are independent.
pub struct QuotaLedger {
    store: Arc<dyn CredentialStore>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl QuotaLedger {
    /// Create a ledger over a credential store
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve and validate a key
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::InvalidCredential` for malformed, unknown,
    /// or inactive keys. Never treats a missing key as zero-cost.
    pub async fn lookup(&self, key: &str) -> Result<Credential> {
        if !is_well_formed_key(key) {
            return Err(ChatgateError::InvalidCredential("malformed key".to_string()).into());
        }
        let credential = self
            .store
            .read(key)
            .await?
            .ok_or_else(|| ChatgateError::InvalidCredential("unknown key".to_string()))?;
        if !credential.active {
            return Err(ChatgateError::InvalidCredential("key is inactive".to_string()).into());
        }
        Ok(credential)
    }

    /// Acquire the per-key lease
    ///
    /// Turns against the same key serialize here for the full span of
    /// admit, stream, and commit; turns against different keys do not
    /// contend.
    pub async fn begin(&self, key: &str) -> KeyLease {
        let lock = {
            let mut locks = self.locks.lock().expect("lock map poisoned");
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        KeyLease {
            key: key.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Admission check for a turn of the given cost
    ///
    /// Denies when `used_units + cost >= total_units`: a turn that would
    /// exactly reach the ceiling is also denied, so usage stays strictly
    /// below the cap after every commit.
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::InsufficientQuota` on denial, or
    /// `ChatgateError::InvalidCredential` if the key disappeared or was
    /// deactivated since lookup.
    pub async fn admit(&self, lease: &KeyLease, cost: u64) -> Result<Credential> {
        let credential = self.lookup(lease.key()).await?;
        if credential.used_units + cost >= credential.total_units {
            return Err(ChatgateError::InsufficientQuota {
                used: credential.used_units,
                total: credential.total_units,
                requested: cost,
            }
            .into());
        }
        Ok(credential)
    }

    /// Charge the key after a successful stream
    ///
    /// The read-modify-write is safe from lost updates because the caller
    /// holds the per-key lease.
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::InvalidCredential` if the key is unknown
    pub async fn commit(&self, lease: &KeyLease, cost: u64) -> Result<Credential> {
        let mut credential = self
            .store
            .read(lease.key())
            .await?
            .ok_or_else(|| ChatgateError::InvalidCredential("unknown key".to_string()))?;
        credential.used_units += cost;
        self.store
            .write_used(lease.key(), credential.used_units)
            .await?;
        Ok(credential)
    }
}
