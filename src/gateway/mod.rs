//! The quota-enforced streaming pipeline
//!
//! This is the core of the gateway: admission control, cost estimation,
//! prompt assembly, session state, and the orchestrator that drives one
//! user turn from raw input to a committed, persisted exchange.

pub mod estimator;
pub mod orchestrator;
pub mod prompt;
pub mod quota;
pub mod session;

pub use orchestrator::{ChatOrchestrator, TurnOutcome, TurnRequest, TurnWarning};
pub use quota::{Credential, CredentialStore, KeyLease, QuotaLedger};
pub use session::{ActiveSession, SessionStore};
