//! Wallet Synchronization Module
//!
//! Persists wallet wrappers to the backend and keeps local state consistent with it:
//!
//! - `orchestrator`: the `WalletSync` pipeline (encode, encrypt, verify, checksum, save, commit).
//! - `events`: sync events and the handler/dispatcher used to observe a sync.
//! - `pubkeys`: lookahead address providers for backend pre-indexing.
//! - `repositories`: the remote save contract and its request type.

/// Event system for observing sync progress
pub mod events;
/// Main coordinator for the sync pipeline
pub mod orchestrator;
/// Lookahead address providers
pub mod pubkeys;
/// Remote persistence contract
pub mod repositories;

pub use orchestrator::*;
