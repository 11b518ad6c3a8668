//! Wallet backend integration
//!
//! Client and wire types for the HTTP API that stores encrypted wallet payloads.

/// HTTP client for fetch, save and server entropy
mod client;
/// Wire types and errors
mod types;

pub use client::WalletBackendClient;
pub use types::*;
