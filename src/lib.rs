//! Versioned wallet payload migration and encrypted synchronization.
//!
//! - `wallet`: the wallet model, holder, credentials, session and sync pipeline.
//! - `payload`: canonical encoding, password encryption and checksums.
//! - `upgrade`: the schema migration chain.
//! - `backend`: HTTP client for the wallet backend.
//! - `keys`: HD derivation for wallet accounts.
//! - `config`: environment configuration.

pub mod backend;
pub mod config;
pub mod keys;
pub mod payload;
pub mod upgrade;
pub mod wallet;

pub use config::EngineConfig;
pub use wallet::model::{LATEST_WALLET_VERSION, Wrapper};
pub use wallet::{SessionDependencies, WalletSession};
