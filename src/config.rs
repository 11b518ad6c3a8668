//! Engine configuration, read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::wallet::sync::pubkeys::DEFAULT_LOOKAHEAD;

pub const DEFAULT_BACKEND_URL: &str = "https://api.blockchain.info";
pub const DEFAULT_ACCOUNT_LABEL: &str = "Private Key Wallet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
	pub backend_url: String,
	pub request_timeout: Duration,
	/// Receive addresses derived per account for pub key syncing.
	pub lookahead: u32,
	/// Label of the account created when an HD wallet is generated during migration.
	pub default_account_label: String,
	pub language: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			backend_url: DEFAULT_BACKEND_URL.to_string(),
			request_timeout: Duration::from_secs(30),
			lookahead: DEFAULT_LOOKAHEAD,
			default_account_label: DEFAULT_ACCOUNT_LABEL.to_string(),
			language: "en".to_string(),
		}
	}
}

impl EngineConfig {
	/// Load from `WALLET_*` variables, falling back to defaults for anything unset.
	///
	/// Call `dotenvy::dotenv()` first to pick up a `.env` file.
	pub fn from_env() -> Self {
		let defaults = Self::default();
		Self {
			backend_url: env::var("WALLET_BACKEND_URL").unwrap_or(defaults.backend_url),
			request_timeout: Duration::from_secs(parse_var(
				"WALLET_REQUEST_TIMEOUT_SECS",
				defaults.request_timeout.as_secs(),
			)),
			lookahead: parse_var("WALLET_LOOKAHEAD", defaults.lookahead),
			default_account_label: env::var("WALLET_DEFAULT_ACCOUNT_LABEL")
				.unwrap_or(defaults.default_account_label),
			language: env::var("WALLET_LANGUAGE").unwrap_or(defaults.language),
		}
	}
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
	match env::var(name) {
		Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
			warn!("Invalid value '{}' for {}, using {}", raw, name, default);
			default
		}),
		Err(_) => default,
	}
}
