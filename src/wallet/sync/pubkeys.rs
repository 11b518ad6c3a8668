//! Lookahead address provider for backend pre-indexing.
//!
//! When pub key syncing is enabled the save request carries the wallet's spendable legacy
//! addresses followed by the next receive addresses of every default HD account, joined by `|`.

use itertools::Itertools;
use tracing::debug;

use crate::keys::{KeyDerivationError, receive_addresses};
use crate::wallet::model::{Account, DerivationType, LegacyAddress};

/// Receive addresses derived per account when none is configured.
pub const DEFAULT_LOOKAHEAD: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressProviderError {
	#[error("Address derivation failed: {0}")]
	Derivation(#[from] KeyDerivationError),

	#[error("Account {0} has no bech32 derivation")]
	MissingDerivation(u32),
}

/// What the sync does when the provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookaheadPolicy {
	/// Abort the sync.
	Required,
	/// Save without addresses.
	BestEffort,
}

#[async_trait::async_trait]
pub trait SyncPubKeysAddressesProvider: Send + Sync {
	async fn provide_addresses(
		&self,
		active: &[LegacyAddress],
		accounts: &[Account],
	) -> Result<String, AddressProviderError>;

	fn policy(&self) -> LookaheadPolicy {
		LookaheadPolicy::Required
	}
}

/// Derives bech32 receive addresses from each account's BIP84 extended public key.
#[derive(Debug, Clone)]
pub struct Bip84LookaheadProvider {
	lookahead: u32,
	policy: LookaheadPolicy,
}

impl Bip84LookaheadProvider {
	pub fn new(lookahead: u32) -> Self {
		Self {
			lookahead,
			policy: LookaheadPolicy::Required,
		}
	}

	pub fn with_policy(mut self, policy: LookaheadPolicy) -> Self {
		self.policy = policy;
		self
	}
}

impl Default for Bip84LookaheadProvider {
	fn default() -> Self {
		Self::new(DEFAULT_LOOKAHEAD)
	}
}

#[async_trait::async_trait]
impl SyncPubKeysAddressesProvider for Bip84LookaheadProvider {
	async fn provide_addresses(
		&self,
		active: &[LegacyAddress],
		accounts: &[Account],
	) -> Result<String, AddressProviderError> {
		let mut addresses: Vec<String> = active
			.iter()
			.filter(|address| address.is_spendable() && address.is_active())
			.map(|address| address.addr.clone())
			.collect();

		for account in accounts {
			let derivation = account
				.derivation(DerivationType::Segwit)
				.ok_or(AddressProviderError::MissingDerivation(account.index))?;
			addresses.extend(receive_addresses(
				&derivation.xpub,
				DerivationType::Segwit,
				0,
				self.lookahead,
			)?);
		}

		debug!("Prepared {} lookahead addresses", addresses.len());
		Ok(addresses.iter().join("|"))
	}

	fn policy(&self) -> LookaheadPolicy {
		self.policy
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keys::HdKeyChain;

	fn segwit_account(index: u32) -> Account {
		let chain = HdKeyChain::from_seed_hex("00000000000000000000000000000000", "").unwrap();
		Account {
			index,
			label: String::new(),
			archived: false,
			default_derivation: DerivationType::Segwit,
			derivations: vec![chain.derive_account(DerivationType::Segwit, index).unwrap()],
		}
	}

	fn legacy_key(addr: &str, priv_key: Option<&str>) -> LegacyAddress {
		LegacyAddress {
			addr: addr.to_string(),
			priv_key: priv_key.map(str::to_string),
			tag: 0,
			label: None,
			created_time: None,
			created_device_name: None,
			created_device_version: None,
		}
	}

	#[tokio::test]
	async fn joins_legacy_then_lookahead() {
		let provider = Bip84LookaheadProvider::new(2);
		let joined = provider
			.provide_addresses(
				&[legacy_key("1Legacy", Some("priv")), legacy_key("1Watch", None)],
				&[segwit_account(0)],
			)
			.await
			.unwrap();

		let parts: Vec<&str> = joined.split('|').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "1Legacy");
		assert_eq!(parts[1], "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
		assert!(parts[2].starts_with("bc1q"));
	}

	#[tokio::test]
	async fn default_lookahead_is_ten_per_account() {
		let joined = Bip84LookaheadProvider::default()
			.provide_addresses(&[], &[segwit_account(0), segwit_account(1)])
			.await
			.unwrap();
		assert_eq!(joined.split('|').count(), 20);
	}

	#[tokio::test]
	async fn no_sources_yields_empty_list() {
		let joined = Bip84LookaheadProvider::new(1)
			.provide_addresses(&[], &[])
			.await
			.unwrap();
		assert!(joined.is_empty());
	}

	#[tokio::test]
	async fn account_without_bech32_fails() {
		let mut account = segwit_account(3);
		account.derivations.clear();
		let result = Bip84LookaheadProvider::new(1)
			.provide_addresses(&[], &[account])
			.await;
		assert_eq!(result, Err(AddressProviderError::MissingDerivation(3)));
	}
}
