//! Wallet document model.
//!
//! `Wrapper` is the versioned envelope held in memory; `NativeWallet` is the decrypted wallet
//! body. Field names on the serde side follow the JSON document stored by the backend, so a
//! payload written by another client decodes into the same structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version produced by the newest migration workflow.
pub const LATEST_WALLET_VERSION: u32 = 4;

/// Default PBKDF2 work factor for newly created wrappers.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 5000;

/// Versioned in-memory envelope around a decrypted wallet body.
///
/// Treated as an immutable value: the `with_*` helpers return a new wrapper and never touch
/// the receiver. Shared copies live behind `Arc` in the wallet holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
	pub pbkdf2_iterations: u32,
	pub version: u32,
	pub payload_checksum: String,
	pub language: String,
	pub sync_pub_keys: bool,
	pub wallet: NativeWallet,
}

impl Wrapper {
	pub fn new(
		pbkdf2_iterations: u32,
		version: u32,
		payload_checksum: impl Into<String>,
		language: impl Into<String>,
		sync_pub_keys: bool,
		wallet: NativeWallet,
	) -> Self {
		Self {
			pbkdf2_iterations,
			version,
			payload_checksum: payload_checksum.into(),
			language: language.into(),
			sync_pub_keys,
			wallet,
		}
	}

	/// Copy of this wrapper carrying a new payload checksum.
	pub fn with_checksum(&self, checksum: impl Into<String>) -> Self {
		Self {
			payload_checksum: checksum.into(),
			..self.clone()
		}
	}

	/// Copy of this wrapper at a new schema version with a transformed body.
	pub fn upgraded(&self, version: u32, wallet: NativeWallet) -> Self {
		Self {
			version,
			wallet,
			..self.clone()
		}
	}

	pub fn with_sync_pub_keys(&self, sync_pub_keys: bool) -> Self {
		Self {
			sync_pub_keys,
			..self.clone()
		}
	}

	pub fn guid(&self) -> &str {
		&self.wallet.guid
	}
}

/// Decrypted wallet body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeWallet {
	pub guid: String,
	#[serde(rename = "sharedKey")]
	pub shared_key: String,
	#[serde(rename = "double_encryption", default)]
	pub double_encrypted: bool,
	#[serde(rename = "dpasswordhash", default, skip_serializing_if = "Option::is_none")]
	pub double_password_hash: Option<String>,
	#[serde(rename = "metadataHDNode", default, skip_serializing_if = "Option::is_none")]
	pub metadata_hd_node: Option<String>,
	#[serde(default)]
	pub options: WalletOptions,
	#[serde(default)]
	pub hd_wallets: Vec<HDWallet>,
	#[serde(rename = "keys", default)]
	pub addresses: Vec<LegacyAddress>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tx_notes: Option<BTreeMap<String, String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address_book: Option<Vec<AddressBookEntry>>,
}

impl NativeWallet {
	/// The first HD wallet is the one every consumer operates on.
	pub fn default_hd_wallet(&self) -> Option<&HDWallet> {
		self.hd_wallets.first()
	}

	pub fn is_hd_wallet(&self) -> bool {
		!self.hd_wallets.is_empty()
	}

	/// Addresses of legacy keys that can spend and are not archived.
	pub fn spendable_active_addresses(&self) -> Vec<String> {
		self.addresses
			.iter()
			.filter(|address| address.is_spendable() && address.is_active())
			.map(|address| address.addr.clone())
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOptions {
	pub pbkdf2_iterations: u32,
	pub fee_per_kb: u64,
	pub html5_notifications: bool,
	pub logout_time: u64,
}

impl Default for WalletOptions {
	fn default() -> Self {
		Self {
			pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
			fee_per_kb: 10_000,
			html5_notifications: false,
			logout_time: 600_000,
		}
	}
}

/// Hierarchical-deterministic key tree rooted at a BIP39 entropy seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HDWallet {
	/// BIP39 entropy, hex encoded. Encrypted with the second password when the wallet is
	/// double encrypted.
	pub seed_hex: String,
	#[serde(default)]
	pub passphrase: String,
	#[serde(default)]
	pub mnemonic_verified: bool,
	#[serde(rename = "default_account_idx", default)]
	pub default_account_index: usize,
	#[serde(default)]
	pub accounts: Vec<Account>,
}

impl HDWallet {
	pub fn default_account(&self) -> Option<&Account> {
		self.accounts.get(self.default_account_index)
	}

	/// `default_account_index` must point at an account once any exist.
	pub fn is_consistent(&self) -> bool {
		self.accounts.is_empty() || self.default_account_index < self.accounts.len()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	#[serde(default)]
	pub index: u32,
	#[serde(default)]
	pub label: String,
	#[serde(default)]
	pub archived: bool,
	pub default_derivation: DerivationType,
	#[serde(default)]
	pub derivations: Vec<Derivation>,
}

impl Account {
	pub fn derivation(&self, derivation_type: DerivationType) -> Option<&Derivation> {
		self.derivations
			.iter()
			.find(|derivation| derivation.derivation_type == derivation_type)
	}

	pub fn default_derivation(&self) -> Option<&Derivation> {
		self.derivation(self.default_derivation)
	}

	/// Holds for every account of a version 4 wallet.
	pub fn is_consistent(&self) -> bool {
		!self.derivations.is_empty() && self.default_derivation().is_some()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivationType {
	#[serde(rename = "legacy")]
	Legacy,
	#[serde(rename = "bech32")]
	Segwit,
}

impl DerivationType {
	/// BIP43 purpose used for this derivation scheme.
	pub fn purpose(&self) -> u32 {
		match self {
			DerivationType::Legacy => 44,
			DerivationType::Segwit => 84,
		}
	}

	/// The other scheme; accounts carry one derivation of each.
	pub fn counterpart(&self) -> Self {
		match self {
			DerivationType::Legacy => DerivationType::Segwit,
			DerivationType::Segwit => DerivationType::Legacy,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			DerivationType::Legacy => "legacy",
			DerivationType::Segwit => "bech32",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
	#[serde(rename = "type")]
	pub derivation_type: DerivationType,
	pub purpose: u32,
	pub xpriv: String,
	pub xpub: String,
	#[serde(default)]
	pub address_labels: Vec<AddressLabel>,
	#[serde(default)]
	pub cache: AddressCache,
}

/// Extended public keys of the receive (`/0`) and change (`/1`) chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCache {
	#[serde(rename = "receiveAccount")]
	pub receive_account: String,
	#[serde(rename = "changeAccount")]
	pub change_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLabel {
	pub index: u32,
	pub label: String,
}

/// Imported (non-HD) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAddress {
	pub addr: String,
	#[serde(rename = "priv", default, skip_serializing_if = "Option::is_none")]
	pub priv_key: Option<String>,
	#[serde(default)]
	pub tag: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_time: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_device_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_device_version: Option<String>,
}

impl LegacyAddress {
	/// Tag 2 marks an archived key.
	pub const ARCHIVED_TAG: i32 = 2;

	pub fn is_spendable(&self) -> bool {
		self.priv_key.as_deref().is_some_and(|key| !key.is_empty())
	}

	pub fn is_active(&self) -> bool {
		self.tag != Self::ARCHIVED_TAG
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookEntry {
	pub addr: String,
	pub label: String,
}

/// Encrypted document stored by the backend: `{"pbkdf2_iterations","version","payload"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
	pub pbkdf2_iterations: u32,
	pub version: u32,
	pub payload: String,
}

/// Wallet payload as fetched from the backend, before the body is decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletPayload {
	pub guid: String,
	pub auth_type: i32,
	pub language: String,
	pub should_sync_pub_keys: bool,
	pub time: DateTime<Utc>,
	pub payload_checksum: Option<String>,
	pub payload: Option<EncryptedEnvelope>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn account(derivations: Vec<Derivation>, default: DerivationType) -> Account {
		Account {
			index: 0,
			label: "Private Key Wallet".to_string(),
			archived: false,
			default_derivation: default,
			derivations,
		}
	}

	fn derivation(derivation_type: DerivationType) -> Derivation {
		Derivation {
			derivation_type,
			purpose: derivation_type.purpose(),
			xpriv: "xprv".to_string(),
			xpub: "xpub".to_string(),
			address_labels: vec![],
			cache: AddressCache::default(),
		}
	}

	#[test]
	fn account_consistency_requires_default_derivation() {
		let legacy_only = account(vec![derivation(DerivationType::Legacy)], DerivationType::Segwit);
		assert!(!legacy_only.is_consistent());

		let both = account(
			vec![
				derivation(DerivationType::Legacy),
				derivation(DerivationType::Segwit),
			],
			DerivationType::Segwit,
		);
		assert!(both.is_consistent());
		assert_eq!(
			both.default_derivation().map(|d| d.purpose),
			Some(84)
		);
	}

	#[test]
	fn spendable_active_addresses_skip_watch_only_and_archived() {
		let key = |addr: &str, priv_key: Option<&str>, tag: i32| LegacyAddress {
			addr: addr.to_string(),
			priv_key: priv_key.map(str::to_string),
			tag,
			label: None,
			created_time: None,
			created_device_name: None,
			created_device_version: None,
		};
		let wallet = NativeWallet {
			guid: "guid".to_string(),
			shared_key: "shared-key".to_string(),
			double_encrypted: false,
			double_password_hash: None,
			metadata_hd_node: None,
			options: WalletOptions::default(),
			hd_wallets: vec![],
			addresses: vec![
				key("spendable", Some("priv"), 0),
				key("watch-only", None, 0),
				key("archived", Some("priv"), LegacyAddress::ARCHIVED_TAG),
			],
			tx_notes: None,
			address_book: None,
		};

		assert_eq!(wallet.spendable_active_addresses(), vec!["spendable".to_string()]);
	}

	#[test]
	fn with_checksum_leaves_receiver_untouched() {
		let wallet: NativeWallet = serde_json::from_str(
			r#"{"guid":"guid","sharedKey":"shared-key","options":{"pbkdf2_iterations":5000,"fee_per_kb":10000,"html5_notifications":false,"logout_time":600000}}"#,
		)
		.expect("wallet json");
		let wrapper = Wrapper::new(1, 4, "", "en", false, wallet);
		let updated = wrapper.with_checksum("checksum");

		assert_eq!(wrapper.payload_checksum, "");
		assert_eq!(updated.payload_checksum, "checksum");
		assert_eq!(updated.wallet, wrapper.wallet);
		assert_eq!(updated.version, wrapper.version);
	}
}
