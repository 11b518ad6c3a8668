//! HD key derivation for wallet accounts.
//!
//! The wallet stores BIP39 *entropy* (`seed_hex`), not the 64-byte seed. Accounts live at
//! `m/44'/0'/i'` (legacy) and `m/84'/0'/i'` (bech32); receive addresses at `<account>/0/n`.

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, CompressedPublicKey, Network};
use std::str::FromStr;

use crate::wallet::model::{AddressCache, Derivation, DerivationType};

const RECEIVE_CHAIN: u32 = 0;
const CHANGE_CHAIN: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyDerivationError {
	#[error("Invalid seed: {0}")]
	InvalidSeed(String),

	#[error("Invalid mnemonic entropy: {0}")]
	InvalidEntropy(String),

	#[error("Invalid extended key: {0}")]
	InvalidExtendedKey(String),

	#[error("BIP32 error: {0}")]
	Bip32(String),
}

/// Master key of an HD wallet plus the secp context used for all derivations.
pub struct HdKeyChain {
	master: Xpriv,
	secp: Secp256k1<All>,
}

impl HdKeyChain {
	/// Build the key chain from hex-encoded BIP39 entropy.
	pub fn from_seed_hex(seed_hex: &str, passphrase: &str) -> Result<Self, KeyDerivationError> {
		let entropy =
			hex::decode(seed_hex).map_err(|e| KeyDerivationError::InvalidSeed(e.to_string()))?;
		Self::from_entropy(&entropy, passphrase)
	}

	pub fn from_entropy(entropy: &[u8], passphrase: &str) -> Result<Self, KeyDerivationError> {
		let mnemonic = mnemonic_from_entropy(entropy)?;
		let seed = mnemonic.to_seed(passphrase);
		let master = Xpriv::new_master(Network::Bitcoin, &seed)
			.map_err(|e| KeyDerivationError::Bip32(e.to_string()))?;

		Ok(Self {
			master,
			secp: Secp256k1::new(),
		})
	}

	/// Derive the account-level node for `derivation_type` and fill in its receive/change cache.
	pub fn derive_account(
		&self,
		derivation_type: DerivationType,
		account_index: u32,
	) -> Result<Derivation, KeyDerivationError> {
		let path = DerivationPath::from_str(&format!(
			"m/{}'/0'/{}'",
			derivation_type.purpose(),
			account_index
		))
		.map_err(|e| KeyDerivationError::Bip32(e.to_string()))?;

		let account_priv = self
			.master
			.derive_priv(&self.secp, &path)
			.map_err(|e| KeyDerivationError::Bip32(e.to_string()))?;
		let account_pub = Xpub::from_priv(&self.secp, &account_priv);

		let receive = self.chain_xpub(&account_pub, RECEIVE_CHAIN)?;
		let change = self.chain_xpub(&account_pub, CHANGE_CHAIN)?;

		Ok(Derivation {
			derivation_type,
			purpose: derivation_type.purpose(),
			xpriv: account_priv.to_string(),
			xpub: account_pub.to_string(),
			address_labels: Vec::new(),
			cache: AddressCache {
				receive_account: receive.to_string(),
				change_account: change.to_string(),
			},
		})
	}

	fn chain_xpub(&self, account: &Xpub, chain: u32) -> Result<Xpub, KeyDerivationError> {
		account
			.derive_pub(&self.secp, &[ChildNumber::Normal { index: chain }])
			.map_err(|e| KeyDerivationError::Bip32(e.to_string()))
	}
}

/// Mnemonic for raw BIP39 entropy. Accepts 16 to 32 bytes in steps of 4.
pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<Mnemonic, KeyDerivationError> {
	Mnemonic::from_entropy(entropy).map_err(|e| KeyDerivationError::InvalidEntropy(e.to_string()))
}

/// Parse a recovery phrase. Only the English word list is accepted.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, KeyDerivationError> {
	Mnemonic::parse(phrase.trim()).map_err(|e| KeyDerivationError::InvalidEntropy(e.to_string()))
}

/// Receive addresses `0..count` under an account-level extended public key.
pub fn receive_addresses(
	account_xpub: &str,
	derivation_type: DerivationType,
	start: u32,
	count: u32,
) -> Result<Vec<String>, KeyDerivationError> {
	let secp = Secp256k1::verification_only();
	let account = Xpub::from_str(account_xpub)
		.map_err(|e| KeyDerivationError::InvalidExtendedKey(e.to_string()))?;
	let network = Network::Bitcoin;

	(start..start.saturating_add(count))
		.map(|index| -> Result<String, KeyDerivationError> {
			let child = account
				.derive_pub(
					&secp,
					&[
						ChildNumber::Normal {
							index: RECEIVE_CHAIN,
						},
						ChildNumber::Normal { index },
					],
				)
				.map_err(|e| KeyDerivationError::Bip32(e.to_string()))?;
			let public_key = CompressedPublicKey(child.public_key);
			let address = match derivation_type {
				DerivationType::Segwit => Address::p2wpkh(&public_key, network),
				DerivationType::Legacy => Address::p2pkh(public_key.pubkey_hash(), network),
			};
			Ok(address.to_string())
		})
		.collect()
}
