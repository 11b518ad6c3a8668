//! Wallet creation.
//!
//! `create_wallet` generates a fresh recovery phrase from combined local and server entropy;
//! `import_wallet` starts from a phrase the user already has. Both build a latest-version
//! wallet with one account carrying legacy and segwit derivations, push it through the same
//! encode/encrypt/verify/checksum pipeline as a sync, and register it with the backend.

use bip39::Mnemonic;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::keys::{self, HdKeyChain, KeyDerivationError};
use crate::payload::{ChecksumProvider, PayloadCrypto, WalletEncoding};
use crate::upgrade::entropy::EntropyService;
use crate::wallet::model::{
	Account, DEFAULT_PBKDF2_ITERATIONS, DerivationType, HDWallet, LATEST_WALLET_VERSION,
	NativeWallet, WalletOptions, Wrapper,
};
use crate::wallet::sync::orchestrator::PayloadPipeline;
use crate::wallet::sync::repositories::{CreateWalletRepository, CreateWalletRequest};
use crate::wallet::types::WalletCreateError;

const MNEMONIC_ENTROPY_BYTES: usize = 16;

/// A wallet the backend has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCreation {
	pub guid: String,
	pub shared_key: String,
	/// The wrapper as stored, carrying the checksum of the uploaded payload.
	pub wrapper: Wrapper,
}

pub struct WalletCreator {
	entropy: EntropyService,
	repository: Arc<dyn CreateWalletRepository>,
	pipeline: PayloadPipeline,
	runtime: Option<Handle>,
}

impl WalletCreator {
	pub fn new(entropy: EntropyService, repository: Arc<dyn CreateWalletRepository>) -> Self {
		Self {
			entropy,
			repository,
			pipeline: PayloadPipeline::default(),
			runtime: None,
		}
	}

	pub fn with_encoder(mut self, encoder: Arc<dyn WalletEncoding>) -> Self {
		self.pipeline.encoder = encoder;
		self
	}

	pub fn with_crypto(mut self, crypto: Arc<dyn PayloadCrypto>) -> Self {
		self.pipeline.crypto = crypto;
		self
	}

	pub fn with_checksum(mut self, checksum: Arc<dyn ChecksumProvider>) -> Self {
		self.pipeline.checksum = checksum;
		self
	}

	pub fn with_runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	/// Create a wallet with a newly generated 12-word recovery phrase.
	pub async fn create_wallet(
		&self,
		email: &str,
		password: &str,
		account_name: &str,
		language: &str,
	) -> Result<WalletCreation, WalletCreateError> {
		let entropy = self.entropy.generate(MNEMONIC_ENTROPY_BYTES).await?;
		let mnemonic = keys::mnemonic_from_entropy(&entropy)?;
		self.register(&mnemonic, email, password, account_name, language)
			.await
	}

	/// Create a wallet from an existing recovery phrase.
	pub async fn import_wallet(
		&self,
		phrase: &str,
		email: &str,
		password: &str,
		account_name: &str,
		language: &str,
	) -> Result<WalletCreation, WalletCreateError> {
		let mnemonic = keys::parse_mnemonic(phrase)?;
		self.register(&mnemonic, email, password, account_name, language)
			.await
	}

	async fn register(
		&self,
		mnemonic: &Mnemonic,
		email: &str,
		password: &str,
		account_name: &str,
		language: &str,
	) -> Result<WalletCreation, WalletCreateError> {
		let guid = Uuid::new_v4().to_string();
		let shared_key = Uuid::new_v4().to_string();
		debug!("Generating wallet {}", guid);

		let wallet = generate_wallet(mnemonic, &guid, &shared_key, account_name)?;
		let wrapper = Wrapper::new(
			DEFAULT_PBKDF2_ITERATIONS,
			LATEST_WALLET_VERSION,
			"",
			language,
			false,
			wallet,
		);

		let prepared = self
			.pipeline
			.prepare_blocking(self.runtime.clone(), &wrapper, password)
			.await?;

		self.repository
			.create_wallet(CreateWalletRequest {
				guid: guid.clone(),
				shared_key: shared_key.clone(),
				email: email.to_string(),
				payload: prepared.raw.clone(),
				checksum: prepared.checksum.clone(),
				length: prepared.raw.len(),
				language: language.to_string(),
			})
			.await?;

		info!("Created wallet {}", guid);
		Ok(WalletCreation {
			guid,
			shared_key,
			wrapper: wrapper.with_checksum(prepared.checksum),
		})
	}
}

/// Build a wallet body with one HD wallet seeded from `mnemonic`.
///
/// Account 0 holds both derivations and defaults to segwit, i.e. the shape the upgrade chain
/// produces for a version 4 wallet.
pub fn generate_wallet(
	mnemonic: &Mnemonic,
	guid: &str,
	shared_key: &str,
	account_name: &str,
) -> Result<NativeWallet, KeyDerivationError> {
	let entropy = mnemonic.to_entropy();
	let chain = HdKeyChain::from_entropy(&entropy, "")?;

	let derivations = [DerivationType::Legacy, DerivationType::Segwit]
		.into_iter()
		.map(|derivation_type| chain.derive_account(derivation_type, 0))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(NativeWallet {
		guid: guid.to_string(),
		shared_key: shared_key.to_string(),
		double_encrypted: false,
		double_password_hash: None,
		metadata_hd_node: None,
		options: WalletOptions::default(),
		hd_wallets: vec![HDWallet {
			seed_hex: hex::encode(&entropy),
			passphrase: String::new(),
			mnemonic_verified: false,
			default_account_index: 0,
			accounts: vec![Account {
				index: 0,
				label: account_name.to_string(),
				archived: false,
				default_derivation: DerivationType::Segwit,
				derivations,
			}],
		}],
		addresses: vec![],
		tx_notes: None,
		address_book: None,
	})
}
