use tracing::{info, warn};

use crate::keys::HdKeyChain;
use crate::upgrade::entropy::EntropyService;
use crate::upgrade::workflow::MigrationWorkflow;
use crate::wallet::UpgradeError;
use crate::wallet::model::{Account, DerivationType, HDWallet, Wrapper};

const ENTROPY_BYTES: usize = 16;

/// Version 3 introduced HD wallets. Legacy-only wallets get a freshly generated one with a
/// single BIP44 account.
pub struct Version3Workflow {
	entropy: EntropyService,
	default_account_label: String,
}

impl Version3Workflow {
	pub const TARGET_VERSION: u32 = 3;

	pub fn new(entropy: EntropyService, default_account_label: impl Into<String>) -> Self {
		Self {
			entropy,
			default_account_label: default_account_label.into(),
		}
	}

	fn fail(reason: impl Into<String>) -> UpgradeError {
		UpgradeError::failed(Self::TARGET_VERSION, reason)
	}

	async fn create_hd_wallet(&self) -> Result<HDWallet, UpgradeError> {
		let entropy = self
			.entropy
			.generate(ENTROPY_BYTES)
			.await
			.map_err(|e| Self::fail(e.to_string()))?;

		let chain = HdKeyChain::from_entropy(&entropy, "").map_err(|e| Self::fail(e.to_string()))?;
		let derivation = chain
			.derive_account(DerivationType::Legacy, 0)
			.map_err(|e| Self::fail(e.to_string()))?;

		Ok(HDWallet {
			seed_hex: hex::encode(&entropy),
			passphrase: String::new(),
			mnemonic_verified: false,
			default_account_index: 0,
			accounts: vec![Account {
				index: 0,
				label: self.default_account_label.clone(),
				archived: false,
				default_derivation: DerivationType::Legacy,
				derivations: vec![derivation],
			}],
		})
	}
}

#[async_trait::async_trait]
impl MigrationWorkflow for Version3Workflow {
	fn target_version(&self) -> u32 {
		Self::TARGET_VERSION
	}

	fn name(&self) -> &'static str {
		"Version3Workflow"
	}

	/// Also fires at version 3 when the HD wallet is missing, so no later step ever sees a
	/// wallet without one.
	fn should_perform_upgrade(&self, wrapper: &Wrapper) -> bool {
		wrapper.version < Self::TARGET_VERSION
			|| (wrapper.version == Self::TARGET_VERSION && !wrapper.wallet.is_hd_wallet())
	}

	async fn upgrade(&self, wrapper: Wrapper) -> Result<Wrapper, UpgradeError> {
		if wrapper.wallet.is_hd_wallet() {
			info!(
				"Wallet {} already holds an HD wallet, bumping version to {}",
				wrapper.guid(),
				Self::TARGET_VERSION
			);
			let wallet = wrapper.wallet.clone();
			return Ok(wrapper.upgraded(Self::TARGET_VERSION, wallet));
		}

		if wrapper.wallet.double_encrypted {
			warn!(
				"Wallet {} is double encrypted, cannot create HD wallet",
				wrapper.guid()
			);
			return Err(Self::fail("second password required to create an HD wallet"));
		}

		info!("Creating HD wallet for {}", wrapper.guid());
		let hd_wallet = self.create_hd_wallet().await?;

		let mut wallet = wrapper.wallet.clone();
		wallet.hd_wallets.push(hd_wallet);
		Ok(wrapper.upgraded(Self::TARGET_VERSION, wallet))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::upgrade::entropy::{EntropyError, LocalEntropyProvider, ServerEntropyProvider};
	use crate::wallet::model::{NativeWallet, WalletOptions};
	use std::sync::Arc;

	struct Fixed(Vec<u8>);

	impl LocalEntropyProvider for Fixed {
		fn random_bytes(&self, _count: usize) -> Result<Vec<u8>, EntropyError> {
			Ok(self.0.clone())
		}
	}

	#[async_trait::async_trait]
	impl ServerEntropyProvider for Fixed {
		async fn server_entropy(&self, _count: usize) -> Result<Vec<u8>, EntropyError> {
			Ok(self.0.clone())
		}
	}

	struct Unavailable;

	#[async_trait::async_trait]
	impl ServerEntropyProvider for Unavailable {
		async fn server_entropy(&self, _count: usize) -> Result<Vec<u8>, EntropyError> {
			Err(EntropyError::Server("503".to_string()))
		}
	}

	fn workflow(server: Arc<dyn ServerEntropyProvider>) -> Version3Workflow {
		let mut local = vec![0u8; 16];
		local[15] = 0x01;
		Version3Workflow::new(
			EntropyService::new(Arc::new(Fixed(local)), server),
			"Private Key Wallet",
		)
	}

	fn server_entropy() -> Arc<dyn ServerEntropyProvider> {
		let mut server = vec![0u8; 16];
		server[15] = 0x11;
		Arc::new(Fixed(server))
	}

	fn legacy_wrapper(double_encrypted: bool) -> Wrapper {
		let wallet = NativeWallet {
			guid: "guid".to_string(),
			shared_key: "shared-key".to_string(),
			double_encrypted,
			double_password_hash: None,
			metadata_hd_node: None,
			options: WalletOptions::default(),
			hd_wallets: vec![],
			addresses: vec![],
			tx_notes: None,
			address_book: None,
		};
		Wrapper::new(5000, 2, "checksum", "en", false, wallet)
	}

	#[tokio::test]
	async fn creates_hd_wallet_from_combined_entropy() {
		let upgraded = workflow(server_entropy())
			.upgrade(legacy_wrapper(false))
			.await
			.unwrap();

		assert_eq!(upgraded.version, 3);
		let hd = upgraded.wallet.default_hd_wallet().unwrap();
		assert_eq!(hd.seed_hex, "00000000000000000000000000000010");
		assert!(!hd.mnemonic_verified);
		assert_eq!(hd.default_account_index, 0);
		assert_eq!(hd.accounts.len(), 1);

		let account = &hd.accounts[0];
		assert_eq!(account.label, "Private Key Wallet");
		assert_eq!(account.default_derivation, DerivationType::Legacy);
		assert_eq!(account.derivations.len(), 1);
		assert_eq!(account.derivations[0].purpose, 44);
		assert!(account.is_consistent());
	}

	#[tokio::test]
	async fn existing_hd_wallet_only_bumps_version() {
		let mut wrapper = legacy_wrapper(true);
		wrapper.wallet.hd_wallets.push(HDWallet {
			seed_hex: "00".repeat(16),
			passphrase: String::new(),
			mnemonic_verified: true,
			default_account_index: 0,
			accounts: vec![],
		});

		let upgraded = workflow(server_entropy()).upgrade(wrapper.clone()).await.unwrap();
		assert_eq!(upgraded.version, 3);
		assert_eq!(upgraded.wallet, wrapper.wallet);
	}

	#[tokio::test]
	async fn double_encrypted_wallet_fails() {
		let result = workflow(server_entropy()).upgrade(legacy_wrapper(true)).await;
		assert!(matches!(
			result,
			Err(UpgradeError::UpgradeFailed { version: 3, .. })
		));
	}

	#[tokio::test]
	async fn server_entropy_failure_fails_upgrade() {
		let result = workflow(Arc::new(Unavailable))
			.upgrade(legacy_wrapper(false))
			.await;
		assert!(matches!(
			result,
			Err(UpgradeError::UpgradeFailed { version: 3, .. })
		));
	}

	#[test]
	fn fires_below_version_three_or_without_hd_wallet() {
		let workflow = workflow(server_entropy());
		let mut wrapper = legacy_wrapper(false);
		assert!(workflow.should_perform_upgrade(&wrapper));

		wrapper.version = 3;
		assert!(workflow.should_perform_upgrade(&wrapper));

		wrapper.wallet.hd_wallets.push(HDWallet {
			seed_hex: "00".repeat(16),
			passphrase: String::new(),
			mnemonic_verified: true,
			default_account_index: 0,
			accounts: vec![],
		});
		assert!(!workflow.should_perform_upgrade(&wrapper));

		wrapper.wallet.hd_wallets.clear();
		wrapper.version = 4;
		assert!(!workflow.should_perform_upgrade(&wrapper));
	}

	#[tokio::test]
	async fn version_three_without_hd_wallet_gets_one() {
		let mut wrapper = legacy_wrapper(false);
		wrapper.version = 3;

		let upgraded = workflow(server_entropy()).upgrade(wrapper).await.unwrap();
		assert_eq!(upgraded.version, 3);
		assert!(upgraded.wallet.is_hd_wallet());
	}
}
