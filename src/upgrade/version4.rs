use tracing::{debug, info};

use crate::keys::HdKeyChain;
use crate::upgrade::workflow::MigrationWorkflow;
use crate::wallet::UpgradeError;
use crate::wallet::model::{Account, DerivationType, Wrapper};

/// Version 4 introduced multiple derivations per account. Every account of the default HD
/// wallet ends up with a legacy and a bech32 derivation, defaulting to bech32.
#[derive(Debug, Clone, Copy, Default)]
pub struct Version4Workflow;

impl Version4Workflow {
	pub const TARGET_VERSION: u32 = 4;

	fn fail(reason: impl Into<String>) -> UpgradeError {
		UpgradeError::failed(Self::TARGET_VERSION, reason)
	}

	fn complete_account(chain: &HdKeyChain, account: &mut Account) -> Result<(), UpgradeError> {
		let missing: Vec<DerivationType> = match account.derivations.as_slice() {
			[] => vec![DerivationType::Legacy, DerivationType::Segwit],
			[existing] => vec![existing.derivation_type.counterpart()],
			_ => return Ok(()),
		};

		for derivation_type in missing {
			debug!(
				"Deriving {} derivation for account {}",
				derivation_type.as_str(),
				account.index
			);
			let derivation = chain
				.derive_account(derivation_type, account.index)
				.map_err(|e| Self::fail(e.to_string()))?;
			account.derivations.push(derivation);
		}
		account.derivations.sort_by_key(|derivation| derivation.purpose);
		account.default_derivation = DerivationType::Segwit;
		Ok(())
	}
}

#[async_trait::async_trait]
impl MigrationWorkflow for Version4Workflow {
	fn target_version(&self) -> u32 {
		Self::TARGET_VERSION
	}

	fn name(&self) -> &'static str {
		"Version4Workflow"
	}

	async fn upgrade(&self, wrapper: Wrapper) -> Result<Wrapper, UpgradeError> {
		let mut wallet = wrapper.wallet.clone();
		let double_encrypted = wallet.double_encrypted;

		if let Some(hd_wallet) = wallet.hd_wallets.first_mut() {
			let incomplete = hd_wallet
				.accounts
				.iter()
				.filter(|account| account.derivations.len() < 2)
				.count();

			if incomplete > 0 {
				if double_encrypted {
					return Err(Self::fail("second password required to derive accounts"));
				}
				let chain = HdKeyChain::from_seed_hex(&hd_wallet.seed_hex, &hd_wallet.passphrase)
					.map_err(|e| Self::fail(e.to_string()))?;
				for account in hd_wallet.accounts.iter_mut() {
					Self::complete_account(&chain, account)?;
				}
				info!(
					"Added missing derivations to {} account(s) of {}",
					incomplete,
					wrapper.guid()
				);
			}
		}

		Ok(wrapper.upgraded(Self::TARGET_VERSION, wallet))
	}
}
