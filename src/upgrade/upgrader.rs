//! Migration chain runner.
//!
//! Workflows are applied in ascending target order. Each one either passes the wrapper
//! through untouched or returns it at exactly its target version; the first failure aborts the
//! chain and nothing partially upgraded escapes.

use tracing::{debug, error, info};

use crate::upgrade::workflow::MigrationWorkflow;
use crate::wallet::UpgradeError;
use crate::wallet::model::{LATEST_WALLET_VERSION, Wrapper};

pub struct WalletUpgrader {
	workflows: Vec<Box<dyn MigrationWorkflow>>,
}

impl WalletUpgrader {
	pub fn new(mut workflows: Vec<Box<dyn MigrationWorkflow>>) -> Self {
		workflows.sort_by_key(|workflow| workflow.target_version());
		Self { workflows }
	}

	/// Highest version any registered workflow produces.
	pub fn latest_version(&self) -> u32 {
		self.workflows
			.last()
			.map(|workflow| workflow.target_version())
			.unwrap_or(LATEST_WALLET_VERSION)
	}

	pub fn needs_upgrade(&self, wrapper: &Wrapper) -> bool {
		self.workflows
			.iter()
			.any(|workflow| workflow.should_perform_upgrade(wrapper))
	}

	pub async fn perform_upgrade(&self, wrapper: Wrapper) -> Result<Wrapper, UpgradeError> {
		let latest = self.latest_version();
		if wrapper.version > latest {
			error!(
				"Wallet {} has version {}, newer than supported {}",
				wrapper.guid(),
				wrapper.version,
				latest
			);
			return Err(UpgradeError::UnsupportedVersion {
				version: wrapper.version,
				latest,
			});
		}

		let mut current = wrapper;
		for workflow in &self.workflows {
			if !workflow.should_perform_upgrade(&current) {
				debug!(
					"Skipping {} for version {}",
					workflow.name(),
					current.version
				);
				continue;
			}

			let target = workflow.target_version();
			let from = current.version;
			info!("Running {} ({} -> {})", workflow.name(), from, target);

			let upgraded = workflow.upgrade(current).await.inspect_err(|e| {
				error!("{} failed: {}", workflow.name(), e);
			})?;

			if upgraded.version < from || upgraded.version != target {
				error!(
					"{} produced version {}, expected {}",
					workflow.name(),
					upgraded.version,
					target
				);
				return Err(UpgradeError::failed(
					target,
					format!("workflow produced version {}", upgraded.version),
				));
			}
			current = upgraded;
		}

		Ok(current)
	}
}
