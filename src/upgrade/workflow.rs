use crate::wallet::UpgradeError;
use crate::wallet::model::Wrapper;

/// One schema migration step.
///
/// `upgrade` must return a wrapper at exactly `target_version()` and is only called when
/// `should_perform_upgrade` holds, so running the chain twice changes nothing the second time.
#[async_trait::async_trait]
pub trait MigrationWorkflow: Send + Sync {
	/// Schema version this workflow produces.
	fn target_version(&self) -> u32;

	/// Name for logging and diagnostics.
	fn name(&self) -> &'static str;

	fn should_perform_upgrade(&self, wrapper: &Wrapper) -> bool {
		wrapper.version < self.target_version()
	}

	async fn upgrade(&self, wrapper: Wrapper) -> Result<Wrapper, UpgradeError>;
}
