//! Wallet schema migrations.
//!
//! - `workflow`: the per-version migration contract.
//! - `upgrader`: runs registered workflows in order to reach the latest version.
//! - `version3`, `version4`: the concrete migrations.
//! - `entropy`: local and server randomness for seeds created during migration.

pub mod entropy;
pub mod upgrader;
pub mod version3;
pub mod version4;
pub mod workflow;

pub use entropy::{
	EntropyError, EntropyService, LocalEntropyProvider, OsEntropy, ServerEntropyProvider,
};
pub use upgrader::WalletUpgrader;
pub use version3::Version3Workflow;
pub use version4::Version4Workflow;
pub use workflow::MigrationWorkflow;

/// The production migration chain.
pub fn default_upgrader(entropy: EntropyService, default_account_label: &str) -> WalletUpgrader {
	WalletUpgrader::new(vec![
		Box::new(Version3Workflow::new(entropy, default_account_label)),
		Box::new(Version4Workflow),
	])
}
