use crate::backend::BackendError;
use crate::keys::KeyDerivationError;
use crate::payload::{ChecksumError, CodecError, PayloadCryptoError};
use crate::wallet::credentials::CredentialsError;
use crate::upgrade::entropy::EntropyError;
use crate::wallet::sync::pubkeys::AddressProviderError;

/// Failures of the migration chain. Any of these aborts the whole upgrade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
	#[error("Upgrade to version {version} failed: {reason}")]
	UpgradeFailed { version: u32, reason: String },

	#[error("Wallet version {version} is newer than the latest supported version {latest}")]
	UnsupportedVersion { version: u32, latest: u32 },
}

impl UpgradeError {
	pub fn failed(version: u32, reason: impl Into<String>) -> Self {
		UpgradeError::UpgradeFailed {
			version,
			reason: reason.into(),
		}
	}
}

/// Errors surfaced by the sync pipeline, tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Encoding error: {0}")]
	Encoding(#[from] CodecError),

	#[error("Encryption error: {0}")]
	Encryption(#[from] PayloadCryptoError),

	#[error("Payload verification failed: {0}")]
	Verification(String),

	#[error("Sync pub keys error: {0}")]
	SyncPubKeys(#[from] AddressProviderError),

	#[error("Network error: {0}")]
	Network(#[from] BackendError),

	#[error("Credentials error: {0}")]
	Credentials(#[from] CredentialsError),

	#[error("Background task error: {0}")]
	Runtime(String),
}

/// Errors of the session lifecycle (login, upgrade-and-sync, logout).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
	#[error("Payload integrity error: {0}")]
	Checksum(#[from] ChecksumError),

	#[error("Decryption error: {0}")]
	Crypto(#[from] PayloadCryptoError),

	#[error("Decoding error: {0}")]
	Codec(#[from] CodecError),

	#[error("Upgrade error: {0}")]
	Upgrade(#[from] UpgradeError),

	#[error("Sync error: {0}")]
	Sync(#[from] WalletSyncError),

	#[error("Credentials error: {0}")]
	Credentials(#[from] CredentialsError),

	#[error("Network error: {0}")]
	Network(#[from] BackendError),

	#[error("Wallet payload is missing")]
	MissingPayload,

	#[error("No wallet is loaded")]
	NotLoaded,

	#[error("Background task error: {0}")]
	Runtime(String),
}

/// Errors of wallet creation and import.
#[derive(Debug, thiserror::Error)]
pub enum WalletCreateError {
	#[error("Entropy error: {0}")]
	Entropy(#[from] EntropyError),

	#[error("Mnemonic error: {0}")]
	Mnemonic(#[from] KeyDerivationError),

	#[error("Payload error: {0}")]
	Payload(#[from] WalletSyncError),

	#[error("Network error: {0}")]
	Network(#[from] BackendError),
}
