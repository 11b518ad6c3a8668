use crate::backend::BackendError;

/// Everything the backend needs to replace the stored wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveWalletRequest {
	pub guid: String,
	pub shared_key: String,
	/// Envelope JSON, `{"pbkdf2_iterations","version","payload"}`.
	pub payload: String,
	pub checksum: String,
	/// Checksum the backend currently holds; used for optimistic concurrency.
	pub old_checksum: String,
	pub length: usize,
	pub language: String,
	/// `|` separated lookahead addresses, when pub key syncing is on.
	pub addresses: Option<String>,
}

/// First upload of a newly created wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWalletRequest {
	pub guid: String,
	pub shared_key: String,
	pub email: String,
	pub payload: String,
	pub checksum: String,
	pub length: usize,
	pub language: String,
}

/// Remote persistence of the encrypted wallet.
#[async_trait::async_trait]
pub trait SaveWalletRepository: Send + Sync {
	async fn save_wallet(&self, request: SaveWalletRequest) -> Result<(), BackendError>;
}

/// Registers a wallet the backend has never seen.
#[async_trait::async_trait]
pub trait CreateWalletRepository: Send + Sync {
	async fn create_wallet(&self, request: CreateWalletRequest) -> Result<(), BackendError>;
}
