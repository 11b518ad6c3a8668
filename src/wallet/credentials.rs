use tokio::sync::RwLock;

use crate::wallet::model::WalletPayload;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
	#[error("Missing credential: {0}")]
	Missing(&'static str),

	#[error("Credentials storage error: {0}")]
	Storage(String),
}

/// Secure storage for login credentials and the last fetched payload.
#[async_trait::async_trait]
pub trait CredentialsStore: Send + Sync {
	async fn password(&self) -> Result<Option<String>, CredentialsError>;
	async fn set_password(&self, password: &str) -> Result<(), CredentialsError>;

	async fn guid(&self) -> Result<Option<String>, CredentialsError>;
	async fn set_guid(&self, guid: &str) -> Result<(), CredentialsError>;

	async fn shared_key(&self) -> Result<Option<String>, CredentialsError>;
	async fn set_shared_key(&self, shared_key: &str) -> Result<(), CredentialsError>;

	async fn cached_payload(&self) -> Result<Option<WalletPayload>, CredentialsError>;
	async fn set_cached_payload(&self, payload: WalletPayload) -> Result<(), CredentialsError>;

	/// Forget everything, e.g. on logout.
	async fn clear(&self) -> Result<(), CredentialsError>;
}

#[derive(Debug, Default)]
struct Credentials {
	password: Option<String>,
	guid: Option<String>,
	shared_key: Option<String>,
	cached_payload: Option<WalletPayload>,
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryCredentialsStore {
	inner: RwLock<Credentials>,
}

impl InMemoryCredentialsStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl CredentialsStore for InMemoryCredentialsStore {
	async fn password(&self) -> Result<Option<String>, CredentialsError> {
		Ok(self.inner.read().await.password.clone())
	}

	async fn set_password(&self, password: &str) -> Result<(), CredentialsError> {
		self.inner.write().await.password = Some(password.to_string());
		Ok(())
	}

	async fn guid(&self) -> Result<Option<String>, CredentialsError> {
		Ok(self.inner.read().await.guid.clone())
	}

	async fn set_guid(&self, guid: &str) -> Result<(), CredentialsError> {
		self.inner.write().await.guid = Some(guid.to_string());
		Ok(())
	}

	async fn shared_key(&self) -> Result<Option<String>, CredentialsError> {
		Ok(self.inner.read().await.shared_key.clone())
	}

	async fn set_shared_key(&self, shared_key: &str) -> Result<(), CredentialsError> {
		self.inner.write().await.shared_key = Some(shared_key.to_string());
		Ok(())
	}

	async fn cached_payload(&self) -> Result<Option<WalletPayload>, CredentialsError> {
		Ok(self.inner.read().await.cached_payload.clone())
	}

	async fn set_cached_payload(&self, payload: WalletPayload) -> Result<(), CredentialsError> {
		self.inner.write().await.cached_payload = Some(payload);
		Ok(())
	}

	async fn clear(&self) -> Result<(), CredentialsError> {
		*self.inner.write().await = Credentials::default();
		Ok(())
	}
}
