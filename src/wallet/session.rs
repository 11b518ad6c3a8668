//! Logged-in wallet session.
//!
//! A `WalletSession` exists only between login and logout. Login verifies and decrypts the
//! fetched payload and fills the holder; every later change goes through `WalletSync`, so the
//! holder only ever reflects what the backend has accepted.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::payload::codec::encode_envelope;
use crate::payload::{
	AesPayloadCrypto, ChecksumProvider, JsonWalletCodec, PayloadCrypto, Sha256Checksum,
	WalletEncoding,
};
use crate::upgrade::WalletUpgrader;
use crate::wallet::credentials::CredentialsStore;
use crate::wallet::holder::{WalletHolder, WalletState};
use crate::wallet::model::{EncryptedEnvelope, NativeWallet, WalletPayload, Wrapper};
use crate::wallet::sync::WalletSync;
use crate::wallet::sync::events::SyncEventHandler;
use crate::wallet::sync::pubkeys::SyncPubKeysAddressesProvider;
use crate::wallet::sync::repositories::SaveWalletRepository;
use crate::wallet::types::SessionError;

/// Collaborators a session is built from.
pub struct SessionDependencies {
	pub credentials: Arc<dyn CredentialsStore>,
	pub upgrader: Arc<WalletUpgrader>,
	pub save_repository: Arc<dyn SaveWalletRepository>,
	pub address_provider: Arc<dyn SyncPubKeysAddressesProvider>,
	pub encoder: Arc<dyn WalletEncoding>,
	pub crypto: Arc<dyn PayloadCrypto>,
	pub checksum: Arc<dyn ChecksumProvider>,
	pub event_handlers: Vec<Box<dyn SyncEventHandler>>,
	/// Runtime for CPU-bound work; the caller's runtime when `None`.
	pub runtime: Option<Handle>,
}

impl SessionDependencies {
	/// Dependencies with the default codec, cipher and checksum.
	pub fn new(
		credentials: Arc<dyn CredentialsStore>,
		upgrader: Arc<WalletUpgrader>,
		save_repository: Arc<dyn SaveWalletRepository>,
		address_provider: Arc<dyn SyncPubKeysAddressesProvider>,
	) -> Self {
		Self {
			credentials,
			upgrader,
			save_repository,
			address_provider,
			encoder: Arc::new(JsonWalletCodec),
			crypto: Arc::new(AesPayloadCrypto),
			checksum: Arc::new(Sha256Checksum),
			event_handlers: Vec::new(),
			runtime: None,
		}
	}

	pub fn with_event_handler(mut self, handler: Box<dyn SyncEventHandler>) -> Self {
		self.event_handlers.push(handler);
		self
	}
}

pub struct WalletSession {
	holder: Arc<WalletHolder>,
	credentials: Arc<dyn CredentialsStore>,
	upgrader: Arc<WalletUpgrader>,
	sync: WalletSync,
}

impl WalletSession {
	/// Verify, decrypt and decode `payload`, then hold the resulting wrapper.
	pub async fn login(
		deps: SessionDependencies,
		payload: WalletPayload,
		password: &str,
	) -> Result<Self, SessionError> {
		info!("Logging in to wallet {}", payload.guid);

		let holder = Arc::new(WalletHolder::new());
		holder.hold(WalletState::PartiallyLoaded(Arc::new(payload.clone())));

		let (envelope, wallet) = match Self::open_payload(&deps, &payload, password).await {
			Ok(opened) => opened,
			Err(e) => {
				holder.release();
				return Err(e);
			}
		};

		let wrapper = Wrapper::new(
			envelope.pbkdf2_iterations,
			envelope.version,
			payload.payload_checksum.clone().unwrap_or_default(),
			payload.language.clone(),
			payload.should_sync_pub_keys,
			wallet,
		);

		deps.credentials.set_password(password).await?;
		deps.credentials.set_guid(&wrapper.wallet.guid).await?;
		deps.credentials
			.set_shared_key(&wrapper.wallet.shared_key)
			.await?;
		deps.credentials.set_cached_payload(payload).await?;

		debug!(
			"Decrypted wallet {} at version {}",
			wrapper.guid(),
			wrapper.version
		);
		holder.hold_wrapper(wrapper);

		let mut sync = WalletSync::new(
			holder.clone(),
			deps.credentials.clone(),
			deps.save_repository,
			deps.address_provider,
		)
		.with_encoder(deps.encoder)
		.with_crypto(deps.crypto)
		.with_checksum(deps.checksum);
		if let Some(runtime) = deps.runtime {
			sync = sync.with_runtime(runtime);
		}
		for handler in deps.event_handlers {
			sync.register_handler(handler);
		}

		Ok(Self {
			holder,
			credentials: deps.credentials,
			upgrader: deps.upgrader,
			sync,
		})
	}

	async fn open_payload(
		deps: &SessionDependencies,
		payload: &WalletPayload,
		password: &str,
	) -> Result<(EncryptedEnvelope, NativeWallet), SessionError> {
		let envelope = payload.payload.clone().ok_or(SessionError::MissingPayload)?;

		if let Some(expected) = payload.payload_checksum.as_deref() {
			let raw = encode_envelope(&envelope)?;
			deps.checksum.verify(raw.as_bytes(), expected)?;
		}

		let crypto = deps.crypto.clone();
		let encoder = deps.encoder.clone();
		let password = password.to_string();
		let runtime = deps.runtime.clone().unwrap_or_else(Handle::current);

		runtime
			.spawn_blocking(move || -> Result<(EncryptedEnvelope, NativeWallet), SessionError> {
				let plaintext = crypto.decrypt_envelope(&envelope, &password)?;
				let wallet = encoder.decode(plaintext.as_bytes())?;
				Ok((envelope, wallet))
			})
			.await
			.map_err(|e| SessionError::Runtime(e.to_string()))?
	}

	/// The currently held wrapper.
	pub fn wrapper(&self) -> Result<Arc<Wrapper>, SessionError> {
		self.holder.wrapper().ok_or(SessionError::NotLoaded)
	}

	pub fn holder(&self) -> Arc<WalletHolder> {
		self.holder.clone()
	}

	/// Bring the held wallet to the latest version and persist it if anything changed.
	///
	/// Returns the wrapper held afterwards. A failed upgrade or sync leaves the holder as it was.
	pub async fn upgrade_and_sync(&self, password: &str) -> Result<Arc<Wrapper>, SessionError> {
		let current = self.wrapper()?;
		let upgraded = self.upgrader.perform_upgrade((*current).clone()).await?;

		if upgraded == *current {
			debug!("Wallet {} is already at version {}", current.guid(), current.version);
			return Ok(current);
		}

		info!(
			"Upgraded wallet {} from version {} to {}, syncing",
			current.guid(),
			current.version,
			upgraded.version
		);
		self.sync.sync(&upgraded, password).await?;
		self.wrapper()
	}

	/// Persist an arbitrary wrapper, e.g. after a local edit.
	pub async fn sync(&self, wrapper: &Wrapper, password: &str) -> Result<(), SessionError> {
		Ok(self.sync.sync(wrapper, password).await?)
	}

	/// Re-encrypt the held wallet under `new_password`.
	pub async fn change_password(&self, new_password: &str) -> Result<(), SessionError> {
		let current = self.wrapper()?;
		self.sync(&current, new_password).await
	}

	/// Toggle backend pre-indexing of lookahead addresses.
	pub async fn set_sync_pub_keys(&self, enabled: bool, password: &str) -> Result<(), SessionError> {
		let current = self.wrapper()?;
		self.sync(&current.with_sync_pub_keys(enabled), password).await
	}

	/// End the session: release the holder and forget all credentials.
	pub async fn logout(self) -> Result<(), SessionError> {
		info!("Logging out");
		self.holder.release();
		self.credentials.clear().await?;
		Ok(())
	}
}
