//! Wallet sync orchestrator.
//!
//! `WalletSync` persists a `Wrapper` to the backend and, only once the backend acknowledges,
//! makes it the authoritative local copy. The pipeline is:
//! - encode the body, encrypt it, decrypt it again and compare (encrypt-and-verify)
//! - wrap the ciphertext in the versioned envelope and checksum it
//! - optionally collect lookahead addresses for pub key syncing
//! - save remotely, passing the previous checksum for concurrency control
//! - commit: password, holder swap, then the cached payload
//!
//! CPU-bound steps run on the blocking pool. Dropping the future before the commit leaves all
//! local state untouched.

use crate::payload::codec::{bytes_to_string, encode_envelope};
use crate::payload::{ChecksumProvider, JsonWalletCodec, PayloadCrypto, WalletEncoding};
use crate::payload::{AesPayloadCrypto, Sha256Checksum};
use crate::wallet::WalletSyncError;
use crate::wallet::credentials::CredentialsStore;
use crate::wallet::holder::WalletHolder;
use crate::wallet::model::{EncryptedEnvelope, WalletPayload, Wrapper};
use crate::wallet::sync::{
    events::{EventDispatcher, SyncEvent, SyncEventHandler},
    pubkeys::{LookaheadPolicy, SyncPubKeysAddressesProvider},
    repositories::{SaveWalletRepository, SaveWalletRequest},
};

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Output of the encode/encrypt/checksum stage.
#[derive(Debug, Clone)]
pub(crate) struct PreparedPayload {
    pub(crate) envelope: EncryptedEnvelope,
    /// Serialized `envelope`, exactly as uploaded.
    pub(crate) raw: String,
    pub(crate) checksum: String,
}

/// Codec, cipher and checksum used by the blocking stage.
#[derive(Clone)]
pub(crate) struct PayloadPipeline {
    pub(crate) encoder: Arc<dyn WalletEncoding>,
    pub(crate) crypto: Arc<dyn PayloadCrypto>,
    pub(crate) checksum: Arc<dyn ChecksumProvider>,
}

impl Default for PayloadPipeline {
    fn default() -> Self {
        Self {
            encoder: Arc::new(JsonWalletCodec),
            crypto: Arc::new(AesPayloadCrypto),
            checksum: Arc::new(Sha256Checksum),
        }
    }
}

impl PayloadPipeline {
    /// Run `prepare` on the blocking pool of `runtime`, or of the current runtime.
    pub(crate) async fn prepare_blocking(
        &self,
        runtime: Option<Handle>,
        wrapper: &Wrapper,
        password: &str,
    ) -> Result<PreparedPayload, WalletSyncError> {
        let pipeline = self.clone();
        let wrapper = wrapper.clone();
        let password = password.to_string();
        let runtime = runtime.unwrap_or_else(Handle::current);

        runtime
            .spawn_blocking(move || pipeline.prepare(&wrapper, &password))
            .await
            .map_err(|e| WalletSyncError::Runtime(e.to_string()))?
    }

    fn prepare(&self, wrapper: &Wrapper, password: &str) -> Result<PreparedPayload, WalletSyncError> {
        let plaintext = bytes_to_string(self.encoder.encode(&wrapper.wallet)?)?;

        let ciphertext = self
            .crypto
            .encrypt(&plaintext, password, wrapper.pbkdf2_iterations)?;
        let decrypted = self
            .crypto
            .decrypt(&ciphertext, password, wrapper.pbkdf2_iterations)
            .map_err(|e| WalletSyncError::Verification(e.to_string()))?;
        if decrypted != plaintext {
            return Err(WalletSyncError::Verification(
                "decrypted payload does not match the encoded wallet".to_string(),
            ));
        }

        let envelope = EncryptedEnvelope {
            pbkdf2_iterations: wrapper.pbkdf2_iterations,
            version: wrapper.version,
            payload: ciphertext,
        };
        let raw = encode_envelope(&envelope)?;
        let checksum = self.checksum.checksum(raw.as_bytes());

        Ok(PreparedPayload {
            envelope,
            raw,
            checksum,
        })
    }
}

/// Persists wrappers and keeps the holder consistent with what the backend stores.
pub struct WalletSync {
    holder: Arc<WalletHolder>,
    credentials: Arc<dyn CredentialsStore>,
    save_repository: Arc<dyn SaveWalletRepository>,
    address_provider: Arc<dyn SyncPubKeysAddressesProvider>,
    pipeline: PayloadPipeline,
    dispatcher: EventDispatcher,
    runtime: Option<Handle>,
}

impl WalletSync {
    /// Create a sync service with the default codec, cipher and checksum.
    pub fn new(
        holder: Arc<WalletHolder>,
        credentials: Arc<dyn CredentialsStore>,
        save_repository: Arc<dyn SaveWalletRepository>,
        address_provider: Arc<dyn SyncPubKeysAddressesProvider>,
    ) -> Self {
        Self {
            holder,
            credentials,
            save_repository,
            address_provider,
            pipeline: PayloadPipeline::default(),
            dispatcher: EventDispatcher::new(),
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

    /// Run the CPU-bound stage on this runtime instead of the caller's.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Register an event handler. Handlers are called in registration order.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.dispatcher.register_handler(handler);
    }

    /// Persist `wrapper` encrypted with `password`.
    ///
    /// On success the holder contains `wrapper` carrying the new checksum. On failure nothing
    /// local has changed.
    pub async fn sync(&self, wrapper: &Wrapper, password: &str) -> Result<(), WalletSyncError> {
        let guid = wrapper.guid().to_string();
        self.dispatcher
            .dispatch(&SyncEvent::SyncStarted {
                guid: guid.clone(),
                version: wrapper.version,
            })
            .await;

        match self.run(wrapper, password).await {
            Ok(checksum) => {
                self.dispatcher
                    .dispatch(&SyncEvent::SyncCompleted { guid, checksum })
                    .await;
                Ok(())
            }
            Err(e) => {
                self.dispatcher
                    .dispatch(&SyncEvent::SyncFailed {
                        guid,
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run(&self, wrapper: &Wrapper, password: &str) -> Result<String, WalletSyncError> {
        info!(
            "Syncing wallet {} at version {}",
            wrapper.guid(),
            wrapper.version
        );

        let prepared = self
            .pipeline
            .prepare_blocking(self.runtime.clone(), wrapper, password)
            .await?;
        self.dispatcher
            .dispatch(&SyncEvent::PayloadEncrypted {
                checksum: prepared.checksum.clone(),
                length: prepared.raw.len(),
            })
            .await;

        let addresses = self.prepare_addresses(wrapper).await?;

        let request = SaveWalletRequest {
            guid: wrapper.wallet.guid.clone(),
            shared_key: wrapper.wallet.shared_key.clone(),
            payload: prepared.raw.clone(),
            checksum: prepared.checksum.clone(),
            old_checksum: wrapper.payload_checksum.clone(),
            length: prepared.raw.len(),
            language: wrapper.language.clone(),
            addresses,
        };
        self.save_repository.save_wallet(request).await?;
        self.dispatcher
            .dispatch(&SyncEvent::PayloadSaved {
                checksum: prepared.checksum.clone(),
            })
            .await;

        self.commit(wrapper, password, prepared).await
    }

    async fn prepare_addresses(&self, wrapper: &Wrapper) -> Result<Option<String>, WalletSyncError> {
        if !wrapper.sync_pub_keys {
            return Ok(None);
        }

        let accounts = wrapper
            .wallet
            .default_hd_wallet()
            .map(|hd_wallet| hd_wallet.accounts.as_slice())
            .unwrap_or_default();

        match self
            .address_provider
            .provide_addresses(&wrapper.wallet.addresses, accounts)
            .await
        {
            Ok(addresses) => {
                let count = addresses.split('|').filter(|a| !a.is_empty()).count();
                self.dispatcher
                    .dispatch(&SyncEvent::AddressesPrepared { count })
                    .await;
                Ok(Some(addresses))
            }
            Err(e) if self.address_provider.policy() == LookaheadPolicy::BestEffort => {
                warn!("Continuing sync without lookahead addresses: {}", e);
                self.dispatcher
                    .dispatch(&SyncEvent::AddressesPrepared { count: 0 })
                    .await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Password, then holder. If storing the password fails neither has moved. A failed
    /// cache write is only logged.
    async fn commit(
        &self,
        wrapper: &Wrapper,
        password: &str,
        prepared: PreparedPayload,
    ) -> Result<String, WalletSyncError> {
        if self.credentials.password().await?.as_deref() != Some(password) {
            debug!("Storing new password for {}", wrapper.guid());
            self.credentials.set_password(password).await?;
        }

        self.holder
            .hold_wrapper(wrapper.with_checksum(prepared.checksum.clone()));

        if let Err(e) = self.cache_payload(wrapper, &prepared).await {
            warn!(
                "Saved wallet {} but could not cache its payload: {}",
                wrapper.guid(),
                e
            );
        }

        info!(
            "Committed wallet {} with checksum {}",
            wrapper.guid(),
            prepared.checksum
        );
        Ok(prepared.checksum)
    }

    async fn cache_payload(
        &self,
        wrapper: &Wrapper,
        prepared: &PreparedPayload,
    ) -> Result<(), WalletSyncError> {
        let auth_type = self
            .credentials
            .cached_payload()
            .await?
            .map(|cached| cached.auth_type)
            .unwrap_or_default();
        self.credentials
            .set_cached_payload(WalletPayload {
                guid: wrapper.wallet.guid.clone(),
                auth_type,
                language: wrapper.language.clone(),
                should_sync_pub_keys: wrapper.sync_pub_keys,
                time: chrono::Utc::now(),
                payload_checksum: Some(prepared.checksum.clone()),
                payload: Some(prepared.envelope.clone()),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::payload::PayloadCryptoError;
    use crate::wallet::credentials::{CredentialsError, InMemoryCredentialsStore};
    use crate::wallet::holder::WalletState;
    use crate::wallet::model::{LegacyAddress, NativeWallet, WalletOptions};
    use crate::wallet::sync::pubkeys::AddressProviderError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRepository {
        requests: Mutex<Vec<SaveWalletRequest>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SaveWalletRepository for RecordingRepository {
        async fn save_wallet(&self, request: SaveWalletRequest) -> Result<(), BackendError> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                return Err(BackendError::Server("rejected".to_string()));
            }
            Ok(())
        }
    }

    struct StaticAddresses(Result<String, AddressProviderError>, LookaheadPolicy);

    #[async_trait::async_trait]
    impl SyncPubKeysAddressesProvider for StaticAddresses {
        async fn provide_addresses(
            &self,
            _active: &[LegacyAddress],
            _accounts: &[crate::wallet::model::Account],
        ) -> Result<String, AddressProviderError> {
            self.0.clone()
        }

        fn policy(&self) -> LookaheadPolicy {
            self.1
        }
    }

    /// Encrypts fine but garbles decryption.
    struct LossyCrypto;

    impl PayloadCrypto for LossyCrypto {
        fn encrypt(&self, plaintext: &str, _: &str, _: u32) -> Result<String, PayloadCryptoError> {
            Ok(plaintext.to_string())
        }

        fn decrypt(&self, ciphertext: &str, _: &str, _: u32) -> Result<String, PayloadCryptoError> {
            Ok(format!("{ciphertext}!"))
        }
    }

    fn wrapper(sync_pub_keys: bool) -> Wrapper {
        let wallet = NativeWallet {
            guid: "guid".to_string(),
            shared_key: "shared-key".to_string(),
            double_encrypted: false,
            double_password_hash: None,
            metadata_hd_node: None,
            options: WalletOptions::default(),
            hd_wallets: vec![],
            addresses: vec![],
            tx_notes: None,
            address_book: None,
        };
        Wrapper::new(10, 4, "old-checksum", "en", sync_pub_keys, wallet)
    }

    fn sync_with(
        repository: Arc<RecordingRepository>,
        provider: StaticAddresses,
    ) -> (WalletSync, Arc<WalletHolder>, Arc<InMemoryCredentialsStore>) {
        let holder = Arc::new(WalletHolder::new());
        let credentials = Arc::new(InMemoryCredentialsStore::new());
        let sync = WalletSync::new(
            holder.clone(),
            credentials.clone(),
            repository,
            Arc::new(provider),
        );
        (sync, holder, credentials)
    }

    fn no_addresses() -> StaticAddresses {
        StaticAddresses(Ok(String::new()), LookaheadPolicy::Required)
    }

    struct FixedChecksum;

    impl ChecksumProvider for FixedChecksum {
        fn checksum(&self, _data: &[u8]) -> String {
            "checksum".to_string()
        }
    }

    /// In-memory store whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyCredentials {
        inner: InMemoryCredentialsStore,
        fail_password: bool,
        fail_cache: bool,
    }

    #[async_trait::async_trait]
    impl CredentialsStore for FlakyCredentials {
        async fn password(&self) -> Result<Option<String>, CredentialsError> {
            self.inner.password().await
        }

        async fn set_password(&self, password: &str) -> Result<(), CredentialsError> {
            if self.fail_password {
                return Err(CredentialsError::Storage("keychain locked".to_string()));
            }
            self.inner.set_password(password).await
        }

        async fn guid(&self) -> Result<Option<String>, CredentialsError> {
            self.inner.guid().await
        }

        async fn set_guid(&self, guid: &str) -> Result<(), CredentialsError> {
            self.inner.set_guid(guid).await
        }

        async fn shared_key(&self) -> Result<Option<String>, CredentialsError> {
            self.inner.shared_key().await
        }

        async fn set_shared_key(&self, shared_key: &str) -> Result<(), CredentialsError> {
            self.inner.set_shared_key(shared_key).await
        }

        async fn cached_payload(&self) -> Result<Option<WalletPayload>, CredentialsError> {
            self.inner.cached_payload().await
        }

        async fn set_cached_payload(&self, payload: WalletPayload) -> Result<(), CredentialsError> {
            if self.fail_cache {
                return Err(CredentialsError::Storage("disk full".to_string()));
            }
            self.inner.set_cached_payload(payload).await
        }

        async fn clear(&self) -> Result<(), CredentialsError> {
            self.inner.clear().await
        }
    }

    async fn flaky_sync(
        credentials: FlakyCredentials,
    ) -> (WalletSync, Arc<WalletHolder>, Arc<FlakyCredentials>) {
        credentials.inner.set_password("old-password").await.unwrap();
        let credentials = Arc::new(credentials);
        let holder = Arc::new(WalletHolder::new());
        let sync = WalletSync::new(
            holder.clone(),
            credentials.clone(),
            Arc::new(RecordingRepository::default()),
            Arc::new(no_addresses()),
        )
        .with_checksum(Arc::new(FixedChecksum));
        (sync, holder, credentials)
    }

    #[tokio::test]
    async fn successful_sync_commits_new_checksum() {
        let repository = Arc::new(RecordingRepository::default());
        let (sync, holder, credentials) = sync_with(repository.clone(), no_addresses());
        credentials.set_password("old-password").await.unwrap();
        let sync = sync.with_checksum(Arc::new(FixedChecksum));
        let input = wrapper(true);

        sync.sync(&input, "new-password").await.unwrap();

        let request = repository.requests.lock().unwrap()[0].clone();
        assert_eq!(request.old_checksum, "old-checksum");
        assert_eq!(request.checksum, "checksum");
        assert_eq!(request.length, request.payload.len());
        assert_eq!(request.addresses.as_deref(), Some(""));

        assert_eq!(*holder.wrapper().unwrap(), input.with_checksum("checksum"));
        assert_eq!(
            credentials.password().await.unwrap().as_deref(),
            Some("new-password")
        );
        let cached = credentials.cached_payload().await.unwrap().unwrap();
        assert_eq!(cached.payload_checksum.as_deref(), Some("checksum"));
        assert_eq!(encode_envelope(&cached.payload.unwrap()).unwrap(), request.payload);
    }

    #[tokio::test]
    async fn default_checksum_is_sha256_of_uploaded_envelope() {
        let repository = Arc::new(RecordingRepository::default());
        let (sync, holder, _) = sync_with(repository.clone(), no_addresses());

        sync.sync(&wrapper(false), "pw").await.unwrap();

        let request = repository.requests.lock().unwrap()[0].clone();
        assert_eq!(
            request.checksum,
            Sha256Checksum.checksum(request.payload.as_bytes())
        );
        assert_eq!(request.addresses, None);
        assert_eq!(holder.wrapper().unwrap().payload_checksum, request.checksum);
    }

    #[tokio::test]
    async fn failed_save_leaves_state_untouched() {
        let repository = Arc::new(RecordingRepository {
            fail: true,
            ..Default::default()
        });
        let (sync, holder, credentials) = sync_with(repository, no_addresses());
        credentials.set_password("old-password").await.unwrap();

        let result = sync.sync(&wrapper(false), "new-password").await;
        assert!(matches!(result, Err(WalletSyncError::Network(_))));
        assert_eq!(holder.current(), WalletState::Unloaded);
        assert_eq!(
            credentials.password().await.unwrap().as_deref(),
            Some("old-password")
        );
        assert_eq!(credentials.cached_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_failure_after_save_still_commits() {
        let (sync, holder, credentials) = flaky_sync(FlakyCredentials {
            fail_cache: true,
            ..Default::default()
        })
        .await;
        let input = wrapper(false);

        sync.sync(&input, "new-password").await.unwrap();

        assert_eq!(*holder.wrapper().unwrap(), input.with_checksum("checksum"));
        assert_eq!(
            credentials.password().await.unwrap().as_deref(),
            Some("new-password")
        );
        assert_eq!(credentials.cached_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn password_failure_leaves_holder_and_password_unchanged() {
        let (sync, holder, credentials) = flaky_sync(FlakyCredentials {
            fail_password: true,
            ..Default::default()
        })
        .await;

        let result = sync.sync(&wrapper(false), "new-password").await;

        assert!(matches!(result, Err(WalletSyncError::Credentials(_))));
        assert_eq!(holder.current(), WalletState::Unloaded);
        assert_eq!(
            credentials.password().await.unwrap().as_deref(),
            Some("old-password")
        );
    }

    #[tokio::test]
    async fn verification_mismatch_aborts_before_save() {
        let repository = Arc::new(RecordingRepository::default());
        let (sync, holder, _) = sync_with(repository.clone(), no_addresses());
        let sync = sync.with_crypto(Arc::new(LossyCrypto));

        let result = sync.sync(&wrapper(false), "pw").await;
        assert!(matches!(result, Err(WalletSyncError::Verification(_))));
        assert!(repository.requests.lock().unwrap().is_empty());
        assert!(holder.wrapper().is_none());
    }

    #[tokio::test]
    async fn addresses_attached_when_syncing_pub_keys() {
        let repository = Arc::new(RecordingRepository::default());
        let provider = StaticAddresses(Ok("a|b".to_string()), LookaheadPolicy::Required);
        let (sync, _, _) = sync_with(repository.clone(), provider);

        sync.sync(&wrapper(true), "pw").await.unwrap();
        assert_eq!(
            repository.requests.lock().unwrap()[0].addresses.as_deref(),
            Some("a|b")
        );
    }

    #[tokio::test]
    async fn required_provider_failure_aborts() {
        let repository = Arc::new(RecordingRepository::default());
        let provider = StaticAddresses(
            Err(AddressProviderError::MissingDerivation(0)),
            LookaheadPolicy::Required,
        );
        let (sync, _, _) = sync_with(repository.clone(), provider);

        let result = sync.sync(&wrapper(true), "pw").await;
        assert!(matches!(result, Err(WalletSyncError::SyncPubKeys(_))));
        assert!(repository.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn best_effort_provider_failure_saves_without_addresses() {
        let repository = Arc::new(RecordingRepository::default());
        let provider = StaticAddresses(
            Err(AddressProviderError::MissingDerivation(0)),
            LookaheadPolicy::BestEffort,
        );
        let (sync, holder, _) = sync_with(repository.clone(), provider);

        sync.sync(&wrapper(true), "pw").await.unwrap();
        assert_eq!(repository.requests.lock().unwrap()[0].addresses, None);
        assert!(holder.current().is_fully_loaded());
    }
}
