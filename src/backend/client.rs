//!
//! HTTP client for the wallet backend.
//!
//! Covers the endpoints the engine talks to: payload fetch, wallet creation and save, and
//! server side randomness. All methods are async and designed for use with Tokio.

use super::types::*;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::upgrade::entropy::{EntropyError, ServerEntropyProvider};
use crate::wallet::model::WalletPayload;
use crate::wallet::sync::repositories::{
	CreateWalletRepository, CreateWalletRequest, SaveWalletRepository, SaveWalletRequest,
};

/// Wallet backend client
#[derive(Clone)]
pub struct WalletBackendClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL, without a trailing slash.
	base_url: String,
}

impl WalletBackendClient {
	/// Create a new backend client.
	///
	/// # Arguments
	/// * `base_url` - Root of the backend API, e.g. `https://api.blockchain.info`.
	/// * `timeout` - Per-request timeout.
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	/// Fetch the stored wallet payload for `guid`, authenticated by the shared key.
	///
	/// # Returns
	/// The parsed `WalletPayload`. Its `payload` is `None` when the backend withholds it
	/// (two-factor authentication pending).
	pub async fn fetch_payload(
		&self,
		guid: &str,
		shared_key: &str,
	) -> Result<WalletPayload, BackendError> {
		info!("Fetching wallet payload for {}", guid);

		let time = chrono::Utc::now().timestamp_millis().to_string();
		let response = self
			.http_client
			.get(format!("{}/wallet/{}", self.base_url, guid))
			.query(&[
				("sharedKey", shared_key),
				("format", "json"),
				("ct", time.as_str()),
			])
			.send()
			.await?;

		let response = Self::check_status(response).await?;
		let body: WalletPayloadResponse = response.json().await?;
		let payload = WalletPayload::try_from(body)?;

		debug!(
			"Fetched payload for {} (auth type {}, checksum {:?})",
			payload.guid, payload.auth_type, payload.payload_checksum
		);
		Ok(payload)
	}

	/// Fetch `count` random bytes generated by the backend.
	pub async fn random_bytes(&self, count: usize) -> Result<Vec<u8>, BackendError> {
		let response = self
			.http_client
			.get(format!("{}/v2/randombytes", self.base_url))
			.query(&[("bytes", count.to_string()), ("format", "hex".to_string())])
			.send()
			.await?;

		let response = Self::check_status(response).await?;
		let text = response.text().await?;
		hex::decode(text.trim())
			.map_err(|e| BackendError::Server(format!("Invalid random bytes: {}", e)))
	}

	async fn check_status(response: Response) -> Result<Response, BackendError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let body = response.text().await.unwrap_or_default();
		error!("Backend returned {}: {}", status, body);
		let error = match serde_json::from_str::<ErrorResponse>(&body) {
			Ok(parsed) => parsed.into_error(status.as_u16(), body),
			Err(_) => BackendError::Status {
				status: status.as_u16(),
				body,
			},
		};
		Err(error)
	}
}

#[async_trait::async_trait]
impl SaveWalletRepository for WalletBackendClient {
	async fn save_wallet(&self, request: SaveWalletRequest) -> Result<(), BackendError> {
		info!(
			"Saving wallet {} (checksum {} -> {})",
			request.guid, request.old_checksum, request.checksum
		);

		let length = request.length.to_string();
		let mut form: Vec<(&str, &str)> = vec![
			("method", "update"),
			("guid", request.guid.as_str()),
			("sharedKey", request.shared_key.as_str()),
			("payload", request.payload.as_str()),
			("length", length.as_str()),
			("checksum", request.checksum.as_str()),
			("old_checksum", request.old_checksum.as_str()),
			("language", request.language.as_str()),
			("format", "plain"),
		];
		if let Some(addresses) = &request.addresses {
			form.push(("active", addresses.as_str()));
		}

		let response = self
			.http_client
			.post(format!("{}/wallet", self.base_url))
			.form(&form)
			.send()
			.await?;

		let response = Self::check_status(response).await?;
		let body = response.text().await?;
		debug!("Save response: {}", body);
		Ok(())
	}
}

#[async_trait::async_trait]
impl CreateWalletRepository for WalletBackendClient {
	async fn create_wallet(&self, request: CreateWalletRequest) -> Result<(), BackendError> {
		info!("Registering new wallet {}", request.guid);

		let length = request.length.to_string();
		let form: Vec<(&str, &str)> = vec![
			("method", "insert"),
			("guid", request.guid.as_str()),
			("sharedKey", request.shared_key.as_str()),
			("payload", request.payload.as_str()),
			("length", length.as_str()),
			("checksum", request.checksum.as_str()),
			("language", request.language.as_str()),
			("email", request.email.as_str()),
			("format", "plain"),
		];

		let response = self
			.http_client
			.post(format!("{}/wallet", self.base_url))
			.form(&form)
			.send()
			.await?;

		let response = Self::check_status(response).await?;
		let body = response.text().await?;
		debug!("Insert response: {}", body);
		Ok(())
	}
}

#[async_trait::async_trait]
impl ServerEntropyProvider for WalletBackendClient {
	async fn server_entropy(&self, count: usize) -> Result<Vec<u8>, EntropyError> {
		self.random_bytes(count)
			.await
			.map_err(|e| EntropyError::Server(e.to_string()))
	}
}
