//! Wire types for the wallet backend.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::payload::codec::decode_envelope;
use crate::wallet::model::WalletPayload;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Unexpected status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Response is missing the wallet guid")]
	MissingGuid,

	#[error("Response is missing the wallet payload")]
	MissingPayload,

	#[error("Email authorization required")]
	EmailAuthorizationRequired,

	#[error("Account is locked")]
	AccountLocked,

	#[error("Server error: {0}")]
	Server(String),
}

/// Body of `GET /wallet/{guid}?format=json`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletPayloadResponse {
	pub guid: Option<String>,
	#[serde(default)]
	pub payload: Option<String>,
	#[serde(rename = "real_auth_type", default)]
	pub auth_type: i32,
	#[serde(default)]
	pub language: String,
	#[serde(rename = "serverTime", default)]
	pub server_time: i64,
	#[serde(rename = "sync_pubkeys", default)]
	pub should_sync_pub_keys: bool,
	#[serde(default)]
	pub payload_checksum: Option<String>,
}

impl TryFrom<WalletPayloadResponse> for WalletPayload {
	type Error = BackendError;

	fn try_from(response: WalletPayloadResponse) -> Result<Self, Self::Error> {
		let guid = response.guid.ok_or(BackendError::MissingGuid)?;

		// With two-factor auth enabled the payload is withheld and auth_type is non-zero.
		let payload = response.payload.as_deref().and_then(|raw| match decode_envelope(raw) {
			Ok(envelope) => Some(envelope),
			Err(e) => {
				warn!("Ignoring undecodable payload for {}: {}", guid, e);
				None
			}
		});

		let time = DateTime::<Utc>::from_timestamp_millis(response.server_time).unwrap_or_default();

		Ok(WalletPayload {
			guid,
			auth_type: response.auth_type,
			language: response.language,
			should_sync_pub_keys: response.should_sync_pub_keys,
			time,
			payload_checksum: response.payload_checksum,
			payload,
		})
	}
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
	#[serde(rename = "authorization_required", default)]
	pub authorization_required: bool,
	#[serde(rename = "initial_error", default)]
	pub initial_error: Option<String>,
}

impl ErrorResponse {
	pub fn into_error(self, status: u16, body: String) -> BackendError {
		if self.authorization_required {
			return BackendError::EmailAuthorizationRequired;
		}
		match self.initial_error {
			Some(message) if message.contains("locked") => BackendError::AccountLocked,
			Some(message) => BackendError::Server(message),
			None => BackendError::Status { status, body },
		}
	}
}
