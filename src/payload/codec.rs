//! Canonical encoding of the wallet body and the encrypted envelope.
//!
//! The body is serialized as JSON with a fixed field order and `BTreeMap` keyed maps, so the
//! same `NativeWallet` always yields the same bytes.

use crate::wallet::model::{EncryptedEnvelope, NativeWallet};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("Failed to encode wallet: {0}")]
	Encoding(String),

	#[error("Failed to decode wallet: {0}")]
	Decoding(String),

	#[error("Payload is not valid UTF-8")]
	InvalidUtf8,
}

/// Model ⇄ bytes transform used by sync and login.
pub trait WalletEncoding: Send + Sync {
	fn encode(&self, wallet: &NativeWallet) -> Result<Vec<u8>, CodecError>;

	fn decode(&self, bytes: &[u8]) -> Result<NativeWallet, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWalletCodec;

impl WalletEncoding for JsonWalletCodec {
	fn encode(&self, wallet: &NativeWallet) -> Result<Vec<u8>, CodecError> {
		serde_json::to_vec(wallet).map_err(|e| CodecError::Encoding(e.to_string()))
	}

	fn decode(&self, bytes: &[u8]) -> Result<NativeWallet, CodecError> {
		serde_json::from_slice(bytes).map_err(|e| CodecError::Decoding(e.to_string()))
	}
}

/// Serialize the envelope into the exact string that is uploaded and checksummed.
pub fn encode_envelope(envelope: &EncryptedEnvelope) -> Result<String, CodecError> {
	serde_json::to_string(envelope).map_err(|e| CodecError::Encoding(e.to_string()))
}

pub fn decode_envelope(raw: &str) -> Result<EncryptedEnvelope, CodecError> {
	serde_json::from_str(raw).map_err(|e| CodecError::Decoding(e.to_string()))
}

pub fn bytes_to_string(bytes: Vec<u8>) -> Result<String, CodecError> {
	String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}
