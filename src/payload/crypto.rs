//! Password based encryption of the wallet body.
//!
//! Ciphertext layout is `base64(iv || aes256cbc(plaintext))`. The AES key is derived with
//! PBKDF2-HMAC-SHA1 from the password, using the random IV as the salt.

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Iso10126};
use hmac::Hmac;
use rand::Rng;
use sha1::Sha1;
use tracing::debug;

use crate::wallet::model::{EncryptedEnvelope, LATEST_WALLET_VERSION};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadCryptoError {
	#[error("Key derivation failed: {0}")]
	KeyDerivationFailed(String),

	#[error("Encryption failed: {0}")]
	EncryptionFailed(String),

	#[error("Decryption failed: {0}")]
	DecryptionFailed(String),

	#[error("Ciphertext decoding failed: {0}")]
	DecodingFailed(String),

	#[error("PBKDF2 iterations must be greater than zero")]
	InvalidIterations,

	#[error("Unsupported payload version {0}")]
	UnsupportedPayloadVersion(u32),
}

/// Bytes ⇄ opaque ciphertext string, keyed by password and work factor.
pub trait PayloadCrypto: Send + Sync {
	fn encrypt(
		&self,
		plaintext: &str,
		password: &str,
		iterations: u32,
	) -> Result<String, PayloadCryptoError>;

	fn decrypt(
		&self,
		ciphertext: &str,
		password: &str,
		iterations: u32,
	) -> Result<String, PayloadCryptoError>;

	/// Decrypt a stored envelope using the work factor it declares.
	fn decrypt_envelope(
		&self,
		envelope: &EncryptedEnvelope,
		password: &str,
	) -> Result<String, PayloadCryptoError> {
		if envelope.version > LATEST_WALLET_VERSION {
			return Err(PayloadCryptoError::UnsupportedPayloadVersion(
				envelope.version,
			));
		}
		self.decrypt(&envelope.payload, password, envelope.pbkdf2_iterations)
	}
}

/// AES-256-CBC with ISO 10126 padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesPayloadCrypto;

impl AesPayloadCrypto {
	fn derive_key(
		password: &str,
		salt: &[u8],
		iterations: u32,
	) -> Result<[u8; KEY_LEN], PayloadCryptoError> {
		if iterations == 0 {
			return Err(PayloadCryptoError::InvalidIterations);
		}
		let mut key = [0u8; KEY_LEN];
		pbkdf2::pbkdf2::<Hmac<Sha1>>(password.as_bytes(), salt, iterations, &mut key)
			.map_err(|e| PayloadCryptoError::KeyDerivationFailed(e.to_string()))?;
		Ok(key)
	}

	pub(crate) fn encrypt_with_iv(
		plaintext: &str,
		password: &str,
		iterations: u32,
		iv: [u8; IV_LEN],
	) -> Result<String, PayloadCryptoError> {
		let key = Self::derive_key(password, &iv, iterations)?;
		let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
			.map_err(|e| PayloadCryptoError::EncryptionFailed(e.to_string()))?;
		let ciphertext = cipher.encrypt_padded_vec_mut::<Iso10126>(plaintext.as_bytes());

		let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
		out.extend_from_slice(&iv);
		out.extend_from_slice(&ciphertext);
		Ok(STANDARD.encode(out))
	}
}

impl PayloadCrypto for AesPayloadCrypto {
	fn encrypt(
		&self,
		plaintext: &str,
		password: &str,
		iterations: u32,
	) -> Result<String, PayloadCryptoError> {
		let mut iv = [0u8; IV_LEN];
		rand::rng().fill(&mut iv);
		Self::encrypt_with_iv(plaintext, password, iterations, iv)
	}

	fn decrypt(
		&self,
		ciphertext: &str,
		password: &str,
		iterations: u32,
	) -> Result<String, PayloadCryptoError> {
		let raw = STANDARD
			.decode(ciphertext.trim())
			.map_err(|e| PayloadCryptoError::DecodingFailed(e.to_string()))?;
		if raw.len() <= IV_LEN || (raw.len() - IV_LEN) % IV_LEN != 0 {
			return Err(PayloadCryptoError::DecodingFailed(format!(
				"ciphertext has invalid length {}",
				raw.len()
			)));
		}

		let (iv, body) = raw.split_at(IV_LEN);
		let key = Self::derive_key(password, iv, iterations)?;
		let cipher = Aes256CbcDec::new_from_slices(&key, iv)
			.map_err(|e| PayloadCryptoError::DecryptionFailed(e.to_string()))?;
		let plaintext = cipher
			.decrypt_padded_vec_mut::<Iso10126>(body)
			.map_err(|_| PayloadCryptoError::DecryptionFailed("bad padding".to_string()))?;

		debug!("Decrypted {} bytes of payload", plaintext.len());

		// A wrong password usually survives the loose padding check but yields garbage bytes.
		String::from_utf8(plaintext).map_err(|_| {
			PayloadCryptoError::DecryptionFailed("plaintext is not valid UTF-8".to_string())
		})
	}
}
