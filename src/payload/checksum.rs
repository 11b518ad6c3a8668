use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
	#[error("Checksum mismatch: expected {expected}, got {actual}")]
	Mismatch { expected: String, actual: String },
}

/// Integrity digest over an outbound payload.
pub trait ChecksumProvider: Send + Sync {
	fn checksum(&self, data: &[u8]) -> String;

	fn verify(&self, data: &[u8], expected: &str) -> Result<(), ChecksumError> {
		let actual = self.checksum(data);
		if actual.eq_ignore_ascii_case(expected) {
			Ok(())
		} else {
			Err(ChecksumError::Mismatch {
				expected: expected.to_string(),
				actual,
			})
		}
	}
}

/// Lowercase hex SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksum;

impl ChecksumProvider for Sha256Checksum {
	fn checksum(&self, data: &[u8]) -> String {
		hex::encode(Sha256::digest(data))
	}
}
