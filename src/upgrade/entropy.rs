//! Entropy sources for new HD wallets.
//!
//! A fresh seed is the XOR of local and server randomness so that neither side alone can
//! predict it.

use rand::RngCore;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntropyError {
	#[error("Local entropy unavailable: {0}")]
	Local(String),

	#[error("Server entropy unavailable: {0}")]
	Server(String),

	#[error("Expected {expected} bytes of entropy, got {actual}")]
	InvalidLength { expected: usize, actual: usize },
}

pub trait LocalEntropyProvider: Send + Sync {
	fn random_bytes(&self, count: usize) -> Result<Vec<u8>, EntropyError>;
}

#[async_trait::async_trait]
pub trait ServerEntropyProvider: Send + Sync {
	async fn server_entropy(&self, count: usize) -> Result<Vec<u8>, EntropyError>;
}

/// Operating system randomness via the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl LocalEntropyProvider for OsEntropy {
	fn random_bytes(&self, count: usize) -> Result<Vec<u8>, EntropyError> {
		let mut bytes = vec![0u8; count];
		rand::rng().fill_bytes(&mut bytes);
		Ok(bytes)
	}
}

/// Combines a local and a server entropy source.
#[derive(Clone)]
pub struct EntropyService {
	local: Arc<dyn LocalEntropyProvider>,
	server: Arc<dyn ServerEntropyProvider>,
}

impl EntropyService {
	pub fn new(
		local: Arc<dyn LocalEntropyProvider>,
		server: Arc<dyn ServerEntropyProvider>,
	) -> Self {
		Self { local, server }
	}

	/// `count` bytes of local entropy XORed with `count` bytes of server entropy.
	pub async fn generate(&self, count: usize) -> Result<Vec<u8>, EntropyError> {
		let local = self.local.random_bytes(count)?;
		let server = self.server.server_entropy(count).await?;

		for bytes in [&local, &server] {
			if bytes.len() != count {
				return Err(EntropyError::InvalidLength {
					expected: count,
					actual: bytes.len(),
				});
			}
		}

		debug!("Combined {} bytes of local and server entropy", count);
		Ok(local.iter().zip(server.iter()).map(|(l, s)| l ^ s).collect())
	}
}
