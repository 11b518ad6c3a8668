//! Payload transforms: canonical encoding, password encryption and integrity checksums.

/// Wallet body and envelope serialization
pub mod codec;
/// Password based cipher for the wallet body
pub mod crypto;
/// Integrity digests over outbound payloads
pub mod checksum;

pub use checksum::{ChecksumError, ChecksumProvider, Sha256Checksum};
pub use codec::{CodecError, JsonWalletCodec, WalletEncoding};
pub use crypto::{AesPayloadCrypto, PayloadCrypto, PayloadCryptoError};
