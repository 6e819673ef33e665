//! Cryptographic primitives for the ledger
//!
//! Hashing (SHA-256, HASH160), ECDSA key pairs with the raw signature and
//! public-key encodings stored on transaction inputs, and Base58Check
//! addresses.

pub mod hash;
pub mod keys;
pub mod address;

pub use address::Address;
pub use hash::{hash160, sha256, double_sha256};
pub use keys::KeyPair;

/// 256-bit hash type
pub type Hash256 = [u8; 32];

/// 160-bit hash type (public key hash)
pub type Hash160 = [u8; 20];

/// Cryptographic error types
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signature error: {0}")]
    SignatureError(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Utility functions for common cryptographic operations
pub mod utils {
    use super::*;

    /// Convert hex string to bytes
    pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
        hex::decode(hex).map_err(|e| CryptoError::DecodingError(e.to_string()))
    }

    /// Left-pad a big-endian integer to `N` bytes.
    ///
    /// Leading zero bytes beyond `N` are tolerated, anything wider is not.
    pub fn left_pad<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
        let significant = bytes
            .iter()
            .position(|b| *b != 0)
            .map_or(&bytes[bytes.len()..], |first| &bytes[first..]);
        if significant.len() > N {
            return None;
        }
        let mut out = [0u8; N];
        out[N - significant.len()..].copy_from_slice(significant);
        Some(out)
    }
}
