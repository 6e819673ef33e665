//! Base58Check addresses
//!
//! An address is `base58(version || public_key_hash || checksum)` where the
//! checksum is the first four bytes of a double SHA-256 over the versioned
//! hash.

use crate::hash::{double_sha256, hash160};
use crate::{CryptoError, Hash160, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version byte prepended to every address
pub const VERSION: u8 = 0x00;

/// Number of checksum bytes appended to every address
pub const CHECKSUM_LENGTH: usize = 4;

const PAYLOAD_LENGTH: usize = 1 + 20 + CHECKSUM_LENGTH;

/// A validated pay-to-public-key-hash address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Hash160);

impl Address {
    pub fn from_public_key_hash(public_key_hash: Hash160) -> Self {
        Self(public_key_hash)
    }

    /// Address of a raw `X || Y` public key
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(hash160(public_key))
    }

    /// The 20-byte hash outputs are locked to
    pub fn public_key_hash(&self) -> Hash160 {
        self.0
    }

    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
        payload.push(VERSION);
        payload.extend_from_slice(&self.0);
        let sum = checksum(&payload);
        payload.extend_from_slice(&sum);
        bs58::encode(payload).into_string()
    }

    /// Decode and validate an address string
    pub fn decode(text: &str) -> Result<Self> {
        let payload = bs58::decode(text)
            .into_vec()
            .map_err(|e| CryptoError::InvalidAddress(format!("{}: {}", text, e)))?;

        if payload.len() != PAYLOAD_LENGTH {
            return Err(CryptoError::InvalidAddress(format!(
                "{}: expected {} bytes, got {}",
                text,
                PAYLOAD_LENGTH,
                payload.len()
            )));
        }

        let (versioned, actual_checksum) = payload.split_at(PAYLOAD_LENGTH - CHECKSUM_LENGTH);
        if checksum(versioned).as_slice() != actual_checksum {
            return Err(CryptoError::InvalidAddress(format!("{}: checksum mismatch", text)));
        }
        if versioned[0] != VERSION {
            return Err(CryptoError::InvalidAddress(format!(
                "{}: unknown version {:#04x}",
                text, versioned[0]
            )));
        }

        let mut public_key_hash = [0u8; 20];
        public_key_hash.copy_from_slice(&versioned[1..]);
        Ok(Self(public_key_hash))
    }
}

/// First four bytes of a double SHA-256
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let hash = double_sha256(payload);
    let mut sum = [0u8; CHECKSUM_LENGTH];
    sum.copy_from_slice(&hash[..CHECKSUM_LENGTH]);
    sum
}

pub fn validate_address(text: &str) -> bool {
    Address::decode(text).is_ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self> {
        Self::decode(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use proptest::prelude::*;

    #[test]
    fn test_address_from_keys() {
        let keys = KeyPair::generate();
        let address = Address::from_public_key(&keys.public_key_bytes());
        assert_eq!(address.public_key_hash(), keys.public_key_hash());

        let text = address.to_string();
        assert!(validate_address(&text));
        assert_eq!(text.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_zero_hash_address() {
        // Every leading zero byte (version + hash) becomes a '1'
        let address = Address::from_public_key_hash([0u8; 20]);
        assert!(address.encode().starts_with(&"1".repeat(21)));
        assert!(validate_address(&address.encode()));
    }

    #[test]
    fn test_rejects_malformed_address() {
        assert!(!validate_address(""));
        assert!(!validate_address("0OIl"));
        assert!(!validate_address("1111"));

        let mut wrong_version = vec![0x05u8];
        wrong_version.extend_from_slice(&[3u8; 20]);
        let sum = checksum(&wrong_version);
        wrong_version.extend_from_slice(&sum);
        let text = bs58::encode(wrong_version).into_string();
        assert!(matches!(Address::decode(&text), Err(CryptoError::InvalidAddress(_))));
    }

    proptest! {
        #[test]
        fn prop_single_byte_corruption_is_rejected(
            hash in proptest::array::uniform20(any::<u8>()),
            position in 0usize..PAYLOAD_LENGTH,
            flip in 1u8..=255,
        ) {
            let mut payload = bs58::decode(Address::from_public_key_hash(hash).encode())
                .into_vec()
                .unwrap();
            payload[position] ^= flip;
            let corrupted = bs58::encode(payload).into_string();
            prop_assert!(!validate_address(&corrupted));
        }
    }
}
