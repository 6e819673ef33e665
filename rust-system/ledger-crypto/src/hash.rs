//! Hash functions

use crate::{Hash160, Hash256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Hash data with SHA256
pub fn sha256(data: &[u8]) -> Hash256 {
    Sha256::digest(data).into()
}

/// Hash data twice with SHA256 (Bitcoin-style)
pub fn double_sha256(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}

/// RIPEMD-160 over SHA-256, used to lock outputs to a public key
pub fn hash160(data: &[u8]) -> Hash160 {
    Ripemd160::digest(sha256(data)).into()
}
