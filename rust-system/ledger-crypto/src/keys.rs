//! ECDSA P-256 key pairs and the raw encodings carried on transaction inputs
//!
//! Public keys travel as the bare uncompressed point `X || Y` (64 bytes) and
//! signatures as `r || s` with each scalar left-padded to 32 bytes. Both are
//! split in half on verification, so shorter minimal encodings of equal
//! length are accepted as well.

use crate::hash::hash160;
use crate::utils::left_pad;
use crate::{CryptoError, Hash160, Result};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Length of a raw `X || Y` public key
pub const PUBLIC_KEY_LENGTH: usize = 64;

/// Length of a raw `r || s` signature
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of the digests that get signed
pub const DIGEST_LENGTH: usize = 32;

/// An ECDSA signing key together with its public point
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a random key pair
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Rebuild a key pair from its 32-byte secret scalar
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let signing = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing })
    }

    pub fn from_secret_hex(hex_str: &str) -> Result<Self> {
        let bytes = crate::utils::hex_to_bytes(hex_str)?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&self.signing.to_bytes());
        secret
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_bytes())
    }

    /// Uncompressed public point without the SEC1 prefix byte
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let point = self.signing.verifying_key().to_encoded_point(false);
        point.as_bytes()[1..].to_vec()
    }

    pub fn public_key_hash(&self) -> Hash160 {
        hash160(&self.public_key_bytes())
    }

    /// Sign a 32-byte digest, returning `r || s`
    pub fn sign(&self, digest: &[u8]) -> Result<Vec<u8>> {
        if digest.len() != DIGEST_LENGTH {
            return Err(CryptoError::EncodingError(format!(
                "Invalid message digest: expected {} bytes, got {}",
                DIGEST_LENGTH,
                digest.len()
            )));
        }
        let signature: Signature = self
            .signing
            .sign_prehash(digest)
            .map_err(|e| CryptoError::SignatureError(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.secret_bytes() == other.secret_bytes()
    }
}

impl Eq for KeyPair {}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verify a raw `r || s` signature over `digest` against a raw `X || Y` key.
///
/// Malformed keys or signatures simply fail verification.
pub fn verify(public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool {
    if digest.len() != DIGEST_LENGTH {
        return false;
    }

    let (r, s) = signature.split_at(signature.len() / 2);
    let (x, y) = public_key.split_at(public_key.len() / 2);

    let (Some(r), Some(s), Some(x), Some(y)) = (
        left_pad::<32>(r),
        left_pad::<32>(s),
        left_pad::<32>(x),
        left_pad::<32>(y),
    ) else {
        return false;
    };

    let mut compact = [0u8; SIGNATURE_LENGTH];
    compact[..32].copy_from_slice(&r);
    compact[32..].copy_from_slice(&s);

    let mut point = [0u8; PUBLIC_KEY_LENGTH + 1];
    point[0] = 0x04;
    point[1..33].copy_from_slice(&x);
    point[33..].copy_from_slice(&y);

    let (Ok(signature), Ok(public_key)) = (
        Signature::from_slice(&compact),
        VerifyingKey::from_sec1_bytes(&point),
    ) else {
        return false;
    };

    public_key.verify_prehash(digest, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_key_encoding_lengths() {
        let keys = KeyPair::generate();
        assert_eq!(keys.public_key_bytes().len(), PUBLIC_KEY_LENGTH);
        assert_eq!(keys.public_key_hash().len(), 20);

        let signature = keys.sign(&sha256(b"payload")).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LENGTH);
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyPair::generate();
        let digest = sha256(b"Hello, blockchain!");

        let signature = keys.sign(&digest).unwrap();
        assert!(verify(&keys.public_key_bytes(), &digest, &signature));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let digest = sha256(b"Test message");

        let signature = signer.sign(&digest).unwrap();
        assert!(!verify(&other.public_key_bytes(), &digest, &signature));
    }

    #[test]
    fn test_verify_rejects_other_digest() {
        let keys = KeyPair::generate();
        let signature = keys.sign(&sha256(b"one")).unwrap();
        assert!(!verify(&keys.public_key_bytes(), &sha256(b"two"), &signature));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let keys = KeyPair::generate();
        let digest = sha256(b"data");
        let signature = keys.sign(&digest).unwrap();

        assert!(!verify(&keys.public_key_bytes(), &digest, &[]));
        assert!(!verify(&[], &digest, &signature));
        assert!(!verify(&keys.public_key_bytes(), &digest[..16], &signature));
        assert!(keys.sign(&digest[..16]).is_err());
    }

    #[test]
    fn test_secret_roundtrip() {
        let keys = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&keys.secret_hex()).unwrap();
        assert_eq!(keys, restored);
        assert_eq!(keys.public_key_bytes(), restored.public_key_bytes());
        assert!(KeyPair::from_secret_bytes(&[0u8; 32]).is_err());
        assert!(KeyPair::from_secret_bytes(&[1u8; 16]).is_err());
    }

    #[test]
    fn test_known_p256_public_key() {
        // Secret scalar 1 maps to the P-256 base point
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let keys = KeyPair::from_secret_bytes(&secret).unwrap();
        assert_eq!(
            hex::encode(keys.public_key_bytes()),
            "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296\
             4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"
        );
    }

    #[test]
    fn test_minimal_length_halves_verify() {
        // A signature whose scalars were written without padding still splits
        // correctly as long as both halves have the same length.
        let keys = KeyPair::generate();
        let digest = sha256(b"padding");
        let signature = keys.sign(&digest).unwrap();

        let (r, s) = signature.split_at(32);
        if r[0] == 0 && s[0] == 0 {
            let mut stripped = r[1..].to_vec();
            stripped.extend_from_slice(&s[1..]);
            assert!(verify(&keys.public_key_bytes(), &digest, &stripped));
        } else {
            assert!(verify(&keys.public_key_bytes(), &digest, &signature));
        }
    }
}
