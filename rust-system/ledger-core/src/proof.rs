//! Proof-of-work search and validation
//!
//! A block is admitted when the SHA-256 of
//! `prev_hash || hash_transactions || be64(nonce) || be64(difficulty)`,
//! read as a big-endian 256-bit integer, is strictly below
//! `2^(256 - difficulty)`.

use crate::block::Block;
use crate::{Hash256, LedgerError, Result};
use ledger_crypto::sha256;
use tracing::trace;

/// Nonces tried between progress traces
const TRACE_INTERVAL: i64 = 1 << 16;

/// Big-endian `1 << (256 - difficulty)`
pub fn target_for(difficulty: u32) -> Result<Hash256> {
    if !(1..=255).contains(&difficulty) {
        return Err(LedgerError::InvalidConfig(format!(
            "difficulty must be between 1 and 255, got {}",
            difficulty
        )));
    }

    let bit = (256 - difficulty) as usize;
    let mut target = [0u8; 32];
    target[31 - bit / 8] = 1 << (bit % 8);
    Ok(target)
}

/// Whether `hash` is strictly below `target`, both read as big-endian integers
pub fn meets_target(hash: &[u8], target: &Hash256) -> bool {
    hash.len() == target.len() && hash < target.as_slice()
}

pub struct ProofOfWork<'a> {
    block: &'a Block,
    difficulty: u32,
    target: Hash256,
    nonce_limit: i64,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block, difficulty: u32) -> Result<Self> {
        Ok(Self {
            block,
            difficulty,
            target: target_for(difficulty)?,
            nonce_limit: i64::MAX,
        })
    }

    /// Stop the search before `limit` instead of `i64::MAX`
    pub fn with_nonce_limit(mut self, limit: i64) -> Self {
        self.nonce_limit = limit;
        self
    }

    pub fn target(&self) -> &Hash256 {
        &self.target
    }

    pub fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.block.prev_hash.len() + 32 + 16);
        data.extend_from_slice(&self.block.prev_hash);
        data.extend_from_slice(&self.block.hash_transactions());
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&i64::from(self.difficulty).to_be_bytes());
        data
    }

    /// Search nonces upward from zero for the first hash below target
    pub fn run(&self) -> Result<(i64, Hash256)> {
        let mut nonce = 0i64;
        while nonce < self.nonce_limit {
            let hash = sha256(&self.prepare_data(nonce));
            if meets_target(&hash, &self.target) {
                trace!("Found nonce {} -> {}", nonce, hex::encode(hash));
                return Ok((nonce, hash));
            }
            if nonce % TRACE_INTERVAL == 0 {
                trace!("Mining at nonce {} ({})", nonce, hex::encode(hash));
            }
            nonce += 1;
        }

        Err(LedgerError::NonceExhausted(self.nonce_limit))
    }

    /// Recompute the hash with the stored nonce. The block is valid when the
    /// result is below target and matches the stored hash.
    pub fn validate(&self) -> bool {
        let hash = sha256(&self.prepare_data(self.block.nonce));
        meets_target(&hash, &self.target) && hash.as_slice() == self.block.hash.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use proptest::prelude::*;

    fn leading_zero_bits(hash: &[u8]) -> u32 {
        let mut bits = 0;
        for byte in hash {
            if *byte == 0 {
                bits += 8;
            } else {
                return bits + byte.leading_zeros();
            }
        }
        bits
    }

    fn skeleton() -> Block {
        let coinbase = Transaction::coinbase(&[1u8; 20], "pow", 100).unwrap();
        Block {
            hash: Vec::new(),
            transactions: vec![coinbase],
            prev_hash: Vec::new(),
            nonce: 0,
        }
    }

    #[test]
    fn test_target_bytes() {
        let target = target_for(1).unwrap();
        assert_eq!(target[0], 0x80);
        assert!(target[1..].iter().all(|b| *b == 0));

        let target = target_for(18).unwrap();
        assert_eq!(&target[..3], &[0x00, 0x00, 0x40]);

        let target = target_for(255).unwrap();
        assert_eq!(target[31], 0x02);
    }

    #[test]
    fn test_invalid_difficulty() {
        assert!(matches!(target_for(0), Err(LedgerError::InvalidConfig(_))));
        assert!(matches!(target_for(256), Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn test_prepare_data_layout() {
        let block = skeleton();
        let pow = ProofOfWork::new(&block, 8).unwrap();
        let data = pow.prepare_data(0x0102);

        assert_eq!(data.len(), 32 + 16);
        assert_eq!(&data[..32], &block.hash_transactions());
        assert_eq!(&data[32..40], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(&data[40..], &[0, 0, 0, 0, 0, 0, 0, 8]);
    }

    #[test]
    fn test_run_and_validate() {
        let mut block = skeleton();
        let (nonce, hash) = ProofOfWork::new(&block, 8).unwrap().run().unwrap();
        assert!(leading_zero_bits(&hash) >= 8);

        block.nonce = nonce;
        block.hash = hash.to_vec();
        assert!(ProofOfWork::new(&block, 8).unwrap().validate());
    }

    #[test]
    fn test_tampered_nonce_fails_validation() {
        let mut block = skeleton();
        let (nonce, hash) = ProofOfWork::new(&block, 8).unwrap().run().unwrap();
        block.nonce = nonce + 1;
        block.hash = hash.to_vec();
        assert!(!ProofOfWork::new(&block, 8).unwrap().validate());
    }

    #[test]
    fn test_nonce_exhaustion() {
        let block = skeleton();
        let result = ProofOfWork::new(&block, 255).unwrap().with_nonce_limit(16).run();
        assert!(matches!(result, Err(LedgerError::NonceExhausted(16))));
    }

    proptest! {
        #[test]
        fn prop_target_matches_leading_zeros(
            hash in proptest::array::uniform32(any::<u8>()),
            difficulty in 1u32..=255,
        ) {
            let target = target_for(difficulty).unwrap();
            prop_assert_eq!(meets_target(&hash, &target), leading_zero_bits(&hash) >= difficulty);
        }
    }
}
