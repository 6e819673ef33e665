use crate::proof::ProofOfWork;
use crate::transaction::Transaction;
use crate::{Hash256, Result};
use ledger_crypto::sha256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A mined block, linked backward to its predecessor by hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Vec<u8>,
    pub transactions: Vec<Transaction>,
    /// Empty only for genesis
    pub prev_hash: Vec<u8>,
    pub nonce: i64,
}

impl Block {
    /// Assemble a block on top of `prev_hash` and mine it
    pub fn create(transactions: Vec<Transaction>, prev_hash: Vec<u8>, difficulty: u32) -> Result<Self> {
        let mut block = Self {
            hash: Vec::new(),
            transactions,
            prev_hash,
            nonce: 0,
        };

        let (nonce, hash) = ProofOfWork::new(&block, difficulty)?.run()?;
        block.nonce = nonce;
        block.hash = hash.to_vec();
        Ok(block)
    }

    pub fn genesis(coinbase: Transaction, difficulty: u32) -> Result<Self> {
        Self::create(vec![coinbase], Vec::new(), difficulty)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// SHA-256 over the concatenated transaction ids in block order
    pub fn hash_transactions(&self) -> Hash256 {
        let ids: Vec<u8> = self
            .transactions
            .iter()
            .flat_map(|tx| tx.id.iter().copied())
            .collect();
        sha256(&ids)
    }

    pub fn validate_pow(&self, difficulty: u32) -> Result<bool> {
        Ok(ProofOfWork::new(self, difficulty)?.validate())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hash:       {}", hex::encode(&self.hash))?;
        writeln!(f, "Prev. hash: {}", hex::encode(&self.prev_hash))?;
        writeln!(f, "Nonce:      {}", self.nonce)?;
        for tx in &self.transactions {
            write!(f, "{}", tx)?;
        }
        Ok(())
    }
}
