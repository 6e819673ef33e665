//! Single-node proof-of-work ledger
//!
//! Blocks are mined by brute force, linked backward by hash and kept in a
//! key-value store. Value moves between public-key hashes through signed
//! transactions, and spendable balance is rebuilt by replaying the chain.

use serde::{Deserialize, Serialize};

/// 256-bit hash type used throughout the ledger
pub type Hash256 = [u8; 32];

/// Amount type
pub type Amount = u64;

pub use ledger_crypto::{Address, Hash160, KeyPair};

/// Reference to one output of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Vec<u8>,
    pub index: i64,
}

impl OutPoint {
    pub fn new(txid: Vec<u8>, index: i64) -> Self {
        Self { txid, index }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", hex::encode(&self.txid), self.index)
    }
}

/// Error types for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] ledger_crypto::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Previous transaction does not exist: {0}")]
    MissingPredecessor(String),

    #[error("Nonce space exhausted after {0} attempts")]
    NonceExhausted(i64),

    #[error("Corrupt chain: {0}")]
    CorruptChain(String),

    #[error("Chain tip moved while mining: expected {expected}, found {found}")]
    TipMoved { expected: String, found: String },

    #[error("Insufficient funds: need {needed}, only have {available} available")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("Blockchain already exists")]
    ChainExists,

    #[error("No existing blockchain found")]
    ChainNotFound,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LedgerError {
    /// Fatal errors abort the current operation; the rest are outcomes the
    /// caller is expected to branch on.
    pub fn is_fatal(&self) -> bool {
        match self {
            LedgerError::Storage(_)
            | LedgerError::Serialization(_)
            | LedgerError::Crypto(_)
            | LedgerError::Io(_)
            | LedgerError::MissingPredecessor(_)
            | LedgerError::NonceExhausted(_)
            | LedgerError::CorruptChain(_)
            | LedgerError::TipMoved { .. } => true,
            LedgerError::InsufficientFunds { .. }
            | LedgerError::ChainExists
            | LedgerError::ChainNotFound
            | LedgerError::InvalidAddress(_)
            | LedgerError::InvalidAmount(_)
            | LedgerError::WalletNotFound(_)
            | LedgerError::InvalidConfig(_) => false,
        }
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

pub mod config;
pub mod transaction;
pub mod proof;
pub mod block;
pub mod store;
pub mod chain;
pub mod utxo;
pub mod tx_builder;
pub mod wallet;

pub use block::Block;
pub use chain::Chain;
pub use config::ChainConfig;
pub use store::{KvStore, MemoryStore, RedbStore};
pub use transaction::{Transaction, TxInput, TxOutput, TxResolver};
pub use utxo::{ChainUtxoView, SpendableOutputs, UnspentOutput, UtxoView};
pub use wallet::{Wallet, Wallets};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(LedgerError::Storage("disk".into()).is_fatal());
        assert!(LedgerError::MissingPredecessor("00".into()).is_fatal());
        assert!(LedgerError::NonceExhausted(10).is_fatal());
        assert!(!LedgerError::InsufficientFunds { needed: 50, available: 10 }.is_fatal());
        assert!(!LedgerError::ChainNotFound.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let error = LedgerError::InsufficientFunds { needed: 50, available: 10 };
        assert_eq!(error.to_string(), "Insufficient funds: need 50, only have 10 available");
    }

    #[test]
    fn test_outpoint_display() {
        let outpoint = OutPoint::new(vec![0xab, 0xcd], 1);
        assert_eq!(outpoint.to_string(), "abcd:1");
    }
}
