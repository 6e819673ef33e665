//! Chain parameters

use crate::{Amount, LedgerError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DIFFICULTY: u32 = 18;
pub const DEFAULT_BLOCK_REWARD: Amount = 100;
pub const DEFAULT_GENESIS_MEMO: &str = "FIRST TRANSACTION FROM GENESIS.";

/// Parameters shared by every block of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Number of leading zero bits a block hash must have
    pub difficulty: u32,
    /// Value minted by a coinbase transaction
    pub block_reward: Amount,
    /// Memo carried by the genesis coinbase
    pub genesis_memo: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            block_reward: DEFAULT_BLOCK_REWARD,
            genesis_memo: DEFAULT_GENESIS_MEMO.to_string(),
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=255).contains(&self.difficulty) {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be between 1 and 255, got {}",
                self.difficulty
            )));
        }
        if self.block_reward == 0 {
            return Err(LedgerError::InvalidConfig("block reward must be non-zero".to_string()));
        }
        Ok(())
    }
}
