//! Node configuration
//!
//! Values come from an optional TOML file, then `LEDGER__*` environment
//! variables (`LEDGER__CHAIN__DIFFICULTY=12`), then command-line flags.

use anyhow::{Context, Result};
use ledger_core::ChainConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the chain database inside the data directory
pub const STORE_FILE: &str = "chain.redb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the chain database
    pub data_dir: PathBuf,
    /// Wallet file, relative to `data_dir` unless absolute
    pub wallet_file: PathBuf,
    pub chain: ChainConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ledger-data"),
            wallet_file: PathBuf::from("wallets.json"),
            chain: ChainConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(::config::Environment::with_prefix("LEDGER").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let node_config: NodeConfig = settings
            .try_deserialize()
            .context("Invalid configuration values")?;
        node_config.chain.validate()?;
        Ok(node_config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join(&self.wallet_file)
    }
}
