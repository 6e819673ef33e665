//! Wallet keystore
//!
//! Key pairs are kept in a JSON file mapping each address to its hex-encoded
//! secret key. The file holds unencrypted secrets.

use crate::{LedgerError, Result};
use ledger_crypto::{Address, Hash160, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A single key pair and the address derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    keys: KeyPair,
}

impl Wallet {
    pub fn generate() -> Self {
        Self {
            keys: KeyPair::generate(),
        }
    }

    pub fn from_keys(keys: KeyPair) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Raw `X || Y` public key
    pub fn public_key(&self) -> Vec<u8> {
        self.keys.public_key_bytes()
    }

    pub fn public_key_hash(&self) -> Hash160 {
        self.keys.public_key_hash()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key_hash(self.public_key_hash())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WalletRecord {
    secret_key: String,
}

/// Every wallet known to this node, backed by one file
#[derive(Debug)]
pub struct Wallets {
    path: PathBuf,
    wallets: BTreeMap<Address, Wallet>,
}

impl Wallets {
    /// Load the wallet file, starting empty if it does not exist yet
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut wallets = BTreeMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            // Keys go through Address's checked string form
            let records: BTreeMap<Address, WalletRecord> = serde_json::from_str(&content)?;

            for (address, record) in records {
                let wallet = Wallet::from_keys(KeyPair::from_secret_hex(&record.secret_key)?);
                if wallet.address() != address {
                    return Err(LedgerError::Serialization(format!(
                        "wallet file {} lists {} under the wrong key",
                        path.display(),
                        address
                    )));
                }
                wallets.insert(wallet.address(), wallet);
            }
            debug!("Loaded {} wallets from {}", wallets.len(), path.display());
        }

        Ok(Self { path, wallets })
    }

    /// Generate a new wallet and return its address. Call [`Wallets::save`]
    /// to persist it.
    pub fn create_wallet(&mut self) -> Address {
        let wallet = Wallet::generate();
        let address = wallet.address();
        self.wallets.insert(address, wallet);
        info!("🔑 Created wallet {}", address);
        address
    }

    pub fn get(&self, address: &Address) -> Result<&Wallet> {
        self.wallets
            .get(address)
            .ok_or_else(|| LedgerError::WalletNotFound(address.to_string()))
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.wallets.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Write every wallet back to the file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records: BTreeMap<Address, WalletRecord> = self
            .wallets
            .iter()
            .map(|(address, wallet)| {
                let record = WalletRecord {
                    secret_key: wallet.keys.secret_hex(),
                };
                (*address, record)
            })
            .collect();

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
