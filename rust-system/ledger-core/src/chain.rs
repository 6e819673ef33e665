//! Chain handle
//!
//! Blocks live in the store under their own hash and the tip hash under
//! [`TIP_KEY`]. A block and the tip pointer that names it are always written
//! in the same update. The difficulty the chain was mined at is recorded
//! next to the genesis tip under [`DIFFICULTY_KEY`].

use crate::block::Block;
use crate::config::ChainConfig;
use crate::store::KvStore;
use crate::transaction::{Transaction, TxResolver};
use crate::utxo::ChainUtxoView;
use crate::{Amount, LedgerError, OutPoint, Result};
use ledger_crypto::KeyPair;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Sentinel key holding the hash of the newest block
pub const TIP_KEY: &[u8] = b"lh";

/// Key holding the big-endian `u32` difficulty every block is mined at
pub const DIFFICULTY_KEY: &[u8] = b"difficulty";

/// Outcome of a full chain audit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainAudit {
    pub blocks: usize,
    pub transactions: usize,
    /// First problem found, if any
    pub failure: Option<String>,
}

impl ChainAudit {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Chain<S: KvStore> {
    store: S,
    tip: Vec<u8>,
    config: ChainConfig,
}

impl<S: KvStore> Chain<S> {
    /// Create a new chain whose genesis coinbase pays `genesis_to`
    pub fn init(store: S, config: ChainConfig, genesis_to: &[u8]) -> Result<Self> {
        config.validate()?;
        if store.view(|view| view.get(TIP_KEY))?.is_some() {
            return Err(LedgerError::ChainExists);
        }

        let coinbase = Transaction::coinbase(genesis_to, &config.genesis_memo, config.block_reward)?;
        let genesis = Block::genesis(coinbase, config.difficulty)?;
        let encoded = genesis.serialize()?;

        store.update(|view, batch| {
            if view.get(TIP_KEY)?.is_some() {
                return Err(LedgerError::ChainExists);
            }
            batch.set(&genesis.hash, encoded);
            batch.set(TIP_KEY, genesis.hash.clone());
            batch.set(DIFFICULTY_KEY, config.difficulty.to_be_bytes().to_vec());
            Ok(())
        })?;

        info!("🌱 Genesis block {} created", hex::encode(&genesis.hash));
        Ok(Self {
            store,
            tip: genesis.hash,
            config,
        })
    }

    /// Open an existing chain.
    ///
    /// `config.difficulty` must match the difficulty the chain was created
    /// with, otherwise every stored block would fail its proof-of-work check.
    pub fn open(store: S, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let (tip, difficulty) = store.view(|view| Ok((view.get(TIP_KEY)?, view.get(DIFFICULTY_KEY)?)))?;
        let tip = tip.ok_or(LedgerError::ChainNotFound)?;

        let stored: [u8; 4] = difficulty
            .as_deref()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| LedgerError::CorruptChain("difficulty record is missing or malformed".to_string()))?;
        let stored = u32::from_be_bytes(stored);
        if stored != config.difficulty {
            return Err(LedgerError::InvalidConfig(format!(
                "chain was mined at difficulty {}, configuration asks for {}",
                stored, config.difficulty
            )));
        }

        debug!("Opened chain at tip {}", hex::encode(&tip));
        Ok(Self { store, tip, config })
    }

    pub fn tip(&self) -> &[u8] {
        &self.tip
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        let encoded = self.store.view(|view| view.get(hash))?;
        encoded.map(|bytes| Block::deserialize(&bytes)).transpose()
    }

    /// Mine `transactions` on top of the stored tip and append the block.
    ///
    /// Transactions are not verified here.
    pub fn add_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let tip = self
            .store
            .view(|view| view.get(TIP_KEY))?
            .ok_or(LedgerError::ChainNotFound)?;

        let block = Block::create(transactions, tip, self.config.difficulty)?;
        let encoded = block.serialize()?;

        self.store.update(|view, batch| {
            let current = view.get(TIP_KEY)?.unwrap_or_default();
            if current != block.prev_hash {
                return Err(LedgerError::TipMoved {
                    expected: hex::encode(&block.prev_hash),
                    found: hex::encode(&current),
                });
            }
            batch.set(&block.hash, encoded);
            batch.set(TIP_KEY, block.hash.clone());
            Ok(())
        })?;

        self.tip = block.hash.clone();
        info!(
            "⛓️ Block {} added with {} transactions",
            hex::encode(&block.hash),
            block.transactions.len()
        );
        Ok(block)
    }

    /// Blocks from the tip back to genesis
    pub fn iter(&self) -> ChainIter<'_, S> {
        ChainIter {
            store: &self.store,
            next_hash: Some(self.tip.clone()),
        }
    }

    pub fn utxo(&self) -> ChainUtxoView<'_, S> {
        ChainUtxoView::new(self)
    }

    pub fn find_transaction(&self, id: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iter() {
            let block = block?;
            if let Some(tx) = block.transactions.into_iter().find(|tx| tx.id == id) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, keys: &KeyPair) -> Result<()> {
        tx.sign(keys, self)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        tx.verify(self)
    }

    /// Full admission check for a transaction about to be mined: signatures,
    /// value conservation, and no outpoint spent twice or already spent on
    /// the chain.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<bool> {
        let spent = self.spent_outpoints()?;
        match check_transaction(tx, &spent, self)? {
            Some(problem) => {
                warn!("Transaction {} rejected: {}", hex::encode(&tx.id), problem);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Every outpoint consumed by a stored transaction
    fn spent_outpoints(&self) -> Result<HashSet<OutPoint>> {
        let mut spent = HashSet::new();
        for block in self.iter() {
            for tx in block?.transactions {
                if !tx.is_coinbase() {
                    spent.extend(tx.inputs.into_iter().map(|input| OutPoint::new(input.txid, input.out)));
                }
            }
        }
        Ok(spent)
    }

    /// Check proof-of-work and hash links from tip to genesis, then replay
    /// every transaction from genesis forward.
    ///
    /// A transaction may only spend outputs of transactions before it, may
    /// not create more value than it consumes, and no outpoint may be spent
    /// twice anywhere on the chain.
    pub fn verify_chain(&self) -> Result<ChainAudit> {
        let mut audit = ChainAudit::default();
        let mut expected_hash = self.tip.clone();
        let mut blocks = Vec::new();

        for block in self.iter() {
            let block = block?;
            audit.blocks += 1;

            if block.hash != expected_hash {
                audit.failure = Some(format!(
                    "block stored under {} claims hash {}",
                    hex::encode(&expected_hash),
                    hex::encode(&block.hash)
                ));
                break;
            }
            if !block.validate_pow(self.config.difficulty)? {
                audit.failure = Some(format!("block {} fails proof-of-work", hex::encode(&block.hash)));
                break;
            }
            expected_hash = block.prev_hash.clone();
            blocks.push(block);
        }

        if audit.failure.is_none() {
            audit.failure = replay_transactions(blocks, &mut audit.transactions)?;
        }

        if let Some(failure) = &audit.failure {
            warn!("Chain audit failed: {}", failure);
        }
        Ok(audit)
    }
}

/// Replay `blocks` (tip first) from genesis forward, returning the first
/// problem found
fn replay_transactions(blocks: Vec<Block>, checked: &mut usize) -> Result<Option<String>> {
    let mut earlier: HashMap<Vec<u8>, Transaction> = HashMap::new();
    let mut spent = HashSet::new();

    for block in blocks.into_iter().rev() {
        for tx in block.transactions {
            *checked += 1;
            if let Some(problem) = check_transaction(&tx, &spent, &earlier)? {
                return Ok(Some(format!(
                    "transaction {} in block {}: {}",
                    hex::encode(&tx.id),
                    hex::encode(&block.hash),
                    problem
                )));
            }
            if !tx.is_coinbase() {
                spent.extend(tx.inputs.iter().map(|input| OutPoint::new(input.txid.clone(), input.out)));
            }
            earlier.insert(tx.id.clone(), tx);
        }
    }
    Ok(None)
}

/// Describe why `tx` may not be admitted on top of `spent`, resolving the
/// outputs it consumes through `resolver`
fn check_transaction<R: TxResolver + ?Sized>(
    tx: &Transaction,
    spent: &HashSet<OutPoint>,
    resolver: &R,
) -> Result<Option<String>> {
    if tx.is_coinbase() {
        return Ok(None);
    }

    let mut consumed = HashSet::new();
    let mut input_total: Amount = 0;
    for input in &tx.inputs {
        let outpoint = OutPoint::new(input.txid.clone(), input.out);
        if spent.contains(&outpoint) {
            return Ok(Some(format!("output {} is already spent", outpoint)));
        }
        let value = match usize::try_from(input.out) {
            Ok(index) => resolver
                .resolve(&input.txid)?
                .and_then(|previous| previous.outputs.get(index).map(|output| output.value)),
            Err(_) => None,
        };
        let Some(value) = value else {
            return Ok(Some(format!("output {} does not exist", outpoint)));
        };
        if !consumed.insert(outpoint.clone()) {
            return Ok(Some(format!("output {} is spent twice", outpoint)));
        }
        let Some(total) = input_total.checked_add(value) else {
            return Ok(Some("input values overflow".to_string()));
        };
        input_total = total;
    }

    let output_total = tx
        .outputs
        .iter()
        .try_fold(0, |total: Amount, output| total.checked_add(output.value));
    let Some(output_total) = output_total else {
        return Ok(Some("output values overflow".to_string()));
    };
    if output_total > input_total {
        return Ok(Some(format!(
            "outputs total {} but inputs only {}",
            output_total, input_total
        )));
    }

    if !tx.verify(resolver)? {
        return Ok(Some("signature verification failed".to_string()));
    }
    Ok(None)
}

impl<S: KvStore> TxResolver for Chain<S> {
    fn resolve(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        self.find_transaction(txid)
    }
}

/// Backward iterator over stored blocks, one store view per block
pub struct ChainIter<'a, S: KvStore> {
    store: &'a S,
    next_hash: Option<Vec<u8>>,
}

impl<S: KvStore> Iterator for ChainIter<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash.take()?;

        let block = self.store.view(|view| match view.get(&hash)? {
            Some(bytes) => Block::deserialize(&bytes),
            None => Err(LedgerError::CorruptChain(format!(
                "block {} is missing",
                hex::encode(&hash)
            ))),
        });

        if let Ok(block) = &block {
            if !block.is_genesis() {
                self.next_hash = Some(block.prev_hash.clone());
            }
        }
        Some(block)
    }
}
