//! Unspent output queries
//!
//! There is no persistent UTXO index. [`ChainUtxoView`] answers every query
//! by replaying the chain from the tip back to genesis, which costs a full
//! chain read per call.

use crate::chain::Chain;
use crate::store::KvStore;
use crate::transaction::TxOutput;
use crate::{Amount, LedgerError, OutPoint, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One unspent output and where to find it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// Outputs picked to fund a spend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    pub accumulated: Amount,
    pub outpoints: Vec<OutPoint>,
    /// Amount the selection was made for
    pub requested: Amount,
}

impl SpendableOutputs {
    pub fn is_sufficient(&self) -> bool {
        self.accumulated >= self.requested
    }
}

pub trait UtxoView {
    /// Every unspent output locked to `pub_key_hash`, in replay order
    fn find_unspent_outputs(&self, pub_key_hash: &[u8]) -> Result<Vec<UnspentOutput>>;

    /// Total value of the unspent outputs; a total past `u64::MAX` means
    /// the stored chain minted more than can exist.
    fn balance(&self, pub_key_hash: &[u8]) -> Result<Amount> {
        self.find_unspent_outputs(pub_key_hash)?
            .iter()
            .try_fold(0, |total: Amount, utxo| add_value(total, utxo.output.value))
    }

    /// Greedily pick outputs in replay order until `amount` is covered.
    ///
    /// Falling short is not an error; check [`SpendableOutputs::is_sufficient`].
    fn select_spendable_outputs(&self, pub_key_hash: &[u8], amount: Amount) -> Result<SpendableOutputs> {
        let mut selection = SpendableOutputs {
            requested: amount,
            ..SpendableOutputs::default()
        };

        for utxo in self.find_unspent_outputs(pub_key_hash)? {
            if selection.accumulated >= amount {
                break;
            }
            selection.accumulated = add_value(selection.accumulated, utxo.output.value)?;
            selection.outpoints.push(utxo.outpoint);
        }

        debug!(
            "Selected {} outputs worth {} for {}",
            selection.outpoints.len(),
            selection.accumulated,
            amount
        );
        Ok(selection)
    }
}

fn add_value(total: Amount, value: Amount) -> Result<Amount> {
    total
        .checked_add(value)
        .ok_or_else(|| LedgerError::CorruptChain(format!("output values overflow at {} + {}", total, value)))
}

/// Full-replay view over a chain
pub struct ChainUtxoView<'a, S: KvStore> {
    chain: &'a Chain<S>,
}

impl<'a, S: KvStore> ChainUtxoView<'a, S> {
    pub fn new(chain: &'a Chain<S>) -> Self {
        Self { chain }
    }
}

impl<S: KvStore> UtxoView for ChainUtxoView<'_, S> {
    fn find_unspent_outputs(&self, pub_key_hash: &[u8]) -> Result<Vec<UnspentOutput>> {
        let mut spent: HashMap<Vec<u8>, HashSet<i64>> = HashMap::new();
        let mut unspent = Vec::new();

        for block in self.chain.iter() {
            let block = block?;
            for tx in &block.transactions {
                // Inputs first: a later spend is replayed before the output it consumes
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent.entry(input.txid.clone()).or_default().insert(input.out);
                    }
                }

                let spent_here = spent.get(&tx.id);
                for (index, output) in tx.outputs.iter().enumerate() {
                    let index = index as i64;
                    if spent_here.is_some_and(|indices| indices.contains(&index)) {
                        continue;
                    }
                    if output.is_locked_with_key(pub_key_hash) {
                        unspent.push(UnspentOutput {
                            outpoint: OutPoint::new(tx.id.clone(), index),
                            output: output.clone(),
                        });
                    }
                }
            }
        }

        Ok(unspent)
    }
}
