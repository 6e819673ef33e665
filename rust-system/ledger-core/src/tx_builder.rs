//! Spend construction

use crate::chain::Chain;
use crate::store::KvStore;
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::UtxoView;
use crate::wallet::Wallet;
use crate::{Amount, LedgerError, Result};
use tracing::debug;

/// Build and sign a transaction moving `amount` from `from` to `to`.
///
/// Inputs are chosen greedily from the sender's unspent outputs and any
/// surplus is returned to the sender as a change output.
pub fn build_spend<S: KvStore>(chain: &Chain<S>, from: &Wallet, to: &[u8], amount: Amount) -> Result<Transaction> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount("amount must be greater than zero".to_string()));
    }

    let sender = from.public_key_hash();
    let selection = chain.utxo().select_spendable_outputs(&sender, amount)?;
    if !selection.is_sufficient() {
        return Err(LedgerError::InsufficientFunds {
            needed: amount,
            available: selection.accumulated,
        });
    }

    let public_key = from.public_key();
    let inputs = selection
        .outpoints
        .iter()
        .map(|outpoint| TxInput::new(outpoint.txid.clone(), outpoint.index, public_key.clone()))
        .collect();

    let mut outputs = vec![TxOutput::new(amount, to)];
    if selection.accumulated > amount {
        outputs.push(TxOutput::new(selection.accumulated - amount, &sender));
    }

    let mut tx = Transaction::new(inputs, outputs)?;
    chain.sign_transaction(&mut tx, from.keys())?;

    debug!(
        "Built spend {} of {} from {} inputs",
        hex::encode(&tx.id),
        amount,
        tx.inputs.len()
    );
    Ok(tx)
}
