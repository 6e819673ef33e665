use crate::{Amount, Hash256, LedgerError, Result};
use ledger_crypto::{hash160, keys, sha256, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Output index carried by the single input of a coinbase transaction
pub const COINBASE_OUT: i64 = -1;

/// Transaction input spending one earlier output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction holding the spent output
    pub txid: Vec<u8>,
    /// Index of the spent output, `-1` for coinbase
    pub out: i64,
    /// `r || s`, or the memo bytes on a coinbase input
    pub signature: Vec<u8>,
    /// Raw `X || Y` public key of the spender
    pub pub_key: Vec<u8>,
}

impl TxInput {
    /// Unsigned input spending `txid:out` with the given public key attached
    pub fn new(txid: Vec<u8>, out: i64, pub_key: Vec<u8>) -> Self {
        Self {
            txid,
            out,
            signature: Vec::new(),
            pub_key,
        }
    }

    /// Whether the attached public key hashes to `pub_key_hash`
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash160(&self.pub_key).as_slice() == pub_key_hash
    }
}

/// Transaction output locked to a public-key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Amount,
    pub pub_key_hash: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: Amount, pub_key_hash: &[u8]) -> Self {
        Self {
            value,
            pub_key_hash: pub_key_hash.to_vec(),
        }
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

/// Lookup of earlier transactions by id
pub trait TxResolver {
    fn resolve(&self, txid: &[u8]) -> Result<Option<Transaction>>;
}

impl TxResolver for HashMap<Vec<u8>, Transaction> {
    fn resolve(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        Ok(self.get(txid).cloned())
    }
}

/// A value transfer between public-key hashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Assemble a transaction and compute its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Self {
            id: Vec::new(),
            inputs,
            outputs,
        };
        tx.id = tx.hash()?.to_vec();
        Ok(tx)
    }

    /// Mint `reward` to `to`. An empty memo is replaced with a generated one.
    pub fn coinbase(to: &[u8], memo: &str, reward: Amount) -> Result<Self> {
        let memo = if memo.is_empty() {
            format!("COINS TO {}", hex::encode(to))
        } else {
            memo.to_string()
        };

        let input = TxInput {
            txid: Vec::new(),
            out: COINBASE_OUT,
            signature: memo.into_bytes(),
            pub_key: Vec::new(),
        };
        Self::new(vec![input], vec![TxOutput::new(reward, to)])
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].txid.is_empty() && self.inputs[0].out == COINBASE_OUT
    }

    /// SHA-256 of the serialized transaction with its id cleared
    pub fn hash(&self) -> Result<Hash256> {
        let mut copy = self.clone();
        copy.id.clear();
        let encoded = bincode::serialize(&copy)?;
        Ok(sha256(&encoded))
    }

    /// Copy with every input's signature and public key stripped
    pub fn trimmed_copy(&self) -> Self {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput::new(input.txid.clone(), input.out, Vec::new()))
            .collect();

        Self {
            id: self.id.clone(),
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Sign every input with `keys`.
    ///
    /// All predecessors are resolved before anything is signed, so a missing
    /// one leaves the transaction untouched.
    pub fn sign<R: TxResolver + ?Sized>(&mut self, keys: &KeyPair, resolver: &R) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let mut locks = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let lock = Self::previous_lock(input, resolver)?.ok_or_else(|| {
                LedgerError::MissingPredecessor(format!("{}:{}", hex::encode(&input.txid), input.out))
            })?;
            locks.push(lock);
        }

        let mut copy = self.trimmed_copy();
        for (index, lock) in locks.into_iter().enumerate() {
            let digest = Self::input_digest(&mut copy, index, lock)?;
            self.inputs[index].signature = keys.sign(&digest)?;
        }

        debug!("Signed {} inputs of {}", self.inputs.len(), hex::encode(&self.id));
        Ok(())
    }

    /// Check every input's signature against the output it spends.
    ///
    /// Unknown predecessors make the transaction invalid rather than
    /// failing the call.
    pub fn verify<R: TxResolver + ?Sized>(&self, resolver: &R) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let mut locks = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            match Self::previous_lock(input, resolver)? {
                Some(lock) => locks.push(lock),
                None => {
                    warn!(
                        "Transaction {} spends unknown output {}:{}",
                        hex::encode(&self.id),
                        hex::encode(&input.txid),
                        input.out
                    );
                    return Ok(false);
                }
            }
        }

        let mut copy = self.trimmed_copy();
        for (index, lock) in locks.into_iter().enumerate() {
            let input = &self.inputs[index];
            if !input.uses_key(&lock) {
                warn!("Input {} of {} carries a key that does not own the output", index, hex::encode(&self.id));
                return Ok(false);
            }

            let digest = Self::input_digest(&mut copy, index, lock)?;
            if !keys::verify(&input.pub_key, &digest, &input.signature) {
                warn!("Input {} of {} has an invalid signature", index, hex::encode(&self.id));
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Locking hash of the output an input spends, if it exists
    fn previous_lock<R: TxResolver + ?Sized>(input: &TxInput, resolver: &R) -> Result<Option<Vec<u8>>> {
        if input.out < 0 {
            return Ok(None);
        }
        let Some(previous) = resolver.resolve(&input.txid)? else {
            return Ok(None);
        };
        Ok(previous
            .outputs
            .get(input.out as usize)
            .map(|output| output.pub_key_hash.clone()))
    }

    /// Digest signed for input `index`: the trimmed copy's id with that
    /// input's public key slot holding the spent output's locking hash.
    fn input_digest(copy: &mut Transaction, index: usize, lock: Vec<u8>) -> Result<Hash256> {
        copy.inputs[index].signature.clear();
        copy.inputs[index].pub_key = lock;
        let digest = copy.hash()?;
        copy.id = digest.to_vec();
        copy.inputs[index].pub_key.clear();
        Ok(digest)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Transaction {}", hex::encode(&self.id))?;
        for (index, input) in self.inputs.iter().enumerate() {
            writeln!(f, "    Input {}:", index)?;
            writeln!(f, "      TXID:      {}", hex::encode(&input.txid))?;
            writeln!(f, "      Out:       {}", input.out)?;
            writeln!(f, "      Signature: {}", hex::encode(&input.signature))?;
            writeln!(f, "      PubKey:    {}", hex::encode(&input.pub_key))?;
        }
        for (index, output) in self.outputs.iter().enumerate() {
            writeln!(f, "    Output {}:", index)?;
            writeln!(f, "      Value:     {}", output.value)?;
            writeln!(f, "      Lock:      {}", hex::encode(&output.pub_key_hash))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(keys: &KeyPair) -> (Transaction, HashMap<Vec<u8>, Transaction>) {
        let coinbase = Transaction::coinbase(&keys.public_key_hash(), "", 100).unwrap();
        let mut known = HashMap::new();
        known.insert(coinbase.id.clone(), coinbase.clone());
        (coinbase, known)
    }

    fn spend(from: &KeyPair, coinbase: &Transaction, to: &KeyPair) -> Transaction {
        let input = TxInput::new(coinbase.id.clone(), 0, from.public_key_bytes());
        let outputs = vec![
            TxOutput::new(40, &to.public_key_hash()),
            TxOutput::new(60, &from.public_key_hash()),
        ];
        Transaction::new(vec![input], outputs).unwrap()
    }

    #[test]
    fn test_coinbase_shape() {
        let keys = KeyPair::generate();
        let tx = Transaction::coinbase(&keys.public_key_hash(), "genesis", 100).unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.id.len(), 32);
        assert_eq!(tx.inputs[0].out, -1);
        assert!(tx.inputs[0].txid.is_empty());
        assert_eq!(tx.inputs[0].signature, b"genesis");
        assert_eq!(tx.outputs, vec![TxOutput::new(100, &keys.public_key_hash())]);
    }

    #[test]
    fn test_coinbase_default_memo() {
        let tx = Transaction::coinbase(&[7u8; 20], "", 100).unwrap();
        let memo = String::from_utf8(tx.inputs[0].signature.clone()).unwrap();
        assert_eq!(memo, format!("COINS TO {}", hex::encode([7u8; 20])));
    }

    #[test]
    fn test_hash_ignores_id() {
        let tx = Transaction::coinbase(&[1u8; 20], "memo", 100).unwrap();
        let mut relabeled = tx.clone();
        relabeled.id = vec![0xff; 32];

        assert_eq!(tx.hash().unwrap(), tx.hash().unwrap());
        assert_eq!(tx.hash().unwrap(), relabeled.hash().unwrap());
        assert_eq!(tx.id, tx.hash().unwrap().to_vec());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = Transaction::coinbase(&[1u8; 20], "memo", 100).unwrap();
        let b = Transaction::coinbase(&[1u8; 20], "memo", 101).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_trimmed_copy() {
        let alice = KeyPair::generate();
        let (coinbase, known) = funded(&alice);
        let mut tx = spend(&alice, &coinbase, &KeyPair::generate());
        tx.sign(&alice, &known).unwrap();

        let trimmed = tx.trimmed_copy();
        assert_eq!(trimmed.id, tx.id);
        assert_eq!(trimmed.outputs, tx.outputs);
        assert!(trimmed.inputs[0].signature.is_empty());
        assert!(trimmed.inputs[0].pub_key.is_empty());
        assert_eq!(trimmed.inputs[0].txid, coinbase.id);
    }

    #[test]
    fn test_sign_and_verify() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let (coinbase, known) = funded(&alice);

        let mut tx = spend(&alice, &coinbase, &bob);
        tx.sign(&alice, &known).unwrap();

        assert_eq!(tx.inputs[0].signature.len(), 64);
        assert!(tx.verify(&known).unwrap());
    }

    #[test]
    fn test_coinbase_always_verifies() {
        let tx = Transaction::coinbase(&[3u8; 20], "", 100).unwrap();
        assert!(tx.verify(&HashMap::new()).unwrap());
    }

    #[test]
    fn test_verify_rejects_flipped_signature_bit() {
        let alice = KeyPair::generate();
        let (coinbase, known) = funded(&alice);
        let mut tx = spend(&alice, &coinbase, &KeyPair::generate());
        tx.sign(&alice, &known).unwrap();

        tx.inputs[0].signature[10] ^= 0x01;
        assert!(!tx.verify(&known).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampered_output() {
        let alice = KeyPair::generate();
        let (coinbase, known) = funded(&alice);
        let mut tx = spend(&alice, &coinbase, &KeyPair::generate());
        tx.sign(&alice, &known).unwrap();

        tx.outputs[0].value = 99;
        assert!(!tx.verify(&known).unwrap());
    }

    #[test]
    fn test_verify_rejects_foreign_key() {
        // Mallory signs over an output locked to Alice with a key of their own
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let (coinbase, known) = funded(&alice);

        let mut tx = spend(&mallory, &coinbase, &mallory);
        tx.sign(&mallory, &known).unwrap();
        assert!(!tx.verify(&known).unwrap());
    }

    #[test]
    fn test_sign_missing_predecessor() {
        let alice = KeyPair::generate();
        let (coinbase, _) = funded(&alice);
        let mut tx = spend(&alice, &coinbase, &KeyPair::generate());

        let result = tx.sign(&alice, &HashMap::new());
        assert!(matches!(result, Err(LedgerError::MissingPredecessor(_))));
        assert!(tx.inputs[0].signature.is_empty());
    }

    #[test]
    fn test_verify_unknown_predecessor_is_invalid() {
        let alice = KeyPair::generate();
        let (coinbase, known) = funded(&alice);
        let mut tx = spend(&alice, &coinbase, &KeyPair::generate());
        tx.sign(&alice, &known).unwrap();

        assert!(!tx.verify(&HashMap::new()).unwrap());
    }

    #[test]
    fn test_display_lists_inputs_and_outputs() {
        let tx = Transaction::coinbase(&[9u8; 20], "hello", 100).unwrap();
        let text = tx.to_string();
        assert!(text.contains(&hex::encode(&tx.id)));
        assert!(text.contains("Input 0:"));
        assert!(text.contains("Value:     100"));
    }
}
