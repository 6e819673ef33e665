//! Key-value store contract and backends
//!
//! Every read happens inside a `view` and every write inside an `update`.
//! An update stages its writes in a [`WriteBatch`] and commits them all at
//! once after the closure returns `Ok`; an error from the closure discards
//! the batch. Reads inside an update see the state before the batch.

use crate::{LedgerError, Result};
use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Read access granted to a store transaction
pub trait ReadView {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Writes staged by an update, applied in order on commit
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.ops.push(WriteOp::Put(key.to_vec(), value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(WriteOp::Delete(key.to_vec()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Transactional key-value store
pub trait KvStore {
    /// Run `f` against a consistent read snapshot
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView) -> Result<T>;

    /// Run `f` and atomically commit the writes it staged
    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView, &mut WriteBatch) -> Result<T>;
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

struct MapView<'a>(&'a BTreeMap<Vec<u8>, Vec<u8>>);

impl ReadView for MapView<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.0.get(key).cloned())
    }
}

impl KvStore for MemoryStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView) -> Result<T>,
    {
        let map = self.map.read();
        f(&MapView(&map))
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView, &mut WriteBatch) -> Result<T>,
    {
        let mut map = self.map.write();
        let mut batch = WriteBatch::default();
        let result = f(&MapView(&map), &mut batch)?;

        for op in batch.ops {
            match op {
                WriteOp::Put(key, value) => {
                    map.insert(key, value);
                }
                WriteOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        Ok(result)
    }
}

const CHAIN_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("chain");

fn storage<E: Display>(err: E) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

/// On-disk store backed by a single redb table
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(storage)?;

        // Make sure the table exists before the first read transaction
        let txn = db.begin_write().map_err(storage)?;
        txn.open_table(CHAIN_TABLE).map_err(storage)?;
        txn.commit().map_err(storage)?;

        info!("📁 Opened chain store at {}", path.display());
        Ok(Self { db })
    }
}

struct TableView<T>(T);

impl<T> ReadView for TableView<T>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.0.get(key).map_err(storage)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }
}

impl KvStore for RedbStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView) -> Result<T>,
    {
        let txn = self.db.begin_read().map_err(storage)?;
        let view = TableView(txn.open_table(CHAIN_TABLE).map_err(storage)?);
        f(&view)
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadView, &mut WriteBatch) -> Result<T>,
    {
        // Dropping the transaction without commit aborts it
        let txn = self.db.begin_write().map_err(storage)?;
        let result = {
            let mut view = TableView(txn.open_table(CHAIN_TABLE).map_err(storage)?);
            let mut batch = WriteBatch::default();
            let result = f(&view, &mut batch)?;

            debug!("Committing {} writes", batch.len());
            for op in batch.ops {
                match op {
                    WriteOp::Put(key, value) => {
                        view.0.insert(key.as_slice(), value.as_slice()).map_err(storage)?;
                    }
                    WriteOp::Delete(key) => {
                        view.0.remove(key.as_slice()).map_err(storage)?;
                    }
                }
            }
            result
        };
        txn.commit().map_err(storage)?;
        Ok(result)
    }
}
