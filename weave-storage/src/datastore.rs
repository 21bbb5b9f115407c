use crate::key::Key;
use crate::{MemoryDatastore, RedbDatastore};
use std::sync::Arc;
use thiserror::Error;
use weave_model::StorageConfig;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single mutation inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Key, Vec<u8>),
    Delete(Key),
}

/// Ordered set of mutations applied atomically by [`Datastore::write`].
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Key, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put(key, value.into()));
        self
    }

    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.ops.push(BatchOp::Delete(key));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// A key with its stored value, as returned by prefix queries.
pub type Entry = (Key, Vec<u8>);

/// Ordered key-value store shared by every book and collection.
///
/// Implementations must apply a [`Batch`] atomically and return query results
/// in ascending key order.
pub trait Datastore: Send + Sync {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, DatastoreError>;

    fn has(&self, key: &Key) -> Result<bool, DatastoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), DatastoreError> {
        let mut batch = Batch::new();
        batch.put(key.clone(), value);
        self.write(batch)
    }

    fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        let mut batch = Batch::new();
        batch.delete(key.clone());
        self.write(batch)
    }

    /// Apply every op in `batch` or none of them.
    fn write(&self, batch: Batch) -> Result<(), DatastoreError>;

    /// Every entry whose key starts with `prefix`, in key order.
    fn query(&self, prefix: &str) -> Result<Vec<Entry>, DatastoreError>;

    /// Keys only variant of [`Datastore::query`].
    fn query_keys(&self, prefix: &str) -> Result<Vec<Key>, DatastoreError> {
        Ok(self.query(prefix)?.into_iter().map(|(k, _)| k).collect())
    }
}

/// Open the datastore selected by `config`.
pub fn open_datastore(config: &StorageConfig) -> Result<Arc<dyn Datastore>, DatastoreError> {
    match config {
        StorageConfig::File(path) => Ok(Arc::new(RedbDatastore::open(path)?)),
        StorageConfig::InMemory => Ok(Arc::new(MemoryDatastore::new())),
    }
}
