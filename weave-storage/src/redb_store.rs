//! RedbDatastore - file-backed datastore on redb
//!
//! A single `data` table holds every key. Keys are UTF-8 strings, so redb's
//! native ordering matches the lexicographic order prefix queries rely on.

use crate::datastore::{Batch, BatchOp, Datastore, DatastoreError, Entry};
use crate::key::Key;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use tracing::debug;

pub const TABLE_DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("data");

pub struct RedbDatastore {
    db: Database,
}

impl RedbDatastore {
    /// Open or create the database file at `path`, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatastoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;

        // Ensure the table exists so readers never see TableDoesNotExist.
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TABLE_DATA)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened datastore");
        Ok(Self { db })
    }

    /// Access the underlying redb database.
    pub fn db(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for RedbDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDatastore").finish_non_exhaustive()
    }
}

impl Datastore for RedbDatastore {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, DatastoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TABLE_DATA) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(table.get(key.as_str())?.map(|v| v.value().to_vec()))
    }

    fn write(&self, batch: Batch) -> Result<(), DatastoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_DATA)?;
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put(key, value) => {
                        table.insert(key.as_str(), value.as_slice())?;
                    }
                    BatchOp::Delete(key) => {
                        table.remove(key.as_str())?;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn query(&self, prefix: &str) -> Result<Vec<Entry>, DatastoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TABLE_DATA) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for result in table.range(prefix..)? {
            let (k, v) = result?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((Key::new(key), v.value().to_vec()));
        }
        Ok(entries)
    }
}
