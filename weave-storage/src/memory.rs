//! MemoryDatastore - BTreeMap-backed datastore

use crate::datastore::{Batch, BatchOp, Datastore, DatastoreError, Entry};
use crate::key::Key;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory datastore. Batches apply under one write lock.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, DatastoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key.as_str()).cloned())
    }

    fn write(&self, batch: Batch) -> Result<(), DatastoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    entries.insert(key.as_str().to_string(), value);
                }
                BatchOp::Delete(key) => {
                    entries.remove(key.as_str());
                }
            }
        }
        Ok(())
    }

    fn query(&self, prefix: &str) -> Result<Vec<Entry>, DatastoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (Key::new(k.clone()), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_and_prefix_query() {
        let ds = MemoryDatastore::new();
        let mut batch = Batch::new();
        batch
            .put(Key::new("/a/1"), b"one".to_vec())
            .put(Key::new("/a/2"), b"two".to_vec())
            .put(Key::new("/ab/3"), b"three".to_vec())
            .put(Key::new("/b/1"), b"four".to_vec());
        ds.write(batch).unwrap();

        let found = ds.query("/a/").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], (Key::new("/a/1"), b"one".to_vec()));

        ds.delete(&Key::new("/a/1")).unwrap();
        assert!(!ds.has(&Key::new("/a/1")).unwrap());
        assert_eq!(ds.query_keys("/a").unwrap(), vec![Key::new("/a/2"), Key::new("/ab/3")]);
    }
}
