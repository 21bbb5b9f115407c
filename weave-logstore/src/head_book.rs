//! HeadBook - frontier CIDs per log, stored as one encoded set

use crate::error::LogStoreError;
use crate::keys::{log_key, thread_key, HEADS};
use crate::proto::HeadSet;
use prost::Message;
use std::collections::BTreeSet;
use std::sync::Arc;
use weave_model::{Hash, LogId, ThreadId};
use weave_storage::{Batch, Datastore};

pub struct HeadBook {
    ds: Arc<dyn Datastore>,
}

impl HeadBook {
    pub fn new(ds: Arc<dyn Datastore>) -> Self {
        Self { ds }
    }

    fn load(&self, thread: &ThreadId, log: &LogId) -> Result<BTreeSet<Hash>, LogStoreError> {
        let Some(bytes) = self.ds.get(&log_key(HEADS, thread, log))? else {
            return Ok(BTreeSet::new());
        };
        HeadSet::decode(bytes.as_slice())?
            .heads
            .iter()
            .map(|h| Hash::from_slice(h).map_err(LogStoreError::from))
            .collect()
    }

    fn store(&self, thread: &ThreadId, log: &LogId, heads: &BTreeSet<Hash>) -> Result<(), LogStoreError> {
        let key = log_key(HEADS, thread, log);
        if heads.is_empty() {
            return Ok(self.ds.delete(&key)?);
        }
        let set = HeadSet { heads: heads.iter().map(|h| h.to_vec()).collect() };
        Ok(self.ds.put(&key, &set.encode_to_vec())?)
    }

    /// Replace the heads of a log.
    pub fn put(&self, thread: &ThreadId, log: &LogId, heads: &[Hash]) -> Result<(), LogStoreError> {
        self.store(thread, log, &heads.iter().copied().collect())
    }

    /// Merge heads into the existing set. Idempotent.
    pub fn add(&self, thread: &ThreadId, log: &LogId, heads: &[Hash]) -> Result<(), LogStoreError> {
        let mut set = self.load(thread, log)?;
        let before = set.len();
        set.extend(heads.iter().copied());
        if set.len() == before {
            return Ok(());
        }
        self.store(thread, log, &set)
    }

    /// Heads of a log in CID order.
    pub fn get(&self, thread: &ThreadId, log: &LogId) -> Result<Vec<Hash>, LogStoreError> {
        Ok(self.load(thread, log)?.into_iter().collect())
    }

    pub fn clear(&self, thread: &ThreadId, log: &LogId) -> Result<(), LogStoreError> {
        Ok(self.ds.delete(&log_key(HEADS, thread, log))?)
    }

    pub fn clear_thread(&self, thread: &ThreadId) -> Result<(), LogStoreError> {
        let mut batch = Batch::new();
        for key in self.ds.query_keys(&thread_key(HEADS, thread).children_prefix())? {
            batch.delete(key);
        }
        Ok(self.ds.write(batch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::Variant;
    use weave_storage::MemoryDatastore;

    #[test]
    fn test_put_overwrites_add_merges() {
        let book = HeadBook::new(Arc::new(MemoryDatastore::new()));
        let thread = ThreadId::new(Variant::Raw);
        let log = LogId::from([1u8; 32]);
        let (a, b, c) = (Hash::from([1u8; 32]), Hash::from([2u8; 32]), Hash::from([3u8; 32]));

        book.put(&thread, &log, &[b, a]).unwrap();
        assert_eq!(book.get(&thread, &log).unwrap(), vec![a, b]);

        book.add(&thread, &log, &[c, a]).unwrap();
        book.add(&thread, &log, &[c]).unwrap();
        assert_eq!(book.get(&thread, &log).unwrap(), vec![a, b, c]);

        book.put(&thread, &log, &[c]).unwrap();
        assert_eq!(book.get(&thread, &log).unwrap(), vec![c]);

        book.clear_thread(&thread).unwrap();
        assert!(book.get(&thread, &log).unwrap().is_empty());
    }
}
