//! LogStore - the four books over one shared datastore

use crate::addr_book::{AddrBook, PERMANENT_ADDR_TTL};
use crate::error::LogStoreError;
use crate::head_book::HeadBook;
use crate::info::{LogInfo, ThreadInfo};
use crate::key_book::KeyBook;
use crate::metadata_book::MetadataBook;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use weave_model::{Clock, LogId, SystemClock, ThreadId};
use weave_storage::Datastore;

/// Thread and log level view over the books.
///
/// A thread exists as soon as any book holds an entry for it; a log exists
/// once it has a key or an address.
pub struct LogStore {
    keys: KeyBook,
    addrs: AddrBook,
    heads: HeadBook,
    metadata: MetadataBook,
}

impl LogStore {
    pub fn new(ds: Arc<dyn Datastore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: KeyBook::new(ds.clone()),
            addrs: AddrBook::new(ds.clone(), clock),
            heads: HeadBook::new(ds.clone()),
            metadata: MetadataBook::new(ds),
        }
    }

    /// LogStore reading the system clock.
    pub fn with_system_clock(ds: Arc<dyn Datastore>) -> Self {
        Self::new(ds, Arc::new(SystemClock))
    }

    pub fn key_book(&self) -> &KeyBook {
        &self.keys
    }

    pub fn addr_book(&self) -> &AddrBook {
        &self.addrs
    }

    pub fn head_book(&self) -> &HeadBook {
        &self.heads
    }

    pub fn metadata_book(&self) -> &MetadataBook {
        &self.metadata
    }

    /// Every thread known to the key or address book.
    pub fn threads(&self) -> Result<Vec<ThreadId>, LogStoreError> {
        let mut threads: BTreeSet<ThreadId> = self.keys.threads()?.into_iter().collect();
        threads.extend(self.addrs.threads()?);
        Ok(threads.into_iter().collect())
    }

    /// Every log of `thread` known to the key or address book.
    pub fn logs(&self, thread: &ThreadId) -> Result<Vec<LogId>, LogStoreError> {
        let mut logs: BTreeSet<LogId> = self.keys.logs(thread)?.into_iter().collect();
        logs.extend(self.addrs.logs(thread)?);
        Ok(logs.into_iter().collect())
    }

    /// Register a thread's symmetric keys. A replicator key is mandatory.
    pub fn add_thread(&self, thread: &ThreadInfo) -> Result<(), LogStoreError> {
        let replicator_key = thread
            .replicator_key
            .as_ref()
            .ok_or_else(|| LogStoreError::ReplicatorKeyRequired(thread.id.clone()))?;
        self.keys.add_replicator_key(&thread.id, replicator_key)?;
        if let Some(read_key) = &thread.read_key {
            self.keys.add_read_key(&thread.id, read_key)?;
        }
        info!(thread = %thread.id, readable = thread.read_key.is_some(), "Added thread");
        Ok(())
    }

    /// Thread keys plus every log of the thread.
    pub fn thread_info(&self, thread: &ThreadId) -> Result<ThreadInfo, LogStoreError> {
        let logs = self
            .logs(thread)?
            .iter()
            .map(|log| self.log_info(thread, log))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ThreadInfo {
            id: thread.clone(),
            logs,
            replicator_key: self.keys.replicator_key(thread)?,
            read_key: self.keys.read_key(thread)?,
        })
    }

    /// Store a log's keys, addresses (permanent) and heads.
    pub fn add_log(&self, thread: &ThreadId, log: &LogInfo) -> Result<(), LogStoreError> {
        self.keys.add_pub_key(thread, &log.id, &log.pub_key)?;
        if let Some(priv_key) = &log.priv_key {
            self.keys.add_priv_key(thread, &log.id, priv_key)?;
        }
        if !log.addrs.is_empty() {
            self.addrs.put(thread, &log.id, PERMANENT_ADDR_TTL, &log.addrs)?;
        }
        if !log.heads.is_empty() {
            self.heads.add(thread, &log.id, &log.heads)?;
        }
        debug!(thread = %thread, log = %log.id, own = log.is_own(), "Added log");
        Ok(())
    }

    /// Assemble a log from the books. The public key must be known.
    pub fn log_info(&self, thread: &ThreadId, log: &LogId) -> Result<LogInfo, LogStoreError> {
        let pub_key = self
            .keys
            .pub_key(thread, log)?
            .ok_or_else(|| LogStoreError::PublicKeyMissing { thread: thread.clone(), log: *log })?;
        Ok(LogInfo {
            id: *log,
            pub_key,
            priv_key: self.keys.priv_key(thread, log)?,
            addrs: self.addrs.get(thread, log)?,
            heads: self.heads.get(thread, log)?,
        })
    }

    /// The log of `thread` this peer holds a private key for.
    pub fn own_log(&self, thread: &ThreadId) -> Result<Option<LogInfo>, LogStoreError> {
        for log in self.keys.logs(thread)? {
            if self.keys.priv_key(thread, &log)?.is_some() {
                return self.log_info(thread, &log).map(Some);
            }
        }
        Ok(None)
    }

    /// Remove the thread from every book.
    pub fn delete_thread(&self, thread: &ThreadId) -> Result<(), LogStoreError> {
        self.keys.clear_thread(thread)?;
        self.addrs.clear_thread(thread)?;
        self.heads.clear_thread(thread)?;
        self.metadata.clear_thread(thread)?;
        info!(thread = %thread, "Deleted thread");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::{crypto, SymKey, Variant};
    use weave_storage::MemoryDatastore;

    fn store() -> LogStore {
        LogStore::with_system_clock(Arc::new(MemoryDatastore::new()))
    }

    #[test]
    fn test_add_thread_requires_replicator_key() {
        let ls = store();
        let mut info = ThreadInfo::new(ThreadId::new(Variant::Raw), SymKey::generate(), None);
        info.replicator_key = None;
        assert!(matches!(ls.add_thread(&info), Err(LogStoreError::ReplicatorKeyRequired(_))));
        assert!(ls.threads().unwrap().is_empty());
    }

    #[test]
    fn test_log_info_without_pub_key() {
        let ls = store();
        let thread = ThreadId::new(Variant::Raw);
        let log = LogId::from([5u8; 32]);
        ls.addr_book().put(&thread, &log, PERMANENT_ADDR_TTL, &["/ip4/10.0.0.1/tcp/1"]).unwrap();

        // Known through its address only
        assert_eq!(ls.logs(&thread).unwrap(), vec![log]);
        assert!(matches!(
            ls.log_info(&thread, &log),
            Err(LogStoreError::PublicKeyMissing { .. })
        ));
    }

    #[test]
    fn test_own_log() {
        let ls = store();
        let thread = ThreadId::new(Variant::Raw);
        ls.add_thread(&ThreadInfo::new(thread.clone(), SymKey::generate(), None)).unwrap();
        assert!(ls.own_log(&thread).unwrap().is_none());

        let peer_key = crypto::public_key(&crypto::generate_signing_key());
        let peer = LogInfo {
            id: LogId::from_public_key(&peer_key),
            pub_key: peer_key,
            priv_key: None,
            addrs: vec![],
            heads: vec![],
        };
        ls.add_log(&thread, &peer).unwrap();
        assert!(ls.own_log(&thread).unwrap().is_none());

        let mine = LogInfo::from_signing_key(crypto::generate_signing_key());
        ls.add_log(&thread, &mine).unwrap();
        assert_eq!(ls.own_log(&thread).unwrap().unwrap().id, mine.id);
    }
}
