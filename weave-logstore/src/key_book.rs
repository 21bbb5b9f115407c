//! KeyBook - log keypairs and thread symmetric keys
//!
//! Log keys live under `/thread/keys/<thread>/<log>:pub|priv`; the thread's
//! replicator and read keys under `/thread/keys/<thread>:repl|read`. Adding
//! a key whose derived log id differs from the target log fails with
//! `KeyMismatch`.

use crate::error::LogStoreError;
use crate::keys::{log_key, namespace_prefix, parse_ids, thread_key, KEYS};
use ed25519_dalek::SigningKey;
use std::collections::BTreeSet;
use std::sync::Arc;
use weave_model::{crypto, LogId, PubKey, SymKey, ThreadId};
use weave_storage::{Batch, Datastore, Key};

const PUB: &str = "pub";
const PRIV: &str = "priv";
const READ: &str = "read";
const REPL: &str = "repl";

pub struct KeyBook {
    ds: Arc<dyn Datastore>,
}

impl KeyBook {
    pub fn new(ds: Arc<dyn Datastore>) -> Self {
        Self { ds }
    }

    fn log_entry(thread: &ThreadId, log: &LogId, kind: &str) -> Key {
        log_key(KEYS, thread, log).with_suffix(kind)
    }

    fn thread_entry(thread: &ThreadId, kind: &str) -> Key {
        thread_key(KEYS, thread).with_suffix(kind)
    }

    // ==================== Log keys ====================

    pub fn add_pub_key(&self, thread: &ThreadId, log: &LogId, key: &PubKey) -> Result<(), LogStoreError> {
        if !log.matches(key) {
            return Err(LogStoreError::KeyMismatch { log: *log });
        }
        Ok(self.ds.put(&Self::log_entry(thread, log, PUB), key.as_ref())?)
    }

    pub fn pub_key(&self, thread: &ThreadId, log: &LogId) -> Result<Option<PubKey>, LogStoreError> {
        match self.ds.get(&Self::log_entry(thread, log, PUB))? {
            Some(bytes) => Ok(Some(PubKey::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store the log's private key. The public half must derive `log`.
    pub fn add_priv_key(&self, thread: &ThreadId, log: &LogId, key: &SigningKey) -> Result<(), LogStoreError> {
        if !log.matches(&crypto::public_key(key)) {
            return Err(LogStoreError::KeyMismatch { log: *log });
        }
        Ok(self.ds.put(&Self::log_entry(thread, log, PRIV), key.as_bytes())?)
    }

    pub fn priv_key(&self, thread: &ThreadId, log: &LogId) -> Result<Option<SigningKey>, LogStoreError> {
        match self.ds.get(&Self::log_entry(thread, log, PRIV))? {
            Some(bytes) => {
                let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    LogStoreError::CorruptKey(Self::log_entry(thread, log, PRIV).to_string())
                })?;
                Ok(Some(SigningKey::from_bytes(&secret)))
            }
            None => Ok(None),
        }
    }

    // ==================== Thread keys ====================

    pub fn add_read_key(&self, thread: &ThreadId, key: &SymKey) -> Result<(), LogStoreError> {
        Ok(self.ds.put(&Self::thread_entry(thread, READ), key.as_bytes())?)
    }

    pub fn read_key(&self, thread: &ThreadId) -> Result<Option<SymKey>, LogStoreError> {
        self.sym_key(&Self::thread_entry(thread, READ))
    }

    pub fn add_replicator_key(&self, thread: &ThreadId, key: &SymKey) -> Result<(), LogStoreError> {
        Ok(self.ds.put(&Self::thread_entry(thread, REPL), key.as_bytes())?)
    }

    pub fn replicator_key(&self, thread: &ThreadId) -> Result<Option<SymKey>, LogStoreError> {
        self.sym_key(&Self::thread_entry(thread, REPL))
    }

    fn sym_key(&self, key: &Key) -> Result<Option<SymKey>, LogStoreError> {
        match self.ds.get(key)? {
            Some(bytes) => Ok(Some(SymKey::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    // ==================== Scans ====================

    /// Keys belonging to a thread: its own `<tid>:kind` entries plus every
    /// `<tid>/<log>:kind` entry.
    fn thread_keys(&self, thread: &ThreadId) -> Result<Vec<Key>, LogStoreError> {
        let base = thread_key(KEYS, thread);
        let mut keys = self.ds.query_keys(&format!("{}:", base))?;
        keys.extend(self.ds.query_keys(&base.children_prefix())?);
        Ok(keys)
    }

    /// Threads with any stored key.
    pub fn threads(&self) -> Result<Vec<ThreadId>, LogStoreError> {
        let mut threads = BTreeSet::new();
        for key in self.ds.query_keys(&namespace_prefix(KEYS))? {
            threads.insert(parse_ids(KEYS, &key)?.0);
        }
        Ok(threads.into_iter().collect())
    }

    /// Logs of a thread with a public or private key.
    pub fn logs(&self, thread: &ThreadId) -> Result<Vec<LogId>, LogStoreError> {
        let mut logs = BTreeSet::new();
        for key in self.ds.query_keys(&thread_key(KEYS, thread).children_prefix())? {
            if let (_, Some(log)) = parse_ids(KEYS, &key)? {
                logs.insert(log);
            }
        }
        Ok(logs.into_iter().collect())
    }

    /// Remove every key of a thread, its logs included.
    pub fn clear_thread(&self, thread: &ThreadId) -> Result<(), LogStoreError> {
        let mut batch = Batch::new();
        for key in self.thread_keys(thread)? {
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

    fn book() -> KeyBook {
        KeyBook::new(Arc::new(MemoryDatastore::new()))
    }

    #[test]
    fn test_log_keys_roundtrip() {
        let book = book();
        let thread = ThreadId::new(Variant::Raw);
        let sk = crypto::generate_signing_key();
        let pk = crypto::public_key(&sk);
        let log = LogId::from_public_key(&pk);

        assert!(book.pub_key(&thread, &log).unwrap().is_none());

        book.add_pub_key(&thread, &log, &pk).unwrap();
        book.add_priv_key(&thread, &log, &sk).unwrap();

        assert_eq!(book.pub_key(&thread, &log).unwrap(), Some(pk));
        let restored = book.priv_key(&thread, &log).unwrap().unwrap();
        assert_eq!(restored.to_bytes(), sk.to_bytes());
        assert_eq!(book.logs(&thread).unwrap(), vec![log]);
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let book = book();
        let thread = ThreadId::new(Variant::Raw);
        let log = LogId::from_public_key(&crypto::public_key(&crypto::generate_signing_key()));
        let other = crypto::generate_signing_key();

        assert!(matches!(
            book.add_pub_key(&thread, &log, &crypto::public_key(&other)),
            Err(LogStoreError::KeyMismatch { .. })
        ));
        assert!(matches!(
            book.add_priv_key(&thread, &log, &other),
            Err(LogStoreError::KeyMismatch { .. })
        ));
        assert!(book.logs(&thread).unwrap().is_empty());
    }

    #[test]
    fn test_thread_keys_and_clear() {
        let book = book();
        let thread = ThreadId::new(Variant::Raw);
        let other = ThreadId::new(Variant::AccessControlled);
        let read = SymKey::generate();
        let repl = SymKey::generate();

        book.add_read_key(&thread, &read).unwrap();
        book.add_replicator_key(&thread, &repl).unwrap();
        book.add_replicator_key(&other, &repl).unwrap();

        assert_eq!(book.read_key(&thread).unwrap(), Some(read));
        assert_eq!(book.replicator_key(&thread).unwrap(), Some(repl.clone()));
        assert!(book.read_key(&other).unwrap().is_none());
        assert_eq!(book.threads().unwrap().len(), 2);

        let sk = crypto::generate_signing_key();
        let log = LogId::from_public_key(&crypto::public_key(&sk));
        book.add_priv_key(&thread, &log, &sk).unwrap();

        book.clear_thread(&thread).unwrap();
        assert!(book.replicator_key(&thread).unwrap().is_none());
        assert!(book.priv_key(&thread, &log).unwrap().is_none());
        assert_eq!(book.threads().unwrap(), vec![other.clone()]);
        assert_eq!(book.replicator_key(&other).unwrap(), Some(repl));
    }
}
