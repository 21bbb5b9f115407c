//! AddrBook - TTL-scoped peer addresses per log
//!
//! Expiry only ever moves forward: re-adding a known address with a shorter
//! TTL leaves its expiry alone. Expired entries are hidden from reads and
//! removed by `sweep()`.

use crate::error::LogStoreError;
use crate::keys::{log_key, namespace_prefix, parse_ids, thread_key, ADDRS};
use crate::proto::AddrRecord;
use prost::Message;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use weave_model::{Clock, Emitter, LogId, Subscription, ThreadId};
use weave_storage::{Batch, Datastore, Key};

/// TTL for addresses that never expire (e.g. a log's own addresses).
pub const PERMANENT_ADDR_TTL: Duration = Duration::MAX;

/// Emitted when addresses are seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddr {
    pub thread: ThreadId,
    pub log: LogId,
    pub addrs: Vec<String>,
}

pub struct AddrBook {
    ds: Arc<dyn Datastore>,
    clock: Arc<dyn Clock>,
    new_addrs: Emitter<NewAddr>,
}

impl AddrBook {
    pub fn new(ds: Arc<dyn Datastore>, clock: Arc<dyn Clock>) -> Self {
        Self { ds, clock, new_addrs: Emitter::new() }
    }

    fn addr_key(thread: &ThreadId, log: &LogId, addr: &str) -> Key {
        log_key(ADDRS, thread, log).child(hex::encode(addr.as_bytes()))
    }

    fn expiry(&self, ttl: Duration) -> u64 {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.clock.now_ms().saturating_add(ttl_ms)
    }

    /// Upsert `addrs` with `ttl`. A zero TTL deletes them.
    pub fn put<S: AsRef<str>>(
        &self,
        thread: &ThreadId,
        log: &LogId,
        ttl: Duration,
        addrs: &[S],
    ) -> Result<(), LogStoreError> {
        let mut batch = Batch::new();

        if ttl.is_zero() {
            for addr in addrs {
                batch.delete(Self::addr_key(thread, log, addr.as_ref()));
            }
            return Ok(self.ds.write(batch)?);
        }

        let now = self.clock.now_ms();
        let expires = self.expiry(ttl);
        let mut first_seen = Vec::new();

        for addr in addrs {
            let addr = addr.as_ref();
            let key = Self::addr_key(thread, log, addr);
            let existing = match self.ds.get(&key)? {
                Some(bytes) => Some(AddrRecord::decode(bytes.as_slice())?),
                None => None,
            };

            match existing {
                Some(record) if record.expires > now => {
                    if expires > record.expires {
                        batch.put(key, AddrRecord { addr: addr.to_string(), expires }.encode_to_vec());
                    }
                }
                _ => {
                    batch.put(key, AddrRecord { addr: addr.to_string(), expires }.encode_to_vec());
                    first_seen.push(addr.to_string());
                }
            }
        }

        self.ds.write(batch)?;

        if !first_seen.is_empty() {
            debug!(thread = %thread, log = %log, count = first_seen.len(), "New addresses");
            self.new_addrs.emit(NewAddr { thread: thread.clone(), log: *log, addrs: first_seen });
        }
        Ok(())
    }

    fn records(&self, thread: &ThreadId, log: &LogId) -> Result<Vec<(Key, AddrRecord)>, LogStoreError> {
        let prefix = log_key(ADDRS, thread, log).children_prefix();
        self.ds
            .query(&prefix)?
            .into_iter()
            .map(|(k, v)| Ok((k, AddrRecord::decode(v.as_slice())?)))
            .collect()
    }

    /// Live addresses of a log, sorted.
    pub fn get(&self, thread: &ThreadId, log: &LogId) -> Result<Vec<String>, LogStoreError> {
        let now = self.clock.now_ms();
        let mut addrs: Vec<String> = self
            .records(thread, log)?
            .into_iter()
            .filter(|(_, r)| r.expires > now)
            .map(|(_, r)| r.addr)
            .collect();
        addrs.sort();
        Ok(addrs)
    }

    /// Expiry (unix ms) of one address, if stored and live.
    pub fn expires_at(
        &self,
        thread: &ThreadId,
        log: &LogId,
        addr: &str,
    ) -> Result<Option<u64>, LogStoreError> {
        let now = self.clock.now_ms();
        Ok(match self.ds.get(&Self::addr_key(thread, log, addr))? {
            Some(bytes) => Some(AddrRecord::decode(bytes.as_slice())?.expires).filter(|e| *e > now),
            None => None,
        })
    }

    /// Remove every address of a log.
    pub fn clear(&self, thread: &ThreadId, log: &LogId) -> Result<(), LogStoreError> {
        let prefix = log_key(ADDRS, thread, log).children_prefix();
        self.delete_prefix(&prefix)
    }

    /// Remove every address of every log in a thread.
    pub fn clear_thread(&self, thread: &ThreadId) -> Result<(), LogStoreError> {
        let prefix = thread_key(ADDRS, thread).children_prefix();
        self.delete_prefix(&prefix)
    }

    fn delete_prefix(&self, prefix: &str) -> Result<(), LogStoreError> {
        let mut batch = Batch::new();
        for key in self.ds.query_keys(prefix)? {
            batch.delete(key);
        }
        Ok(self.ds.write(batch)?)
    }

    /// Threads with at least one stored address.
    pub fn threads(&self) -> Result<Vec<ThreadId>, LogStoreError> {
        let mut threads = BTreeSet::new();
        for key in self.ds.query_keys(&namespace_prefix(ADDRS))? {
            let (thread, _) = parse_ids(ADDRS, &key)?;
            threads.insert(thread);
        }
        Ok(threads.into_iter().collect())
    }

    /// Logs of a thread with at least one stored address.
    pub fn logs(&self, thread: &ThreadId) -> Result<Vec<LogId>, LogStoreError> {
        let mut logs = BTreeSet::new();
        for key in self.ds.query_keys(&thread_key(ADDRS, thread).children_prefix())? {
            if let (_, Some(log)) = parse_ids(ADDRS, &key)? {
                logs.insert(log);
            }
        }
        Ok(logs.into_iter().collect())
    }

    /// Delete every expired address. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, LogStoreError> {
        let now = self.clock.now_ms();
        let mut batch = Batch::new();
        for (key, value) in self.ds.query(&namespace_prefix(ADDRS))? {
            if AddrRecord::decode(value.as_slice())?.expires <= now {
                batch.delete(key);
            }
        }
        let removed = batch.len();
        self.ds.write(batch)?;
        if removed > 0 {
            debug!(removed, "Swept expired addresses");
        }
        Ok(removed)
    }

    /// Listen for first-seen addresses.
    pub fn subscribe(&self) -> Subscription<NewAddr> {
        self.new_addrs.subscribe()
    }
}
