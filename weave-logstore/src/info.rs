//! Thread and log descriptors assembled from the books.

use ed25519_dalek::SigningKey;
use weave_model::{crypto, Hash, LogId, PubKey, SymKey, ThreadId};

/// Everything known about one log.
#[derive(Debug, Clone)]
pub struct LogInfo {
    pub id: LogId,
    pub pub_key: PubKey,
    /// Present only for logs this peer writes to.
    pub priv_key: Option<SigningKey>,
    pub addrs: Vec<String>,
    pub heads: Vec<Hash>,
}

impl LogInfo {
    /// A fresh own log for `key`, with no addresses or heads yet.
    pub fn from_signing_key(key: SigningKey) -> Self {
        let pub_key = crypto::public_key(&key);
        Self {
            id: LogId::from_public_key(&pub_key),
            pub_key,
            priv_key: Some(key),
            addrs: Vec::new(),
            heads: Vec::new(),
        }
    }

    pub fn is_own(&self) -> bool {
        self.priv_key.is_some()
    }
}

/// A thread with its logs and symmetric keys.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub logs: Vec<LogInfo>,
    pub replicator_key: Option<SymKey>,
    pub read_key: Option<SymKey>,
}

impl ThreadInfo {
    pub fn new(id: ThreadId, replicator_key: SymKey, read_key: Option<SymKey>) -> Self {
        Self { id, logs: Vec::new(), replicator_key: Some(replicator_key), read_key }
    }

    /// The log this peer can write to, if any.
    pub fn own_log(&self) -> Option<&LogInfo> {
        self.logs.iter().find(|l| l.is_own())
    }
}
