use thiserror::Error;
use weave_model::{CryptoError, LogId, ThreadId, ThreadIdError, TypesError};
use weave_storage::DatastoreError;

/// Errors from the books and the composed log store.
#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Key does not derive log {log}")]
    KeyMismatch { log: LogId },

    #[error("Public key missing for log {log} in thread {thread}")]
    PublicKeyMissing { thread: ThreadId, log: LogId },

    #[error("Replicator key required to add thread {0}")]
    ReplicatorKeyRequired(ThreadId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Metadata {key} has a different type")]
    WrongType { key: String },

    #[error("Corrupt key: {0}")]
    CorruptKey(String),

    #[error("Thread id error: {0}")]
    ThreadId(#[from] ThreadIdError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] TypesError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
