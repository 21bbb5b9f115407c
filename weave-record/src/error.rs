use thiserror::Error;
use weave_model::{CryptoError, Hash, PubKey, TypesError};

#[derive(Error, Debug)]
pub enum RecordError {
    /// Wrong key or tampered ciphertext on one of the sealed layers.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("{node} CID mismatch: expected {expected}, got {actual}")]
    CidMismatch {
        node: &'static str,
        expected: Hash,
        actual: Hash,
    },

    #[error("Record signature does not verify")]
    InvalidSignature,

    #[error("Record signed by {actual}, expected {expected}")]
    WrongAuthor { expected: PubKey, actual: PubKey },

    #[error("Invalid event time: {0} bytes")]
    InvalidTime(usize),

    #[error("Conversion error: {0}")]
    Conversion(#[from] TypesError),
}
