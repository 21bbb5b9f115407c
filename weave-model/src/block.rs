//! Block - an immutable, content-addressed byte payload.

use crate::crypto::content_hash;
use crate::types::Hash;

/// Encoded bytes plus their BLAKE3 CID.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    cid: Hash,
    data: Vec<u8>,
}

impl Block {
    /// Address `data` by its content hash.
    pub fn new(data: Vec<u8>) -> Self {
        Self { cid: content_hash(&data), data }
    }

    pub fn cid(&self) -> Hash {
        self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Recompute the hash and compare it to the stored CID.
    pub fn verify(&self) -> bool {
        content_hash(&self.data) == self.cid
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("cid", &self.cid)
            .field("len", &self.data.len())
            .finish()
    }
}
