//! Record - the signed envelope linking an event into a log's chain.

use crate::error::RecordError;
use crate::event::Event;
use crate::proto::{RecordNode, WireRecord};
use ed25519_dalek::SigningKey;
use prost::Message;
use tracing::debug;
use weave_model::{crypto, Block, CryptoError, Hash, LogId, PubKey, Signature, SymKey};

/// A decoded record. Construction (local or from the wire) guarantees the
/// signature matches the embedded public key and every CID link holds.
#[derive(Debug, Clone)]
pub struct Record {
    node: Block,
    sig: Signature,
    prev: Option<Hash>,
    pub_key: PubKey,
    event: Event,
}

/// Bytes covered by the record signature: `event CID ‖ prev CID`.
fn signing_payload(block: &Hash, prev: Option<&Hash>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(Hash::LEN * 2);
    payload.extend_from_slice(block.as_bytes());
    if let Some(prev) = prev {
        payload.extend_from_slice(prev.as_bytes());
    }
    payload
}

/// Sign `event` into the log of `key`, after `prev`, sealed with the
/// thread's replicator key.
pub fn create_record(
    event: Event,
    key: &SigningKey,
    prev: Option<Hash>,
    replicator_key: &SymKey,
) -> Result<Record, RecordError> {
    let block = event.cid();
    let sig = crypto::sign(key, &signing_payload(&block, prev.as_ref()));
    let pub_key = crypto::public_key(key);

    let plain = RecordNode {
        sig: sig.to_vec(),
        block: block.to_vec(),
        prev: prev.map(|p| p.to_vec()),
        pub_key: pub_key.to_vec(),
    };
    let node = Block::new(replicator_key.encrypt(&plain.encode_to_vec())?);

    debug!(record = %node.cid(), event = %block, "Created record");
    Ok(Record { node, sig, prev, pub_key, event })
}

impl Record {
    /// Open the envelope and check linkage and signature.
    pub fn from_wire(wire: &WireRecord, replicator_key: &SymKey) -> Result<Self, RecordError> {
        let node = Block::new(wire.recordnode.clone());
        let plain = RecordNode::decode(replicator_key.decrypt(node.data())?.as_slice())?;

        let event = Event::from_blocks(
            wire.eventnode.clone(),
            wire.headernode.clone(),
            wire.bodynode.clone(),
        )?;
        let block = Hash::from_slice(&plain.block)?;
        if block != event.cid() {
            return Err(RecordError::CidMismatch { node: "event", expected: block, actual: event.cid() });
        }

        let record = Record {
            node,
            sig: Signature::from_slice(&plain.sig)?,
            prev: plain.prev.as_deref().map(Hash::from_slice).transpose()?,
            pub_key: PubKey::from_slice(&plain.pub_key)?,
            event,
        };
        record.check_signature()?;
        Ok(record)
    }

    pub fn to_wire(&self) -> WireRecord {
        WireRecord {
            recordnode: self.node.data().to_vec(),
            eventnode: self.event.node().data().to_vec(),
            headernode: self.event.header_block().data().to_vec(),
            bodynode: self.event.body_block().data().to_vec(),
        }
    }

    fn check_signature(&self) -> Result<(), RecordError> {
        let payload = signing_payload(&self.event.cid(), self.prev.as_ref());
        crypto::verify(&self.pub_key, &payload, &self.sig).map_err(|e| match e {
            CryptoError::InvalidSignature => RecordError::InvalidSignature,
            other => RecordError::Crypto(other),
        })
    }

    /// Check the record was signed by `pub_key`.
    pub fn verify(&self, pub_key: &PubKey) -> Result<(), RecordError> {
        if *pub_key != self.pub_key {
            return Err(RecordError::WrongAuthor { expected: *pub_key, actual: self.pub_key });
        }
        self.check_signature()
    }

    /// CID of the sealed record node; the value a log head points at.
    pub fn cid(&self) -> Hash {
        self.node.cid()
    }

    pub fn prev(&self) -> Option<Hash> {
        self.prev
    }

    /// True if this record directly extends `head` (`None` for an empty log).
    /// A record that does not follow the known head signals a gap.
    pub fn follows(&self, head: Option<Hash>) -> bool {
        self.prev == head
    }

    pub fn pub_key(&self) -> PubKey {
        self.pub_key
    }

    pub fn log_id(&self) -> LogId {
        LogId::from_public_key(&self.pub_key)
    }

    pub fn signature(&self) -> Signature {
        self.sig
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}
