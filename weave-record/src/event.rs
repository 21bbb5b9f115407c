//! Event - an encrypted body, its encrypted header and the plaintext node
//! linking them.

use crate::error::RecordError;
use crate::proto::{EventNode, HeaderNode};
use prost::Message;
use weave_model::{Block, Hash, SymKey, HLC};

/// Decrypted header: the body key and the event time.
#[derive(Debug, Clone)]
pub struct EventHeader {
    pub key: SymKey,
    pub time: HLC,
}

/// The three nodes of one event. Holding an `Event` means the node's CIDs
/// match the header and body bytes; opening them still needs the read key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    node: Block,
    header: Block,
    body: Block,
}

/// Seal `body` under a fresh (or the given) per-event key, stamped now.
pub fn create_event(body: &[u8], read_key: &SymKey, key: Option<SymKey>) -> Result<Event, RecordError> {
    create_event_at(body, read_key, key, HLC::now())
}

/// [`create_event`] with an explicit time.
pub fn create_event_at(
    body: &[u8],
    read_key: &SymKey,
    key: Option<SymKey>,
    time: HLC,
) -> Result<Event, RecordError> {
    let key = key.unwrap_or_else(SymKey::generate);
    let body = Block::new(key.encrypt(body)?);

    let header = HeaderNode { key: key.as_bytes().to_vec(), time: time.to_bytes().to_vec() };
    let header = Block::new(read_key.encrypt(&header.encode_to_vec())?);

    let node = EventNode { header: header.cid().to_vec(), body: body.cid().to_vec() };
    Ok(Event { node: Block::new(node.encode_to_vec()), header, body })
}

fn check_link(node: &'static str, expected: &[u8], block: &Block) -> Result<(), RecordError> {
    let expected = Hash::from_slice(expected)?;
    if expected != block.cid() {
        return Err(RecordError::CidMismatch { node, expected, actual: block.cid() });
    }
    Ok(())
}

impl Event {
    /// Rebuild from raw node bytes, checking the header and body links.
    pub fn from_blocks(node: Vec<u8>, header: Vec<u8>, body: Vec<u8>) -> Result<Self, RecordError> {
        let node = Block::new(node);
        let links = EventNode::decode(node.data())?;
        let header = Block::new(header);
        let body = Block::new(body);
        check_link("header", &links.header, &header)?;
        check_link("body", &links.body, &body)?;
        Ok(Self { node, header, body })
    }

    /// CID of the event node; what a record signs.
    pub fn cid(&self) -> Hash {
        self.node.cid()
    }

    pub fn header_cid(&self) -> Hash {
        self.header.cid()
    }

    pub fn body_cid(&self) -> Hash {
        self.body.cid()
    }

    pub fn node(&self) -> &Block {
        &self.node
    }

    pub fn header_block(&self) -> &Block {
        &self.header
    }

    pub fn body_block(&self) -> &Block {
        &self.body
    }

    /// Open the header with the thread's read key.
    pub fn header(&self, read_key: &SymKey) -> Result<EventHeader, RecordError> {
        let plain = read_key.decrypt(self.header.data())?;
        let header = HeaderNode::decode(plain.as_slice())?;
        let time = HLC::from_bytes(&header.time).ok_or(RecordError::InvalidTime(header.time.len()))?;
        Ok(EventHeader { key: SymKey::from_slice(&header.key)?, time })
    }

    /// Open the header, then the body with the key it carries.
    pub fn body(&self, read_key: &SymKey) -> Result<Vec<u8>, RecordError> {
        let header = self.header(read_key)?;
        Ok(header.key.decrypt(self.body.data())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::CryptoError;

    #[test]
    fn test_open_layers() {
        let read_key = SymKey::generate();
        let event_key = SymKey::generate();
        let time = HLC::new(1_700_000_000_000, 3);

        let event = create_event_at(b"{\"ops\":[]}", &read_key, Some(event_key.clone()), time).unwrap();

        let header = event.header(&read_key).unwrap();
        assert_eq!(header.key, event_key);
        assert_eq!(header.time, time);
        assert_eq!(event.body(&read_key).unwrap(), b"{\"ops\":[]}");

        // The body is sealed with the per-event key, not the read key
        assert!(read_key.decrypt(event.body_block().data()).is_err());
    }

    #[test]
    fn test_wrong_read_key() {
        let event = create_event(b"body", &SymKey::generate(), None).unwrap();
        assert!(matches!(
            event.body(&SymKey::generate()),
            Err(RecordError::Crypto(CryptoError::Decrypt))
        ));
    }

    #[test]
    fn test_from_blocks_checks_links() {
        let read_key = SymKey::generate();
        let event = create_event(b"body", &read_key, None).unwrap();

        let rebuilt = Event::from_blocks(
            event.node().data().to_vec(),
            event.header_block().data().to_vec(),
            event.body_block().data().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, event);

        let mut tampered = event.body_block().data().to_vec();
        tampered[0] ^= 0xff;
        let err = Event::from_blocks(
            event.node().data().to_vec(),
            event.header_block().data().to_vec(),
            tampered,
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::CidMismatch { node: "body", .. }));
    }
}
