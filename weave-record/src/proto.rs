//! Node and wire messages.
//!
//! Field tags are part of the wire format and must not be renumbered.

/// Signed envelope around an event node. Stored encrypted.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RecordNode {
    /// Ed25519 signature over `block ‖ prev`.
    #[prost(bytes = "vec", tag = "1")]
    pub sig: Vec<u8>,
    /// CID of the event node.
    #[prost(bytes = "vec", tag = "2")]
    pub block: Vec<u8>,
    /// CID of the previous record in the same log.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub prev: Option<Vec<u8>>,
    #[prost(bytes = "vec", tag = "4")]
    pub pub_key: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EventNode {
    #[prost(bytes = "vec", tag = "1")]
    pub header: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeaderNode {
    /// Per-event symmetric key for the body.
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    /// Packed HLC.
    #[prost(bytes = "vec", tag = "2")]
    pub time: Vec<u8>,
}

/// What a transport carries. `eventnode` is plaintext; the other three are
/// ciphertexts.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireRecord {
    #[prost(bytes = "vec", tag = "1")]
    pub recordnode: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub eventnode: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub headernode: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub bodynode: Vec<u8>,
}
