//! Wire form of events, shared by event blocks and the dispatcher log.

#[derive(Clone, PartialEq, prost::Message)]
pub struct EventMessage {
    /// Packed HLC, 12 bytes.
    #[prost(bytes = "vec", tag = "1")]
    pub time: Vec<u8>,
    #[prost(string, tag = "2")]
    pub entity_id: String,
    #[prost(string, tag = "3")]
    pub collection: String,
    /// Kept as a raw code so unknown operations surface on decode.
    #[prost(int32, tag = "4")]
    pub op_type: i32,
    /// JSON bytes: full entity or RFC 6902 patch, absent for deletes.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub patch: Option<Vec<u8>>,
}

/// The replicable unit produced by one committed write batch.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventBlock {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<EventMessage>,
}
