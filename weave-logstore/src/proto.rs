//! Persisted book records.

/// Address with its absolute expiry (unix ms).
#[derive(Clone, PartialEq, prost::Message)]
pub struct AddrRecord {
    #[prost(string, tag = "1")]
    pub addr: String,

    #[prost(uint64, tag = "2")]
    pub expires: u64,
}

/// Sorted, de-duplicated set of head CIDs.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HeadSet {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub heads: Vec<Vec<u8>>,
}

/// Typed metadata value.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MetadataValue {
    #[prost(oneof = "metadata_value::Kind", tags = "1, 2, 3, 4")]
    pub kind: Option<metadata_value::Kind>,
}

pub mod metadata_value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(int64, tag = "1")]
        Int(i64),
        #[prost(bool, tag = "2")]
        Bool(bool),
        #[prost(string, tag = "3")]
        Str(String),
        #[prost(bytes, tag = "4")]
        Bytes(Vec<u8>),
    }
}
