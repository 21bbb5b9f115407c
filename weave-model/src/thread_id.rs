//! ThreadId - self-describing thread identifier
//!
//! Layout: `varint(version) ‖ varint(variant) ‖ random bytes`. The string form
//! is the multibase encoding of those bytes (base32-lower by default). Ids
//! are immutable and compare byte-wise.

use prost::encoding::{decode_varint, encode_varint};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use multibase::Base;

/// The only supported id version.
pub const V1: u64 = 0x01;

/// Smallest accepted random component.
pub const MIN_RANDOM_LEN: usize = 16;

/// Random component length used by [`ThreadId::new`].
pub const DEFAULT_RANDOM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadIdError {
    #[error("unsupported thread id version: {0}")]
    Version(u64),

    #[error("unknown thread id variant: {0:#x}")]
    Variant(u64),

    #[error("thread id random component too short: {0} bytes")]
    TooShort(usize),

    #[error("invalid thread id encoding: {0}")]
    InvalidEncoding(String),
}

/// Access semantics of a thread, carried in the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    /// Anyone holding the keys may read and write.
    Raw,
    /// Access is governed by an ACL log.
    AccessControlled,
}

impl Variant {
    pub fn code(self) -> u64 {
        match self {
            Variant::Raw => 0x55,
            Variant::AccessControlled => 0x70,
        }
    }
}

impl TryFrom<u64> for Variant {
    type Error = ThreadIdError;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0x55 => Ok(Variant::Raw),
            0x70 => Ok(Variant::AccessControlled),
            other => Err(ThreadIdError::Variant(other)),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Raw => write!(f, "raw"),
            Variant::AccessControlled => write!(f, "access_controlled"),
        }
    }
}

/// Thread identifier. Holds the full binary form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(Vec<u8>);

impl ThreadId {
    /// New random v1 id with the default 32-byte random component.
    pub fn new(variant: Variant) -> Self {
        Self::encode_parts(variant, &random_bytes(DEFAULT_RANDOM_LEN))
    }

    /// New random v1 id with `size` random bytes.
    pub fn from_random(variant: Variant, size: usize) -> Result<Self, ThreadIdError> {
        if size < MIN_RANDOM_LEN {
            return Err(ThreadIdError::TooShort(size));
        }
        Ok(Self::encode_parts(variant, &random_bytes(size)))
    }

    fn encode_parts(variant: Variant, random: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(2 + random.len());
        encode_varint(V1, &mut buf);
        encode_varint(variant.code(), &mut buf);
        buf.extend_from_slice(random);
        ThreadId(buf)
    }

    /// Parse the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ThreadIdError> {
        if bytes.len() < 2 {
            return Err(ThreadIdError::InvalidEncoding(format!(
                "input too short: {} bytes",
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let version = decode_varint(&mut buf)
            .map_err(|e| ThreadIdError::InvalidEncoding(e.to_string()))?;
        if version != V1 {
            return Err(ThreadIdError::Version(version));
        }
        let variant = decode_varint(&mut buf)
            .map_err(|e| ThreadIdError::InvalidEncoding(e.to_string()))?;
        Variant::try_from(variant)?;
        if buf.len() < MIN_RANDOM_LEN {
            return Err(ThreadIdError::TooShort(buf.len()));
        }
        Ok(ThreadId(bytes.to_vec()))
    }

    /// Multibase-decode then parse.
    pub fn from_string(s: &str) -> Result<Self, ThreadIdError> {
        if s.len() < 2 {
            return Err(ThreadIdError::InvalidEncoding(format!("input too short: {:?}", s)));
        }
        let (_, bytes) =
            multibase::decode(s).map_err(|e| ThreadIdError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Multibase string in the given base.
    pub fn encode(&self, base: Base) -> String {
        multibase::encode(base, &self.0)
    }

    pub fn version(&self) -> u64 {
        // Constructors only admit well-formed v1 ids.
        let mut buf = self.0.as_slice();
        decode_varint(&mut buf).unwrap_or(V1)
    }

    pub fn variant(&self) -> Variant {
        let mut buf = self.0.as_slice();
        let _ = decode_varint(&mut buf);
        decode_varint(&mut buf)
            .ok()
            .and_then(|code| Variant::try_from(code).ok())
            .unwrap_or(Variant::Raw)
    }

    /// True if the id parses as a well-formed v1 id.
    pub fn is_defined(&self) -> bool {
        Self::from_bytes(&self.0).is_ok()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(Base::Base32Lower))
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self)
    }
}

impl FromStr for ThreadId {
    type Err = ThreadIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<&[u8]> for ThreadId {
    type Error = ThreadIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl serde::Serialize for ThreadId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ThreadId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        ThreadId::from_string(&s).map_err(serde::de::Error::custom)
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut buf = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}
