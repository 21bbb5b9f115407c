//! Strong types for byte arrays
//!
//! Semantic newtypes for the fixed-size byte arrays that travel through the
//! books and the record codec, replacing raw `[u8; N]`.

use std::fmt;
use thiserror::Error;

/// Errors from parsing a strong byte type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Defines a fixed-size byte array newtype.
///
/// Args:
/// - $name: The name of the struct (e.g., Hash)
/// - $len: The size of the array (e.g., 32)
/// - $doc: Documentation string
/// - $derives: Extra traits to derive
macro_rules! define_bytes {
    ($name:ident, $len:expr, $doc:expr, [$($derives:ident),*]) => {
        #[doc = $doc]
        #[derive(Clone, Copy, serde::Serialize, serde::Deserialize, $($derives),*)]
        #[repr(transparent)]
        pub struct $name(#[serde(with = "serde_bytes")] pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            /// Returns the inner bytes as a slice.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Parse from a hex string.
            pub fn from_hex(hex_str: &str) -> Result<Self, TypesError> {
                let bytes = hex::decode(hex_str)
                    .map_err(|e| TypesError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Parse from a byte slice of exactly the right length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
                <[u8; $len]>::try_from(bytes)
                    .map(Self)
                    .map_err(|_| TypesError::InvalidLength { expected: $len, got: bytes.len() })
            }

            /// Lowercase hex rendering, used in datastore keys.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(wrapper: $name) -> [u8; $len] {
                wrapper.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = [u8; $len];
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(self, f)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                fmt::Display::fmt(self, f)?;
                write!(f, ")")
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = TypesError;
            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                Self::from_slice(slice)
            }
        }
    };
}

define_bytes!(
    Hash,
    32,
    "32-byte BLAKE3 content hash. Serves as the CID of every block and node.",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);
}

define_bytes!(
    PubKey,
    32,
    "32-byte Ed25519 public key",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

define_bytes!(
    Signature,
    64,
    "64-byte Ed25519 signature",
    [PartialEq, Eq]
);

define_bytes!(
    LogId,
    32,
    "Identifier of a single-writer log: the BLAKE3 hash of the log's public key.",
    [PartialEq, Eq, Hash, PartialOrd, Ord]
);

impl LogId {
    /// Derive the log id owned by `pubkey`.
    pub fn from_public_key(pubkey: &PubKey) -> Self {
        LogId(*blake3::hash(pubkey.as_bytes()).as_bytes())
    }

    /// True if `pubkey` is the key this id was derived from.
    pub fn matches(&self, pubkey: &PubKey) -> bool {
        *self == Self::from_public_key(pubkey)
    }
}
