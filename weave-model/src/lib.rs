//! Weave Model
//!
//! Pure data types shared by every weave crate: thread identifiers, strong
//! byte newtypes, content-addressed blocks, hybrid logical clocks, the
//! cryptographic primitives and the subscription registry used for
//! notifications. Nothing in here touches storage.

pub mod block;
pub mod clock;
pub mod crypto;
pub mod emitter;
pub mod hlc;
pub mod storage_config;
pub mod thread_id;
pub mod types;

// Re-exports
pub use block::Block;
pub use clock::{Clock, MockClock, SystemClock};
pub use crypto::{CryptoError, SymKey};
pub use emitter::{Emitter, Subscription};
pub use hlc::HLC;
pub use storage_config::StorageConfig;
pub use thread_id::{ThreadId, ThreadIdError, Variant};
pub use types::{Hash, LogId, PubKey, Signature, TypesError};
