//! weave-record - the replication wire format
//!
//! A record wraps one event block in three encryption layers:
//!
//! ```text
//! record node  {sig, block, prev?, pub_key}   sealed with the replicator key
//!   └ event node {header, body}               plaintext CIDs only
//!       ├ header {key, time}                  sealed with the read key
//!       └ body                                sealed with the per-event key
//! ```
//!
//! Every link is a BLAKE3 CID of the referenced node's bytes, and `prev`
//! chains the records of one log. Peers holding only the replicator key can
//! check signatures and ordering without learning any content.

mod error;
mod event;
pub mod proto;
mod record;

pub use error::RecordError;
pub use event::{create_event, create_event_at, Event, EventHeader};
pub use proto::WireRecord;
pub use record::{create_record, Record};
