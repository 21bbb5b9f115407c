//! Generic datastore layer shared by the books, the dispatcher and the
//! collections.
//!
//! - `Datastore`: ordered key-value interface with atomic batches and
//!   prefix queries.
//! - `RedbDatastore`: file-backed implementation.
//! - `MemoryDatastore`: BTreeMap-backed implementation for tests and
//!   ephemeral stores.

mod datastore;
mod key;
mod memory;
mod redb_store;

pub use datastore::{open_datastore, Batch, BatchOp, Datastore, DatastoreError, Entry};
pub use key::Key;
pub use memory::MemoryDatastore;
pub use redb_store::{RedbDatastore, TABLE_DATA};

// Canonical home is weave_model::StorageConfig
pub use weave_model::StorageConfig;
