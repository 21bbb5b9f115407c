//! Weave Store
//!
//! An embedded, event-sourced JSON document store. Entities live in
//! schema-checked [`Collection`]s and change only through locked
//! [`WriteBatch`]es. A commit becomes a list of [`Action`]s, which an
//! [`EventCodec`] turns into time-stamped [`Event`]s plus a replicable
//! [`Block`](weave_model::Block). The single-flight [`Dispatcher`] hands
//! events to the [`Reducer`]s that fold them into committed state.
//!
//! ```ignore
//! let store = Store::open(StoreConfig::default()).await?;
//! let people = store.register_schema("Person", schema)?;
//! let ids = people.create(vec![json!({"firstName": "Adam"})]).await?;
//! ```

mod action;
mod batch;
pub mod codec;
mod collection;
mod config;
mod dispatcher;
mod error;
mod event;
pub mod proto;
mod query;
mod schema;
mod store;

pub use action::{Action, ActionHandler, ActionType};
pub use batch::{ReadBatch, WriteBatch};
pub use codec::{EventCodec, JsonPatcher, LastWriteWins};
pub use collection::{entity_key, Collection, ID_FIELD};
pub use config::{StoreConfig, DEFAULT_LOCK_TIMEOUT};
pub use dispatcher::{Dispatcher, Reducer};
pub use error::{CodecError, StoreError};
pub use event::{Event, Op, OpType, ReduceAction};
pub use query::Query;
pub use schema::SchemaValidator;
pub use store::{LocalWriter, StateReducer, Store};
