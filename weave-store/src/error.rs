use std::time::Duration;
use thiserror::Error;
use weave_storage::DatastoreError;

/// Errors from translating between actions, events and state.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unknown action type: {0}")]
    UnknownAction(i32),

    #[error("Unknown operation type: {0}")]
    UnknownOperation(i32),

    /// An action or event lacks the document its type requires.
    #[error("Missing entity for {kind} of {entity_id}")]
    MissingEntity { kind: &'static str, entity_id: String },

    /// A patch arrived for an entity with no prior state.
    #[error("No state to patch for {0}")]
    MissingState(String),

    #[error("Patch error: {0}")]
    Patch(#[from] json_patch::PatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Invalid event time: {0} bytes")]
    InvalidTime(usize),
}

/// Errors surfaced by collections, batches, the dispatcher and the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity already exists: {0}")]
    ExistingEntity(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity deleted in this batch: {0}")]
    EntityDeleted(String),

    #[error("Batch not started")]
    NotStarted,

    #[error("Batch already started")]
    AlreadyStarted,

    #[error("Lock not acquired within {0:?}")]
    AcquireLockTimeout(Duration),

    #[error("Collection already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// A replicated event names a collection this store never registered.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Not a JSON object, or an `ID` that is not a string.
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
