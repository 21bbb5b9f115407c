//! Actions - the staged mutations a write batch hands to its handler.

use crate::error::{CodecError, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Create,
    Save,
    Delete,
}

impl ActionType {
    pub fn code(self) -> i32 {
        match self {
            ActionType::Create => 0,
            ActionType::Save => 1,
            ActionType::Delete => 2,
        }
    }
}

impl TryFrom<i32> for ActionType {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ActionType::Create),
            1 => Ok(ActionType::Save),
            2 => Ok(ActionType::Delete),
            other => Err(CodecError::UnknownAction(other)),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Save => write!(f, "save"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// One entity mutation. `previous` is the committed document (Save,
/// Delete); `current` the new one (Create, Save).
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionType,
    pub entity_id: String,
    pub collection: String,
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

impl Action {
    pub fn create(collection: &str, entity_id: &str, current: Value) -> Self {
        Self {
            kind: ActionType::Create,
            entity_id: entity_id.to_string(),
            collection: collection.to_string(),
            previous: None,
            current: Some(current),
        }
    }

    pub fn save(collection: &str, entity_id: &str, previous: Value, current: Value) -> Self {
        Self {
            kind: ActionType::Save,
            entity_id: entity_id.to_string(),
            collection: collection.to_string(),
            previous: Some(previous),
            current: Some(current),
        }
    }

    pub fn delete(collection: &str, entity_id: &str, previous: Value) -> Self {
        Self {
            kind: ActionType::Delete,
            entity_id: entity_id.to_string(),
            collection: collection.to_string(),
            previous: Some(previous),
            current: None,
        }
    }
}

/// Receives the actions of a committed write batch.
///
/// Called at most once per commit, never with an empty list. Errors
/// propagate to `WriteBatch::commit`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, actions: Vec<Action>) -> Result<(), StoreError>;
}
