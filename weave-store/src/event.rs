//! Events - the time-stamped, replicable form of actions.

use crate::action::{Action, ActionType};
use crate::error::CodecError;
use crate::proto::EventMessage;
use serde_json::Value;
use weave_model::HLC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Create,
    Save,
    Delete,
}

impl OpType {
    pub fn code(self) -> i32 {
        match self {
            OpType::Create => 0,
            OpType::Save => 1,
            OpType::Delete => 2,
        }
    }
}

impl TryFrom<i32> for OpType {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OpType::Create),
            1 => Ok(OpType::Save),
            2 => Ok(OpType::Delete),
            other => Err(CodecError::UnknownOperation(other)),
        }
    }
}

impl From<ActionType> for OpType {
    fn from(kind: ActionType) -> Self {
        match kind {
            ActionType::Create => OpType::Create,
            ActionType::Save => OpType::Save,
            ActionType::Delete => OpType::Delete,
        }
    }
}

impl From<OpType> for ActionType {
    fn from(kind: OpType) -> Self {
        match kind {
            OpType::Create => ActionType::Create,
            OpType::Save => ActionType::Save,
            OpType::Delete => ActionType::Delete,
        }
    }
}

/// What to do to one entity. The patch shape depends on the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub kind: OpType,
    pub entity_id: String,
    pub patch: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: HLC,
    pub entity_id: String,
    pub collection: String,
    pub op: Op,
}

impl Event {
    pub fn new(time: HLC, action: &Action, patch: Option<Value>) -> Self {
        Self {
            time,
            entity_id: action.entity_id.clone(),
            collection: action.collection.clone(),
            op: Op { kind: action.kind.into(), entity_id: action.entity_id.clone(), patch },
        }
    }

    pub fn to_message(&self) -> Result<EventMessage, CodecError> {
        Ok(EventMessage {
            time: self.time.to_bytes().to_vec(),
            entity_id: self.entity_id.clone(),
            collection: self.collection.clone(),
            op_type: self.op.kind.code(),
            patch: self.op.patch.as_ref().map(serde_json::to_vec).transpose()?,
        })
    }

    pub fn from_message(msg: EventMessage) -> Result<Self, CodecError> {
        let time = HLC::from_bytes(&msg.time).ok_or(CodecError::InvalidTime(msg.time.len()))?;
        let kind = OpType::try_from(msg.op_type)?;
        let patch = msg.patch.map(|p| serde_json::from_slice(&p)).transpose()?;
        Ok(Self {
            time,
            entity_id: msg.entity_id.clone(),
            collection: msg.collection,
            op: Op { kind, entity_id: msg.entity_id, patch },
        })
    }
}

/// Emitted for every event a reducer applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceAction {
    pub kind: ActionType,
    pub collection: String,
    pub entity_id: String,
}

impl ReduceAction {
    pub fn for_event(event: &Event) -> Self {
        Self {
            kind: event.op.kind.into(),
            collection: event.collection.clone(),
            entity_id: event.entity_id.clone(),
        }
    }
}
