use super::{decode_observing, encode_with, required, EventCodec};
use crate::action::{Action, ActionType};
use crate::error::CodecError;
use crate::event::{Event, OpType, ReduceAction};
use serde_json::Value;
use std::sync::Arc;
use weave_model::hlc::HlcGenerator;
use weave_model::{Block, Clock};

/// Create and Save both carry the whole new document; reducing a Save
/// replaces prior state outright.
#[derive(Debug, Default)]
pub struct LastWriteWins {
    clock: HlcGenerator,
}

impl LastWriteWins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock: HlcGenerator::new(clock) }
    }

    fn patch_for(action: &Action) -> Result<Option<Value>, CodecError> {
        match action.kind {
            ActionType::Create | ActionType::Save => {
                Ok(Some(required(&action.current, action.kind, &action.entity_id)?.clone()))
            }
            ActionType::Delete => Ok(None),
        }
    }
}

impl EventCodec for LastWriteWins {
    fn encode(&self, actions: &[Action]) -> Result<(Vec<Event>, Block), CodecError> {
        encode_with(&self.clock, actions, Self::patch_for)
    }

    fn decode(&self, block: &Block) -> Result<Vec<Event>, CodecError> {
        decode_observing(&self.clock, block)
    }

    fn reduce(&self, _state: Option<Value>, event: &Event) -> Result<(Option<Value>, ReduceAction), CodecError> {
        let next = match event.op.kind {
            OpType::Create | OpType::Save => {
                Some(required(&event.op.patch, event.op.kind.into(), &event.entity_id)?.clone())
            }
            OpType::Delete => None,
        };
        Ok((next, ReduceAction::for_event(event)))
    }
}
