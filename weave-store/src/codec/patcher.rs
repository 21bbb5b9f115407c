use super::{decode_observing, encode_with, required, EventCodec};
use crate::action::{Action, ActionType};
use crate::error::CodecError;
use crate::event::{Event, OpType, ReduceAction};
use serde_json::Value;
use std::sync::Arc;
use weave_model::hlc::HlcGenerator;
use weave_model::{Block, Clock};

/// Create carries the full entity, Save an RFC 6902 diff, Delete nothing.
#[derive(Debug, Default)]
pub struct JsonPatcher {
    clock: HlcGenerator,
}

impl JsonPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock: HlcGenerator::new(clock) }
    }

    fn patch_for(action: &Action) -> Result<Option<Value>, CodecError> {
        match action.kind {
            ActionType::Create => Ok(Some(required(&action.current, action.kind, &action.entity_id)?.clone())),
            ActionType::Save => {
                let previous = required(&action.previous, action.kind, &action.entity_id)?;
                let current = required(&action.current, action.kind, &action.entity_id)?;
                Ok(Some(serde_json::to_value(json_patch::diff(previous, current))?))
            }
            ActionType::Delete => Ok(None),
        }
    }
}

impl EventCodec for JsonPatcher {
    fn encode(&self, actions: &[Action]) -> Result<(Vec<Event>, Block), CodecError> {
        encode_with(&self.clock, actions, Self::patch_for)
    }

    fn decode(&self, block: &Block) -> Result<Vec<Event>, CodecError> {
        decode_observing(&self.clock, block)
    }

    fn reduce(&self, state: Option<Value>, event: &Event) -> Result<(Option<Value>, ReduceAction), CodecError> {
        let next = match event.op.kind {
            OpType::Create => {
                Some(required(&event.op.patch, ActionType::Create, &event.entity_id)?.clone())
            }
            OpType::Save => {
                let mut doc = state.ok_or_else(|| CodecError::MissingState(event.entity_id.clone()))?;
                let patch = required(&event.op.patch, ActionType::Save, &event.entity_id)?;
                let patch: json_patch::Patch = serde_json::from_value(patch.clone())?;
                json_patch::patch(&mut doc, &patch.0)?;
                Some(doc)
            }
            OpType::Delete => None,
        };
        Ok((next, ReduceAction::for_event(event)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::sample_actions;
    use serde_json::json;

    #[test]
    fn test_save_carries_diff() {
        let (events, _) = JsonPatcher::new().encode(&sample_actions()).unwrap();

        assert_eq!(events[0].op.patch, sample_actions()[0].current);
        let diff = events[1].op.patch.as_ref().unwrap().as_array().unwrap();
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().all(|op| op["path"] == "/age" || op["path"] == "/city"));
        assert_eq!(events[2].op.patch, None);
    }

    #[test]
    fn test_reduce_replays_actions() {
        let codec = JsonPatcher::new();
        let actions = sample_actions();
        let (events, _) = codec.encode(&actions).unwrap();

        let (created, reduced) = codec.reduce(None, &events[0]).unwrap();
        assert_eq!(created, actions[0].current);
        assert_eq!(reduced.kind, ActionType::Create);
        assert_eq!(reduced.entity_id, "a");

        let (saved, _) = codec.reduce(actions[1].previous.clone(), &events[1]).unwrap();
        assert_eq!(saved, actions[1].current);

        let (deleted, reduced) = codec.reduce(actions[2].previous.clone(), &events[2]).unwrap();
        assert_eq!(deleted, None);
        assert_eq!(reduced.kind, ActionType::Delete);
    }

    #[test]
    fn test_save_without_state_fails() {
        let codec = JsonPatcher::new();
        let (events, _) = codec.encode(&sample_actions()).unwrap();
        assert!(matches!(codec.reduce(None, &events[1]), Err(CodecError::MissingState(id)) if id == "b"));
    }

    #[test]
    fn test_patch_conflict_surfaces() {
        let codec = JsonPatcher::new();
        let (events, _) = codec.encode(&sample_actions()).unwrap();
        // The diff replaces /age, which this state lacks
        let result = codec.reduce(Some(json!({"ID": "b"})), &events[1]);
        assert!(matches!(result, Err(CodecError::Patch(_))));
    }
}
