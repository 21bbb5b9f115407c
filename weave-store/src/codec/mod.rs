//! Event codecs - translate actions into events and events into state
//!
//! A codec is a capability the store composes at construction:
//!
//! - [`JsonPatcher`]: saves carry an RFC 6902 diff of previous to current.
//! - [`LastWriteWins`]: saves carry the whole new document.
//!
//! Both share the block format: the prost encoding of the event list,
//! addressed by its BLAKE3 hash.

mod lww;
mod patcher;

pub use lww::LastWriteWins;
pub use patcher::JsonPatcher;

use crate::action::{Action, ActionType};
use crate::error::CodecError;
use crate::event::{Event, ReduceAction};
use crate::proto::EventBlock;
use prost::Message;
use serde_json::Value;
use tracing::warn;
use weave_model::hlc::HlcGenerator;
use weave_model::Block;

pub trait EventCodec: Send + Sync {
    /// Translate a batch of actions into events plus the block replicating
    /// them. Fails as a whole; no partial result.
    fn encode(&self, actions: &[Action]) -> Result<(Vec<Event>, Block), CodecError>;

    /// Events carried by a block produced by `encode`.
    fn decode(&self, block: &Block) -> Result<Vec<Event>, CodecError>;

    /// Apply one event to the entity's prior state (`None` if absent).
    fn reduce(&self, state: Option<Value>, event: &Event) -> Result<(Option<Value>, ReduceAction), CodecError>;
}

/// Deterministic block over `events`.
pub fn encode_block(events: &[Event]) -> Result<Block, CodecError> {
    let events = events.iter().map(Event::to_message).collect::<Result<Vec<_>, _>>()?;
    Ok(Block::new(EventBlock { events }.encode_to_vec()))
}

pub fn decode_block(block: &Block) -> Result<Vec<Event>, CodecError> {
    EventBlock::decode(block.data())?
        .events
        .into_iter()
        .map(Event::from_message)
        .collect()
}

/// Stamp each action with a fresh time and the patch `patch_for` builds.
pub(crate) fn encode_with<F>(
    clock: &HlcGenerator,
    actions: &[Action],
    patch_for: F,
) -> Result<(Vec<Event>, Block), CodecError>
where
    F: Fn(&Action) -> Result<Option<Value>, CodecError>,
{
    let events = actions
        .iter()
        .map(|action| Ok(Event::new(clock.next(), action, patch_for(action)?)))
        .collect::<Result<Vec<_>, CodecError>>()?;
    let block = encode_block(&events)?;
    Ok((events, block))
}

/// Decode a block and fold its times into the local clock. Times too far
/// ahead of the local wall clock are not folded in.
pub(crate) fn decode_observing(clock: &HlcGenerator, block: &Block) -> Result<Vec<Event>, CodecError> {
    let events = decode_block(block)?;
    for event in &events {
        if !clock.observe(&event.time) {
            warn!(time = %event.time, entity = %event.entity_id, "Ignoring event time beyond drift limit");
        }
    }
    Ok(events)
}

fn required<'a>(doc: &'a Option<Value>, kind: ActionType, entity_id: &str) -> Result<&'a Value, CodecError> {
    doc.as_ref().ok_or_else(|| CodecError::MissingEntity {
        kind: match kind {
            ActionType::Create => "create",
            ActionType::Save => "save",
            ActionType::Delete => "delete",
        },
        entity_id: entity_id.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// One action of each kind on distinct entities.
    pub(crate) fn sample_actions() -> Vec<Action> {
        vec![
            Action::create("Person", "a", json!({"ID": "a", "firstName": "Adam", "age": 21})),
            Action::save(
                "Person",
                "b",
                json!({"ID": "b", "firstName": "Beth", "age": 30}),
                json!({"ID": "b", "firstName": "Beth", "age": 31, "city": "Oslo"}),
            ),
            Action::delete("Person", "c", json!({"ID": "c", "firstName": "Carl"})),
        ]
    }

    #[test]
    fn test_decode_of_encode_matches_events() {
        let codecs: Vec<Box<dyn EventCodec>> =
            vec![Box::new(JsonPatcher::new()), Box::new(LastWriteWins::new())];
        for codec in codecs {
            let (events, block) = codec.encode(&sample_actions()).unwrap();
            assert_eq!(events.len(), 3);
            assert!(block.verify());
            assert_eq!(codec.decode(&block).unwrap(), events);
        }
    }

    #[test]
    fn test_event_times_increase() {
        let (events, _) = JsonPatcher::new().encode(&sample_actions()).unwrap();
        assert!(events.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_missing_document_fails_whole_call() {
        let mut actions = sample_actions();
        actions[1].current = None;
        assert!(matches!(
            JsonPatcher::new().encode(&actions),
            Err(CodecError::MissingEntity { kind: "save", .. })
        ));
    }

    #[test]
    fn test_decode_leaves_far_future_times_out_of_the_clock() {
        use std::sync::Arc;
        use weave_model::hlc::DEFAULT_MAX_DRIFT_MS;
        use weave_model::{MockClock, HLC};

        let clock = MockClock::new(10_000);
        let codec = JsonPatcher::with_clock(Arc::new(clock.clone()));
        let action = Action::create("Person", "r", json!({"ID": "r"}));
        let far = HLC::new(10_000 + DEFAULT_MAX_DRIFT_MS + 1, 0);
        let block = encode_block(&[Event::new(far, &action, action.current.clone())]).unwrap();

        assert_eq!(codec.decode(&block).unwrap()[0].time, far);
        let (events, _) = codec.encode(&sample_actions()).unwrap();
        assert_eq!(events[0].time, HLC::new(10_000, 0));
    }
}
