//! Dispatcher - single-flight fan-out of event batches to reducers
//!
//! `register` and `dispatch` take the same async mutex, so at most one
//! dispatch runs per dispatcher and registration never interleaves with it.
//! Within a dispatch every reducer runs concurrently; the first error aborts
//! the wait and is returned. Effects already applied by other reducers stay
//! applied.

use crate::error::{CodecError, StoreError};
use crate::event::Event;
use crate::proto::EventMessage;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use prost::Message;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use weave_storage::{Batch, Datastore, Key};

/// Namespace of the persisted dispatch log.
const DISPATCHER_PREFIX: &str = "/dispatcher";

/// Applies a batch of events to some state.
#[async_trait]
pub trait Reducer: Send + Sync {
    async fn reduce(&self, events: &[Event]) -> Result<(), StoreError>;
}

pub struct Dispatcher {
    reducers: Mutex<Vec<Arc<dyn Reducer>>>,
    log: Option<Arc<dyn Datastore>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self { reducers: Mutex::new(Vec::new()), log: None }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that records every dispatched event in `ds` before
    /// handing it to the reducers.
    pub fn with_datastore(ds: Arc<dyn Datastore>) -> Self {
        Self { reducers: Mutex::new(Vec::new()), log: Some(ds) }
    }

    pub async fn register(&self, reducer: Arc<dyn Reducer>) {
        self.reducers.lock().await.push(reducer);
    }

    pub async fn reducer_count(&self) -> usize {
        self.reducers.lock().await.len()
    }

    fn event_key(event: &Event) -> Key {
        Key::new(DISPATCHER_PREFIX)
            .child(hex::encode(event.time.to_bytes()))
            .child(&event.collection)
            .child(&event.entity_id)
    }

    fn persist(ds: &dyn Datastore, events: &[Event]) -> Result<(), StoreError> {
        let mut batch = Batch::new();
        for event in events {
            batch.put(Self::event_key(event), event.to_message()?.encode_to_vec());
        }
        Ok(ds.write(batch)?)
    }

    /// Hand `events` to every reducer. Holds the dispatch lock until all
    /// reducers finish or one fails.
    pub async fn dispatch(&self, events: &[Event]) -> Result<(), StoreError> {
        let reducers = self.reducers.lock().await;

        if let Some(ds) = &self.log {
            Self::persist(ds.as_ref(), events)?;
        }

        debug!(events = events.len(), reducers = reducers.len(), "Dispatching events");
        try_join_all(reducers.iter().map(|r| r.reduce(events)))
            .await
            .inspect_err(|e| warn!(error = %e, "Reducer failed"))?;
        Ok(())
    }

    /// Every persisted event in time order. Empty without a datastore.
    pub async fn events(&self) -> Result<Vec<Event>, StoreError> {
        let Some(ds) = &self.log else {
            return Ok(Vec::new());
        };
        let prefix = Key::new(DISPATCHER_PREFIX).children_prefix();
        ds.query(&prefix)?
            .into_iter()
            .map(|(_, bytes)| {
                let msg = EventMessage::decode(bytes.as_slice()).map_err(CodecError::from)?;
                Ok(Event::from_message(msg)?)
            })
            .collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("persistent", &self.log.is_some()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use weave_model::HLC;
    use weave_storage::MemoryDatastore;

    struct SleepyReducer {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reducer for SleepyReducer {
        async fn reduce(&self, _events: &[Event]) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingReducer;

    #[async_trait]
    impl Reducer for FailingReducer {
        async fn reduce(&self, events: &[Event]) -> Result<(), StoreError> {
            Err(StoreError::NotFound(events[0].entity_id.clone()))
        }
    }

    fn event(time: HLC, id: &str) -> Event {
        event_in("Person", time, id)
    }

    fn event_in(collection: &str, time: HLC, id: &str) -> Event {
        let action = Action::create(collection, id, json!({"ID": id}));
        Event::new(time, &action, action.current.clone())
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_are_serialized() {
        let delay = Duration::from_millis(50);
        let dispatcher = Dispatcher::new();
        let reducer = Arc::new(SleepyReducer { delay, calls: AtomicUsize::new(0) });
        dispatcher.register(reducer.clone()).await;

        let events = vec![event(HLC::new(1, 0), "a")];
        let started = Instant::now();
        let (a, b) = tokio::join!(dispatcher.dispatch(&events), dispatcher.dispatch(&events));
        a.unwrap();
        b.unwrap();

        assert!(started.elapsed() >= delay * 2);
        assert_eq!(reducer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_error_propagates_and_lock_is_released() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(FailingReducer)).await;

        let events = vec![event(HLC::new(1, 0), "a")];
        assert!(matches!(dispatcher.dispatch(&events).await, Err(StoreError::NotFound(id)) if id == "a"));
        // Lock was released: registration still goes through
        dispatcher.register(Arc::new(FailingReducer)).await;
        assert_eq!(dispatcher.reducer_count().await, 2);
    }

    #[tokio::test]
    async fn test_persisted_events_replay_in_time_order() {
        let dispatcher = Dispatcher::with_datastore(Arc::new(MemoryDatastore::new()));
        let late = vec![event(HLC::new(300, 0), "c")];
        let early = vec![event(HLC::new(100, 0), "a"), event(HLC::new(100, 1), "b")];

        dispatcher.dispatch(&late).await.unwrap();
        dispatcher.dispatch(&early).await.unwrap();

        let ids: Vec<String> = dispatcher.events().await.unwrap().into_iter().map(|e| e.entity_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(Dispatcher::new().events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persisted_events_keep_collections_apart() {
        let dispatcher = Dispatcher::with_datastore(Arc::new(MemoryDatastore::new()));
        let time = HLC::new(100, 0);
        dispatcher
            .dispatch(&[event_in("Person", time, "x"), event_in("Pet", time, "x")])
            .await
            .unwrap();

        let collections: Vec<String> =
            dispatcher.events().await.unwrap().into_iter().map(|e| e.collection).collect();
        assert_eq!(collections, vec!["Person", "Pet"]);
    }
}
