//! Store - collections, codec and dispatcher wired together
//!
//! Write path: a collection's [`WriteBatch`](crate::WriteBatch) commit hands
//! its actions to the [`LocalWriter`], which encodes them with the codec,
//! dispatches the events (the [`StateReducer`] applies them before dispatch
//! returns) and finally emits the encoded block as a local event. Blocks
//! arriving from peers enter through [`Store::apply_block`] and skip the
//! local event.

use crate::action::{Action, ActionHandler};
use crate::codec::{EventCodec, JsonPatcher};
use crate::collection::{entity_key, Collection};
use crate::config::StoreConfig;
use crate::dispatcher::{Dispatcher, Reducer};
use crate::error::StoreError;
use crate::event::{Event, ReduceAction};
use crate::schema::SchemaValidator;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};
use weave_model::{Block, Emitter, Subscription};
use weave_storage::{open_datastore, Batch, Datastore, Key};

const SCHEMA_PREFIX: &str = "/schema";

fn schema_key(name: &str) -> Key {
    Key::new(SCHEMA_PREFIX).child(name)
}

// ==================== StateReducer ====================

/// Folds events into committed entity state through the codec.
pub struct StateReducer {
    ds: Arc<dyn Datastore>,
    codec: Arc<dyn EventCodec>,
    state_changes: Emitter<Vec<ReduceAction>>,
}

impl StateReducer {
    fn load(&self, key: &Key) -> Result<Option<Value>, StoreError> {
        match self.ds.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Reducer for StateReducer {
    /// Events are applied in order against a working copy, so several events
    /// on one entity compose. All resulting puts and deletes land in one
    /// datastore batch.
    async fn reduce(&self, events: &[Event]) -> Result<(), StoreError> {
        let mut working: HashMap<Key, Option<Value>> = HashMap::new();
        let mut order = Vec::new();
        let mut applied = Vec::with_capacity(events.len());

        for event in events {
            let key = entity_key(&event.collection, &event.entity_id);
            let prior = match working.remove(&key) {
                Some(state) => state,
                None => {
                    order.push(key.clone());
                    self.load(&key)?
                }
            };
            let (next, action) = self.codec.reduce(prior, event)?;
            working.insert(key, next);
            applied.push(action);
        }

        let mut batch = Batch::new();
        for key in order {
            match working.remove(&key).flatten() {
                Some(doc) => batch.put(key, serde_json::to_vec(&doc)?),
                None => batch.delete(key),
            };
        }
        self.ds.write(batch)?;

        debug!(events = events.len(), "Reduced events");
        if !applied.is_empty() {
            self.state_changes.emit(applied);
        }
        Ok(())
    }
}

// ==================== LocalWriter ====================

/// Collection action handler: encode, dispatch, announce.
pub struct LocalWriter {
    codec: Arc<dyn EventCodec>,
    dispatcher: Arc<Dispatcher>,
    local_events: Emitter<Block>,
}

#[async_trait]
impl ActionHandler for LocalWriter {
    async fn handle(&self, actions: Vec<Action>) -> Result<(), StoreError> {
        let (events, block) = self.codec.encode(&actions)?;
        self.dispatcher.dispatch(&events).await?;
        debug!(events = events.len(), block = %block.cid(), "Local events committed");
        self.local_events.emit(block);
        Ok(())
    }
}

// ==================== Store ====================

pub struct Store {
    ds: Arc<dyn Datastore>,
    dispatcher: Arc<Dispatcher>,
    reducer: Arc<StateReducer>,
    writer: Arc<LocalWriter>,
    collections: RwLock<BTreeMap<String, Collection>>,
    lock_timeout: Option<Duration>,
    local_events: Emitter<Block>,
    state_changes: Emitter<Vec<ReduceAction>>,
}

impl Store {
    /// Open the datastore `config` names with the JSON-patch codec.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let ds = open_datastore(&config.storage)?;
        Self::with_codec(ds, Arc::new(JsonPatcher::new()), config).await
    }

    /// Build a store over an already open datastore. Collections whose
    /// schemas were registered earlier on `ds` come back.
    pub async fn with_codec(
        ds: Arc<dyn Datastore>,
        codec: Arc<dyn EventCodec>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let dispatcher = Arc::new(if config.persist_events {
            Dispatcher::with_datastore(ds.clone())
        } else {
            Dispatcher::new()
        });

        let state_changes = Emitter::new();
        let local_events = Emitter::new();
        let reducer = Arc::new(StateReducer {
            ds: ds.clone(),
            codec: codec.clone(),
            state_changes: state_changes.clone(),
        });
        dispatcher.register(reducer.clone()).await;

        let writer = Arc::new(LocalWriter {
            codec,
            dispatcher: dispatcher.clone(),
            local_events: local_events.clone(),
        });

        let store = Self {
            ds,
            dispatcher,
            reducer,
            writer,
            collections: RwLock::new(BTreeMap::new()),
            lock_timeout: config.lock_timeout,
            local_events,
            state_changes,
        };
        store.reopen_collections()?;
        Ok(store)
    }

    fn reopen_collections(&self) -> Result<(), StoreError> {
        let parent = Key::new(SCHEMA_PREFIX);
        let persisted = self.ds.query(&parent.children_prefix())?;
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        for (key, bytes) in persisted {
            let Some(name) = key.strip_parent(&parent) else { continue };
            let validator = SchemaValidator::new(serde_json::from_slice(&bytes)?)?;
            collections.insert(name.to_string(), self.build_collection(name, validator));
            info!(collection = %name, "Reopened collection");
        }
        Ok(())
    }

    fn build_collection(&self, name: &str, validator: SchemaValidator) -> Collection {
        Collection::new(name, validator, self.ds.clone(), self.writer.clone(), self.lock_timeout)
    }

    /// Create a collection governed by `schema` and persist the schema.
    pub fn register_schema(&self, name: &str, schema: Value) -> Result<Collection, StoreError> {
        if name.is_empty() || name.contains('/') {
            return Err(StoreError::InvalidCollectionName(name.to_string()));
        }
        let validator = SchemaValidator::new(schema)?;

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        if collections.contains_key(name) {
            return Err(StoreError::AlreadyRegistered(name.to_string()));
        }
        self.ds.put(&schema_key(name), &serde_json::to_vec(validator.schema())?)?;

        let collection = self.build_collection(name, validator);
        collections.insert(name.to_string(), collection.clone());
        info!(collection = %name, "Registered schema");
        Ok(collection)
    }

    pub fn collection(&self, name: &str) -> Option<Collection> {
        self.collections.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Registered collection names, sorted.
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }

    /// Apply events to committed state directly, bypassing the dispatcher.
    pub async fn reduce(&self, events: &[Event]) -> Result<(), StoreError> {
        self.reducer.reduce(events).await
    }

    /// Decode a block produced by a peer and dispatch its events. No local
    /// event is emitted for it. A block touching an unregistered collection
    /// is rejected whole.
    pub async fn apply_block(&self, block: &Block) -> Result<Vec<Event>, StoreError> {
        let events = self.writer.codec.decode(block)?;
        self.check_collections(&events)?;
        self.dispatcher.dispatch(&events).await?;
        debug!(events = events.len(), block = %block.cid(), "Applied remote block");
        Ok(events)
    }

    fn check_collections(&self, events: &[Event]) -> Result<(), StoreError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        for event in events {
            if event.collection.contains('/') {
                return Err(StoreError::InvalidCollectionName(event.collection.clone()));
            }
            if !collections.contains_key(&event.collection) {
                return Err(StoreError::UnknownCollection(event.collection.clone()));
            }
        }
        Ok(())
    }

    /// Blocks of locally committed write batches.
    pub fn subscribe_local_events(&self) -> Subscription<Block> {
        self.local_events.subscribe()
    }

    /// Entity changes after every successful reduce.
    pub fn subscribe_state_changes(&self) -> Subscription<Vec<ReduceAction>> {
        self.state_changes.subscribe()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.ds
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("collections", &self.collections())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LastWriteWins;
    use serde_json::json;
    use weave_storage::MemoryDatastore;

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "properties": {"firstName": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["firstName"]
        })
    }

    #[tokio::test]
    async fn test_register_schema_rules() {
        let store = Store::open(StoreConfig::default()).await.unwrap();
        store.register_schema("Person", person_schema()).unwrap();

        assert!(matches!(
            store.register_schema("Person", person_schema()),
            Err(StoreError::AlreadyRegistered(name)) if name == "Person"
        ));
        assert!(matches!(store.register_schema("", json!({})), Err(StoreError::InvalidCollectionName(_))));
        assert!(matches!(store.register_schema("a/b", json!({})), Err(StoreError::InvalidCollectionName(_))));
        assert!(matches!(store.register_schema("Bad", json!({"type": 3})), Err(StoreError::InvalidSchema(_))));
        assert_eq!(store.collections(), vec!["Person"]);
        assert!(store.collection("Bad").is_none());
    }

    #[tokio::test]
    async fn test_reduce_composes_events_on_one_entity() {
        let ds: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
        let codec = Arc::new(JsonPatcher::new());
        let store = Store::with_codec(ds.clone(), codec.clone(), StoreConfig::default()).await.unwrap();
        let mut changes = store.subscribe_state_changes();

        let before = json!({"ID": "a", "firstName": "Adam"});
        let after = json!({"ID": "a", "firstName": "Adam", "age": 21});
        let (events, _) = codec
            .encode(&[Action::create("Person", "a", before.clone()), Action::save("Person", "a", before, after.clone())])
            .unwrap();
        store.reduce(&events).await.unwrap();

        let stored: Value = serde_json::from_slice(&ds.get(&entity_key("Person", "a")).unwrap().unwrap()).unwrap();
        assert_eq!(stored, after);
        assert_eq!(changes.try_recv().map(|c| c.len()), Some(2));
    }

    #[tokio::test]
    async fn test_last_write_wins_store() {
        let ds: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
        let store = Store::with_codec(ds, Arc::new(LastWriteWins::new()), StoreConfig::default()).await.unwrap();
        let people = store.register_schema("Person", person_schema()).unwrap();

        let ids = people.create(vec![json!({"firstName": "Adam", "age": 21})]).await.unwrap();
        let replacement = json!({"ID": ids[0], "firstName": "Adam"});
        people.save(vec![replacement.clone()]).await.unwrap();

        assert_eq!(people.get(&ids[0]).await.unwrap(), replacement);
    }
}
