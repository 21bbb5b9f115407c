//! ReadBatch / WriteBatch - locked units of work over one collection
//!
//! Lifecycle: `Pending` until `start` acquires the lock, `Started` while
//! usable, `Finished` after `commit` or `discard`. Operations outside
//! `Started` fail `NotStarted`; starting twice fails `AlreadyStarted`. A
//! failed start (timeout) leaves the batch `Pending` and the lock untouched.
//!
//! A write batch keeps at most one staged action per entity. Later
//! operations fold into it: a save after a create stays a create, a delete
//! after a create removes the create entirely.

use crate::action::{Action, ActionType};
use crate::collection::{Collection, ID_FIELD};
use crate::error::StoreError;
use crate::query::Query;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

enum BatchState<G> {
    Pending,
    Started(G),
    Finished,
}

impl<G> BatchState<G> {
    fn ensure_pending(&self) -> Result<(), StoreError> {
        match self {
            BatchState::Pending => Ok(()),
            _ => Err(StoreError::AlreadyStarted),
        }
    }

    fn ensure_started(&self) -> Result<(), StoreError> {
        match self {
            BatchState::Started(_) => Ok(()),
            _ => Err(StoreError::NotStarted),
        }
    }
}

async fn acquire<G>(lock: impl Future<Output = G>, timeout: Option<Duration>) -> Result<G, StoreError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, lock)
            .await
            .map_err(|_| StoreError::AcquireLockTimeout(limit)),
        None => Ok(lock.await),
    }
}

/// The `ID` of an entity, which must be a JSON object.
fn entity_id(entity: &Value) -> Result<Option<&str>, StoreError> {
    let object = entity
        .as_object()
        .ok_or_else(|| StoreError::InvalidEntity("entity is not a JSON object".to_string()))?;
    match object.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(other) => Err(StoreError::InvalidEntity(format!("{ID_FIELD} must be a string, got {other}"))),
    }
}

// ==================== ReadBatch ====================

/// Shared-lock view of committed state.
pub struct ReadBatch {
    collection: Collection,
    state: BatchState<OwnedRwLockReadGuard<()>>,
}

impl ReadBatch {
    pub(crate) fn new(collection: Collection) -> Self {
        Self { collection, state: BatchState::Pending }
    }

    /// Take the shared lock, waiting at most `timeout` if given.
    pub async fn start(&mut self, timeout: Option<Duration>) -> Result<(), StoreError> {
        self.state.ensure_pending()?;
        let lock = self.collection.inner.lock.clone();
        let guard = acquire(lock.read_owned(), timeout).await?;
        self.state = BatchState::Started(guard);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Value, StoreError> {
        self.state.ensure_started()?;
        self.collection
            .committed(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn has(&self, id: &str) -> Result<bool, StoreError> {
        self.state.ensure_started()?;
        self.collection.committed_has(id)
    }

    /// Matching entities ordered by ID.
    pub fn find(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.state.ensure_started()?;
        Ok(self
            .collection
            .committed_all()?
            .into_values()
            .filter(|doc| query.matches(doc))
            .collect())
    }

    /// Release the lock. The batch cannot be used afterwards.
    pub fn discard(&mut self) {
        self.state = BatchState::Finished;
    }
}

// ==================== WriteBatch ====================

/// Exclusive-lock unit of staged mutations.
pub struct WriteBatch {
    collection: Collection,
    state: BatchState<OwnedRwLockWriteGuard<()>>,
    staged: Vec<Action>,
}

/// What the batch currently believes about one entity.
enum View {
    /// Staged create or save with its document.
    Staged(Value),
    /// Staged delete.
    Deleted,
    /// Nothing staged; consult committed state.
    Untouched,
}

impl WriteBatch {
    pub(crate) fn new(collection: Collection) -> Self {
        Self { collection, state: BatchState::Pending, staged: Vec::new() }
    }

    /// Take the exclusive lock, waiting at most `timeout` if given.
    pub async fn start(&mut self, timeout: Option<Duration>) -> Result<(), StoreError> {
        self.state.ensure_pending()?;
        let lock = self.collection.inner.lock.clone();
        let guard = acquire(lock.write_owned(), timeout).await?;
        self.state = BatchState::Started(guard);
        Ok(())
    }

    fn staged_index(&self, id: &str) -> Option<usize> {
        self.staged.iter().position(|a| a.entity_id == id)
    }

    fn view(&self, id: &str) -> View {
        match self.staged_index(id).map(|i| &self.staged[i]) {
            Some(action) if action.kind == ActionType::Delete => View::Deleted,
            Some(action) => action.current.clone().map_or(View::Deleted, View::Staged),
            None => View::Untouched,
        }
    }

    /// Stage creates. Blank IDs get a fresh UUID. Every entity is checked
    /// before any is staged.
    pub fn create(&mut self, entities: Vec<Value>) -> Result<Vec<String>, StoreError> {
        self.state.ensure_started()?;

        let mut prepared = Vec::with_capacity(entities.len());
        let mut seen = HashSet::new();
        for mut entity in entities {
            let id = match entity_id(&entity)? {
                Some(id) => id.to_string(),
                None => {
                    let id = Uuid::new_v4().to_string();
                    if let Some(object) = entity.as_object_mut() {
                        object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                    }
                    id
                }
            };
            self.collection.inner.validator.validate(&entity)?;

            let staged = matches!(self.view(&id), View::Staged(_));
            if staged || !seen.insert(id.clone()) || self.collection.committed_has(&id)? {
                return Err(StoreError::ExistingEntity(id));
            }
            prepared.push((id, entity));
        }

        let collection = self.collection.name().to_string();
        let mut ids = Vec::with_capacity(prepared.len());
        for (id, entity) in prepared {
            self.staged.push(Action::create(&collection, &id, entity));
            ids.push(id);
        }
        Ok(ids)
    }

    /// Stage updates of existing entities, validating each.
    pub fn save(&mut self, entities: Vec<Value>) -> Result<(), StoreError> {
        self.state.ensure_started()?;

        let mut prepared = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = entity_id(&entity)?
                .ok_or_else(|| StoreError::InvalidEntity(format!("save requires an {ID_FIELD}")))?
                .to_string();
            self.collection.inner.validator.validate(&entity)?;
            match self.view(&id) {
                View::Deleted => return Err(StoreError::EntityDeleted(id)),
                View::Untouched if !self.collection.committed_has(&id)? => {
                    return Err(StoreError::NotFound(id))
                }
                _ => {}
            }
            prepared.push((id, entity));
        }

        let collection = self.collection.name().to_string();
        for (id, entity) in prepared {
            match self.staged_index(&id) {
                Some(i) => self.staged[i].current = Some(entity),
                None => {
                    let previous = self
                        .collection
                        .committed(&id)?
                        .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                    self.staged.push(Action::save(&collection, &id, previous, entity));
                }
            }
        }
        Ok(())
    }

    /// Stage deletes. Deleting an entity created in this batch unstages the
    /// create instead.
    pub fn delete(&mut self, ids: &[&str]) -> Result<(), StoreError> {
        self.state.ensure_started()?;

        for &id in ids {
            match self.view(id) {
                View::Deleted => return Err(StoreError::EntityDeleted(id.to_string())),
                View::Untouched if !self.collection.committed_has(id)? => {
                    return Err(StoreError::NotFound(id.to_string()))
                }
                _ => {}
            }
        }

        let collection = self.collection.name().to_string();
        for &id in ids {
            match self.staged_index(id) {
                Some(i) if self.staged[i].kind == ActionType::Create => {
                    self.staged.remove(i);
                }
                Some(i) => {
                    let action = &mut self.staged[i];
                    action.kind = ActionType::Delete;
                    action.current = None;
                }
                None => {
                    let previous = self
                        .collection
                        .committed(id)?
                        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                    self.staged.push(Action::delete(&collection, id, previous));
                }
            }
        }
        Ok(())
    }

    /// Staged state first, then committed. A staged delete fails
    /// `EntityDeleted`.
    pub fn get(&self, id: &str) -> Result<Value, StoreError> {
        self.state.ensure_started()?;
        match self.view(id) {
            View::Staged(doc) => Ok(doc),
            View::Deleted => Err(StoreError::EntityDeleted(id.to_string())),
            View::Untouched => self
                .collection
                .committed(id)?
                .ok_or_else(|| StoreError::NotFound(id.to_string())),
        }
    }

    pub fn has(&self, id: &str) -> Result<bool, StoreError> {
        self.state.ensure_started()?;
        match self.view(id) {
            View::Staged(_) => Ok(true),
            View::Deleted => Ok(false),
            View::Untouched => self.collection.committed_has(id),
        }
    }

    /// Committed state overlaid with staged actions, ordered by ID.
    pub fn find(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.state.ensure_started()?;
        let mut docs = self.collection.committed_all()?;
        for action in &self.staged {
            match &action.current {
                Some(doc) if action.kind != ActionType::Delete => {
                    docs.insert(action.entity_id.clone(), doc.clone());
                }
                _ => {
                    docs.remove(&action.entity_id);
                }
            }
        }
        Ok(docs.into_values().filter(|doc| query.matches(doc)).collect())
    }

    /// Actions waiting for commit.
    pub fn staged(&self) -> &[Action] {
        &self.staged
    }

    /// Hand the staged actions to the collection's handler, then release
    /// the lock. Nothing staged means no handler call.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        self.state.ensure_started()?;
        let actions = std::mem::take(&mut self.staged);

        let result = if actions.is_empty() {
            Ok(())
        } else {
            debug!(collection = %self.collection.name(), actions = actions.len(), "Committing batch");
            self.collection.inner.handler.handle(actions).await
        };

        self.state = BatchState::Finished;
        result
    }

    /// Drop staged actions and release the lock.
    pub fn discard(&mut self) {
        self.staged.clear();
        self.state = BatchState::Finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionHandler;
    use crate::collection::entity_key;
    use crate::schema::SchemaValidator;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use weave_storage::{Datastore, MemoryDatastore};

    #[derive(Default)]
    struct Recorder {
        commits: Mutex<Vec<Vec<Action>>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        async fn handle(&self, actions: Vec<Action>) -> Result<(), StoreError> {
            self.commits.lock().unwrap().push(actions);
            Ok(())
        }
    }

    fn person_collection() -> (Collection, Arc<Recorder>, Arc<MemoryDatastore>) {
        let ds = Arc::new(MemoryDatastore::new());
        let recorder = Arc::new(Recorder::default());
        let validator = SchemaValidator::new(json!({
            "type": "object",
            "properties": {"firstName": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["firstName"]
        }))
        .unwrap();
        let collection = Collection::new("Person", validator, ds.clone(), recorder.clone(), None);
        (collection, recorder, ds)
    }

    fn commit_directly(ds: &MemoryDatastore, doc: Value) {
        let id = doc["ID"].as_str().unwrap().to_string();
        ds.put(&entity_key("Person", &id), &serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let (collection, _, _) = person_collection();
        let mut batch = collection.write_batch();
        assert!(matches!(batch.get("x"), Err(StoreError::NotStarted)));

        batch.start(None).await.unwrap();
        assert!(matches!(batch.start(None).await, Err(StoreError::AlreadyStarted)));
        batch.commit().await.unwrap();

        assert!(matches!(batch.has("x"), Err(StoreError::NotStarted)));
        assert!(matches!(batch.start(None).await, Err(StoreError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_rejects_duplicates() {
        let (collection, recorder, _) = person_collection();
        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();

        let ids = batch.create(vec![json!({"firstName": "Adam"}), json!({"ID": "", "firstName": "Eve"})]).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| !id.is_empty()));
        assert_eq!(batch.get(&ids[0]).unwrap()["ID"], json!(ids[0]));

        let dup = batch.create(vec![json!({"ID": "same", "firstName": "A"}), json!({"ID": "same", "firstName": "B"})]);
        assert!(matches!(dup, Err(StoreError::ExistingEntity(id)) if id == "same"));
        // Nothing from the failed call was staged
        assert!(!batch.has("same").unwrap());

        assert!(matches!(batch.create(vec![json!({"age": 3})]), Err(StoreError::Validation(_))));
        assert!(matches!(batch.create(vec![json!([1, 2])]), Err(StoreError::InvalidEntity(_))));
        assert!(matches!(
            batch.create(vec![json!({"ID": 7, "firstName": "A"})]),
            Err(StoreError::InvalidEntity(_))
        ));

        batch.commit().await.unwrap();
        let commits = recorder.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].iter().all(|a| a.kind == ActionType::Create));
    }

    #[tokio::test]
    async fn test_second_create_of_staged_id_fails() {
        let (collection, recorder, _) = person_collection();
        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();

        let ids = batch.create(vec![json!({"ID": "same", "firstName": "A"})]).unwrap();
        assert_eq!(ids, vec!["same"]);
        let again = batch.create(vec![json!({"ID": "same", "firstName": "B"})]);
        assert!(matches!(again, Err(StoreError::ExistingEntity(id)) if id == "same"));
        // The first create is untouched
        assert_eq!(batch.get("same").unwrap()["firstName"], json!("A"));

        batch.commit().await.unwrap();
        assert_eq!(recorder.commits.lock().unwrap()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_create_of_committed_id_fails() {
        let (collection, _, ds) = person_collection();
        commit_directly(&ds, json!({"ID": "1", "firstName": "Adam"}));

        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();
        let result = batch.create(vec![json!({"ID": "1", "firstName": "Adam"})]);
        assert!(matches!(result, Err(StoreError::ExistingEntity(id)) if id == "1"));
    }

    #[tokio::test]
    async fn test_create_then_delete_stages_nothing() {
        let (collection, recorder, _) = person_collection();
        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();

        let ids = batch.create(vec![json!({"firstName": "Adam"})]).unwrap();
        batch.delete(&[ids[0].as_str()]).unwrap();
        assert!(!batch.has(&ids[0]).unwrap());
        assert!(batch.staged().is_empty());

        batch.commit().await.unwrap();
        assert!(recorder.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_delete_of_committed_entity() {
        let (collection, recorder, ds) = person_collection();
        commit_directly(&ds, json!({"ID": "1", "firstName": "Adam"}));

        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();
        batch.save(vec![json!({"ID": "1", "firstName": "Adam", "age": 21})]).unwrap();
        assert_eq!(batch.get("1").unwrap()["age"], json!(21));

        batch.delete(&["1"]).unwrap();
        assert!(matches!(batch.get("1"), Err(StoreError::EntityDeleted(_))));
        assert!(matches!(batch.delete(&["1"]), Err(StoreError::EntityDeleted(_))));
        assert!(matches!(
            batch.save(vec![json!({"ID": "1", "firstName": "Adam"})]),
            Err(StoreError::EntityDeleted(_))
        ));
        assert!(matches!(batch.delete(&["missing"]), Err(StoreError::NotFound(_))));

        batch.commit().await.unwrap();
        let commits = recorder.commits.lock().unwrap();
        assert_eq!(commits[0].len(), 1);
        let action = &commits[0][0];
        assert_eq!(action.kind, ActionType::Delete);
        assert_eq!(action.previous, Some(json!({"ID": "1", "firstName": "Adam"})));
    }

    #[tokio::test]
    async fn test_find_overlays_staged_changes() {
        let (collection, _, ds) = person_collection();
        commit_directly(&ds, json!({"ID": "1", "firstName": "Adam", "age": 21}));
        commit_directly(&ds, json!({"ID": "2", "firstName": "Eve", "age": 30}));

        let mut batch = collection.write_batch();
        batch.start(None).await.unwrap();
        batch.create(vec![json!({"ID": "3", "firstName": "Cain", "age": 5})]).unwrap();
        batch.delete(&["2"]).unwrap();

        let found = batch.find(&Query::all()).unwrap();
        let ids: Vec<&str> = found.iter().filter_map(|d| d["ID"].as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let adults = batch.find(&Query::new(json!({"age": {"$gte": 18}}))).unwrap();
        assert_eq!(adults.len(), 1);
    }

    #[tokio::test]
    async fn test_write_lock_times_out_and_is_released() {
        let (collection, _, _) = person_collection();
        let mut holder = collection.write_batch();
        holder.start(None).await.unwrap();

        let mut reader = collection.read_batch();
        let timeout = Duration::from_millis(20);
        assert!(matches!(reader.start(Some(timeout)).await, Err(StoreError::AcquireLockTimeout(t)) if t == timeout));

        holder.discard();
        // Failed start left the reader pending
        reader.start(Some(timeout)).await.unwrap();
        assert!(!reader.has("1").unwrap());
    }
}
