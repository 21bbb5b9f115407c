//! Collection - a named, schema-checked set of JSON entities
//!
//! Entities live under `collection/<name>/<ID>`. All access goes through
//! batches: [`ReadBatch`] shares the collection lock, [`WriteBatch`] holds it
//! exclusively and hands its staged actions to the collection's
//! [`ActionHandler`] on commit. The one-shot helpers here wrap a single
//! batch each.

use crate::action::ActionHandler;
use crate::batch::{ReadBatch, WriteBatch};
use crate::error::StoreError;
use crate::query::Query;
use crate::schema::SchemaValidator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use weave_storage::{Datastore, Key};

/// Identity field of every entity.
pub const ID_FIELD: &str = "ID";

const COLLECTION_PREFIX: &str = "collection";

/// Datastore key of an entity.
pub fn entity_key(collection: &str, id: &str) -> Key {
    Key::new(COLLECTION_PREFIX).child(collection).child(id)
}

pub(crate) struct CollectionInner {
    pub(crate) name: String,
    pub(crate) validator: SchemaValidator,
    pub(crate) ds: Arc<dyn Datastore>,
    pub(crate) lock: Arc<RwLock<()>>,
    pub(crate) handler: Arc<dyn ActionHandler>,
    pub(crate) lock_timeout: Option<Duration>,
}

/// Cheap, clonable handle to one collection.
#[derive(Clone)]
pub struct Collection {
    pub(crate) inner: Arc<CollectionInner>,
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        validator: SchemaValidator,
        ds: Arc<dyn Datastore>,
        handler: Arc<dyn ActionHandler>,
        lock_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                name: name.to_string(),
                validator,
                ds,
                lock: Arc::new(RwLock::new(())),
                handler,
                lock_timeout,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Value {
        self.inner.validator.schema()
    }

    pub fn read_batch(&self) -> ReadBatch {
        ReadBatch::new(self.clone())
    }

    pub fn write_batch(&self) -> WriteBatch {
        WriteBatch::new(self.clone())
    }

    // ==================== Committed state ====================

    pub(crate) fn committed(&self, id: &str) -> Result<Option<Value>, StoreError> {
        match self.inner.ds.get(&entity_key(&self.inner.name, id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn committed_has(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.ds.has(&entity_key(&self.inner.name, id))?)
    }

    /// Every committed entity keyed by ID.
    pub(crate) fn committed_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let parent = Key::new(COLLECTION_PREFIX).child(&self.inner.name);
        self.inner
            .ds
            .query(&parent.children_prefix())?
            .into_iter()
            .map(|(key, bytes)| {
                let id = key.strip_parent(&parent).unwrap_or_else(|| key.name()).to_string();
                Ok((id, serde_json::from_slice(&bytes)?))
            })
            .collect()
    }

    // ==================== One-shot helpers ====================

    async fn started_write(&self) -> Result<WriteBatch, StoreError> {
        let mut batch = self.write_batch();
        batch.start(self.inner.lock_timeout).await?;
        Ok(batch)
    }

    async fn started_read(&self) -> Result<ReadBatch, StoreError> {
        let mut batch = self.read_batch();
        batch.start(self.inner.lock_timeout).await?;
        Ok(batch)
    }

    /// Create and commit `entities`. Returns their IDs.
    pub async fn create(&self, entities: Vec<Value>) -> Result<Vec<String>, StoreError> {
        let mut batch = self.started_write().await?;
        let ids = batch.create(entities)?;
        batch.commit().await?;
        Ok(ids)
    }

    pub async fn save(&self, entities: Vec<Value>) -> Result<(), StoreError> {
        let mut batch = self.started_write().await?;
        batch.save(entities)?;
        batch.commit().await
    }

    pub async fn delete(&self, ids: &[&str]) -> Result<(), StoreError> {
        let mut batch = self.started_write().await?;
        batch.delete(ids)?;
        batch.commit().await
    }

    pub async fn get(&self, id: &str) -> Result<Value, StoreError> {
        self.started_read().await?.get(id)
    }

    pub async fn has(&self, id: &str) -> Result<bool, StoreError> {
        self.started_read().await?.has(id)
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.started_read().await?.find(query)
    }

    /// Create one typed entity. Its `ID` field is assigned if blank.
    pub async fn create_typed<T: Serialize>(&self, entity: &T) -> Result<String, StoreError> {
        let ids = self.create(vec![serde_json::to_value(entity)?]).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidEntity("no entity created".to_string()))
    }

    pub async fn get_typed<T: DeserializeOwned>(&self, id: &str) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.get(id).await?)?)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.inner.name).finish_non_exhaustive()
    }
}
