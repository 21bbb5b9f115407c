//! MetadataBook - typed per-thread metadata

use crate::error::LogStoreError;
use crate::keys::{thread_key, META};
use crate::proto::{metadata_value::Kind, MetadataValue};
use prost::Message;
use std::sync::Arc;
use weave_model::ThreadId;
use weave_storage::{Batch, Datastore, Key};

pub struct MetadataBook {
    ds: Arc<dyn Datastore>,
}

impl MetadataBook {
    pub fn new(ds: Arc<dyn Datastore>) -> Self {
        Self { ds }
    }

    fn entry(thread: &ThreadId, key: &str) -> Key {
        thread_key(META, thread).child(key)
    }

    fn put(&self, thread: &ThreadId, key: &str, kind: Kind) -> Result<(), LogStoreError> {
        let value = MetadataValue { kind: Some(kind) };
        Ok(self.ds.put(&Self::entry(thread, key), &value.encode_to_vec())?)
    }

    fn get(&self, thread: &ThreadId, key: &str) -> Result<Kind, LogStoreError> {
        let bytes = self
            .ds
            .get(&Self::entry(thread, key))?
            .ok_or_else(|| LogStoreError::NotFound(format!("metadata {key} for {thread}")))?;
        MetadataValue::decode(bytes.as_slice())?
            .kind
            .ok_or_else(|| LogStoreError::WrongType { key: key.to_string() })
    }

    pub fn put_int(&self, thread: &ThreadId, key: &str, value: i64) -> Result<(), LogStoreError> {
        self.put(thread, key, Kind::Int(value))
    }

    pub fn get_int(&self, thread: &ThreadId, key: &str) -> Result<i64, LogStoreError> {
        match self.get(thread, key)? {
            Kind::Int(v) => Ok(v),
            _ => Err(LogStoreError::WrongType { key: key.to_string() }),
        }
    }

    pub fn put_bool(&self, thread: &ThreadId, key: &str, value: bool) -> Result<(), LogStoreError> {
        self.put(thread, key, Kind::Bool(value))
    }

    pub fn get_bool(&self, thread: &ThreadId, key: &str) -> Result<bool, LogStoreError> {
        match self.get(thread, key)? {
            Kind::Bool(v) => Ok(v),
            _ => Err(LogStoreError::WrongType { key: key.to_string() }),
        }
    }

    pub fn put_string(&self, thread: &ThreadId, key: &str, value: &str) -> Result<(), LogStoreError> {
        self.put(thread, key, Kind::Str(value.to_string()))
    }

    pub fn get_string(&self, thread: &ThreadId, key: &str) -> Result<String, LogStoreError> {
        match self.get(thread, key)? {
            Kind::Str(v) => Ok(v),
            _ => Err(LogStoreError::WrongType { key: key.to_string() }),
        }
    }

    pub fn put_bytes(&self, thread: &ThreadId, key: &str, value: &[u8]) -> Result<(), LogStoreError> {
        self.put(thread, key, Kind::Bytes(value.to_vec()))
    }

    pub fn get_bytes(&self, thread: &ThreadId, key: &str) -> Result<Vec<u8>, LogStoreError> {
        match self.get(thread, key)? {
            Kind::Bytes(v) => Ok(v),
            _ => Err(LogStoreError::WrongType { key: key.to_string() }),
        }
    }

    pub fn clear_thread(&self, thread: &ThreadId) -> Result<(), LogStoreError> {
        let mut batch = Batch::new();
        for key in self.ds.query_keys(&thread_key(META, thread).children_prefix())? {
            batch.delete(key);
        }
        Ok(self.ds.write(batch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::Variant;
    use weave_storage::MemoryDatastore;

    #[test]
    fn test_typed_values() {
        let book = MetadataBook::new(Arc::new(MemoryDatastore::new()));
        let thread = ThreadId::new(Variant::Raw);

        book.put_int(&thread, "count", -3).unwrap();
        book.put_bool(&thread, "public", true).unwrap();
        book.put_string(&thread, "name", "notes").unwrap();
        book.put_bytes(&thread, "blob", &[1, 2, 3]).unwrap();

        assert_eq!(book.get_int(&thread, "count").unwrap(), -3);
        assert!(book.get_bool(&thread, "public").unwrap());
        assert_eq!(book.get_string(&thread, "name").unwrap(), "notes");
        assert_eq!(book.get_bytes(&thread, "blob").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let book = MetadataBook::new(Arc::new(MemoryDatastore::new()));
        let thread = ThreadId::new(Variant::Raw);

        assert!(matches!(book.get_int(&thread, "nope"), Err(LogStoreError::NotFound(_))));

        book.put_string(&thread, "name", "notes").unwrap();
        assert!(matches!(
            book.get_int(&thread, "name"),
            Err(LogStoreError::WrongType { key }) if key == "name"
        ));

        book.clear_thread(&thread).unwrap();
        assert!(matches!(book.get_string(&thread, "name"), Err(LogStoreError::NotFound(_))));
    }
}
