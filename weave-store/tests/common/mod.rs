#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use weave_model::{MockClock, StorageConfig};
use weave_storage::MemoryDatastore;
use weave_store::{JsonPatcher, Store, StoreConfig};

/// Temp dir holding a redb file that outlives individual `Store`s.
pub struct TestDir {
    pub dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("store.redb")
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::default().with_storage(StorageConfig::File(self.db_path()))
    }

    pub async fn open(&self) -> Store {
        Store::open(self.config()).await.expect("failed to open store")
    }
}

/// Route store logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn memory_store() -> Store {
    Store::open(StoreConfig::default()).await.expect("failed to open store")
}

/// In-memory store whose event times come from `clock`.
pub async fn clocked_store(clock: &MockClock) -> Store {
    let codec = Arc::new(JsonPatcher::with_clock(Arc::new(clock.clone())));
    Store::with_codec(Arc::new(MemoryDatastore::new()), codec, StoreConfig::default())
        .await
        .expect("failed to open store")
}

pub fn person_schema() -> Value {
    json!({
        "title": "Person",
        "type": "object",
        "properties": {
            "ID": {"type": "string"},
            "firstName": {"type": "string"},
            "lastName": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["firstName"]
    })
}

pub fn adam() -> Value {
    json!({"ID": "", "firstName": "Adam", "lastName": "Doe", "age": 21})
}
