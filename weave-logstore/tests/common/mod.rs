use std::sync::Arc;
use tempfile::TempDir;
use weave_logstore::LogStore;
use weave_model::{MockClock, StorageConfig};
use weave_storage::{open_datastore, Datastore};

/// A redb-backed LogStore on a temp dir with a controllable clock.
pub struct TestLogStore {
    pub store: LogStore,
    pub clock: MockClock,
    pub ds: Arc<dyn Datastore>,
    pub _dir: TempDir,
}

impl TestLogStore {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::File(dir.path().join("logstore.redb"));
        let ds = open_datastore(&config).expect("failed to open datastore");
        let clock = MockClock::new(1_700_000_000_000);
        let store = LogStore::new(ds.clone(), Arc::new(clock.clone()));

        Self { store, clock, ds, _dir: dir }
    }
}
