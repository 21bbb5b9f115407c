use std::time::Duration;
use weave_model::StorageConfig;

/// Lock timeout used by the one-shot collection helpers.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub storage: StorageConfig,
    /// `None` waits for collection locks indefinitely.
    pub lock_timeout: Option<Duration>,
    /// Keep every dispatched event under `/dispatcher/`.
    pub persist_events: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::InMemory,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
            persist_events: false,
        }
    }
}

impl StoreConfig {
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_persisted_events(mut self, persist: bool) -> Self {
        self.persist_events = persist;
        self
    }
}
