use std::path::PathBuf;

/// Configuration for where to store data.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    /// File-backed redb database at the given path.
    File(PathBuf),
    /// In-memory storage (no filesystem). Useful for tests.
    #[default]
    InMemory,
}
