//! Key layout shared by the books.

use crate::error::LogStoreError;
use weave_model::{LogId, ThreadId};
use weave_storage::Key;

pub(crate) const ADDRS: &str = "/thread/addrs";
pub(crate) const KEYS: &str = "/thread/keys";
pub(crate) const HEADS: &str = "/thread/heads";
pub(crate) const META: &str = "/thread/meta";

pub(crate) fn thread_key(namespace: &str, thread: &ThreadId) -> Key {
    Key::new(namespace).child(thread.to_string())
}

pub(crate) fn log_key(namespace: &str, thread: &ThreadId, log: &LogId) -> Key {
    thread_key(namespace, thread).child(log.to_hex())
}

/// Prefix covering every key of the namespace.
pub(crate) fn namespace_prefix(namespace: &str) -> String {
    format!("{}/", namespace)
}

/// Split `/ns/<thread>/<log>...` into its thread and optional log segment.
/// Segments may carry a `:suffix`, which is stripped.
pub(crate) fn parse_ids(
    namespace: &str,
    key: &Key,
) -> Result<(ThreadId, Option<LogId>), LogStoreError> {
    let rest = key
        .as_str()
        .strip_prefix(&namespace_prefix(namespace))
        .ok_or_else(|| LogStoreError::CorruptKey(key.to_string()))?;
    let mut segments = rest.split('/');
    let thread_segment = segments.next().unwrap_or_default();
    let thread = ThreadId::from_string(strip_suffix(thread_segment))?;
    let log = match segments.next() {
        Some(segment) => Some(LogId::from_hex(strip_suffix(segment))?),
        None => None,
    };
    Ok((thread, log))
}

fn strip_suffix(segment: &str) -> &str {
    segment.split(':').next().unwrap_or(segment)
}
