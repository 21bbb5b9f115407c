//! Key - slash-separated datastore key.

use std::fmt;

/// Hierarchical key such as `/thread/heads/<thread>/<log>`.
///
/// Keys order lexicographically by their string form, which is the order
/// prefix queries return them in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl Into<String>) -> Self {
        Key(raw.into())
    }

    /// Append a `/segment`.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut raw = self.0.clone();
        if !raw.is_empty() && !raw.ends_with('/') {
            raw.push('/');
        }
        raw.push_str(segment.as_ref());
        Key(raw)
    }

    /// Append a `:suffix` (used for typed entries under one parent).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Key(format!("{}:{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Prefix string for querying every key below this one.
    pub fn children_prefix(&self) -> String {
        if self.0.ends_with('/') {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// The remainder of this key below `parent`, if it is a descendant.
    pub fn strip_parent(&self, parent: &Key) -> Option<&str> {
        self.0.strip_prefix(&parent.children_prefix())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key(raw)
    }
}
