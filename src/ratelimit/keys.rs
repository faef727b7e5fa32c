//! Registry of caller API keys.

use std::collections::HashSet;

/// Normalize a caller key for lookup. Keys are case-insensitive; whitespace
/// is significant.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// The static set of API keys allowed to call the service.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: HashSet<String>,
}

impl KeyRegistry {
    /// Build a registry from configured keys. Configured entries are trimmed
    /// and blank ones are ignored.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| normalize_key(k.as_ref().trim()))
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    /// Whether `key` is a registered caller key.
    ///
    /// `key` is expected to be normalized already.
    pub fn is_valid_key(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.contains(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
