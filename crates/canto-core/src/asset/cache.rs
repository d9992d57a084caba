//! Short-lived cache of raw asset metadata.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Caches the raw serialized JSON last seen for each asset identifier.
///
/// A pure read-through/write-through accelerator, never the source of
/// truth: populated from search hits and direct fetches, invalidated
/// explicitly by webhooks and batch commands, with no expiry of its own.
/// Concurrent writers to one key are last-write-wins, which is safe since
/// entries are idempotent snapshots of the same remote object.
#[derive(Debug, Default)]
pub struct AssetProxyCache {
    entries: Mutex<HashMap<String, String>>,
}

impl AssetProxyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the raw JSON for an asset identifier.
    pub fn set(&self, identifier: &str, json: impl Into<String>) {
        self.lock().insert(identifier.to_string(), json.into());
    }

    /// Returns the cached JSON for an identifier, if present.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<String> {
        self.lock().get(identifier).cloned()
    }

    /// Whether an entry exists for the identifier.
    #[must_use]
    pub fn has(&self, identifier: &str) -> bool {
        self.lock().contains_key(identifier)
    }

    /// Removes the entry for an identifier, returning how many entries
    /// were removed (0 or 1).
    pub fn remove(&self, identifier: &str) -> usize {
        usize::from(self.lock().remove(identifier).is_some())
    }

    /// Removes all entries.
    pub fn flush(&self) {
        self.lock().clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
