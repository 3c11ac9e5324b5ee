// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-download metadata stash.
//!
//! The download orchestrator stores caller-provided metadata here so the
//! metadata-enrichment pipeline can pick it up when the finished file
//! appears on disk. Entries are dual-keyed: once under the composite
//! download id and once under the bare filename, because file-system events
//! only know the filename, not the original request context.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Process-lifetime metadata store shared between the download
/// orchestrator and the enrichment collaborators.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash metadata under a key, replacing any previous entry.
    pub fn stash(&self, key: impl Into<String>, metadata: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), metadata);
    }

    /// Read metadata without consuming it.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// Remove and return metadata, typically once enrichment has run.
    pub fn take(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key)
    }

    /// Number of stashed entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// True when nothing is stashed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stash_and_get() {
        let store = MetadataStore::new();
        store.stash("peer:Music\\track.flac", json!({"title": "Track"}));
        assert_eq!(
            store.get("peer:Music\\track.flac"),
            Some(json!({"title": "Track"}))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_consumes_the_entry() {
        let store = MetadataStore::new();
        store.stash("track.flac", json!({"artist": "Someone"}));
        assert_eq!(store.take("track.flac"), Some(json!({"artist": "Someone"})));
        assert_eq!(store.take("track.flac"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn stash_overwrites() {
        let store = MetadataStore::new();
        store.stash("k", json!(1));
        store.stash("k", json!(2));
        assert_eq!(store.get("k"), Some(json!(2)));
    }
}
