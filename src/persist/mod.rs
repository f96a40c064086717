// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod snapshot;
mod store;

use std::sync::Arc;

use tracing::{debug, warn};

pub use snapshot::Snapshot;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Best-effort snapshot persistence.
///
/// Every failure is logged and swallowed: a broken store leaves the player
/// working in memory only.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Adapter over a fresh in-memory store
    pub fn in_memory(key: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), key)
    }

    pub fn load(&self) -> Option<Snapshot> {
        let bytes = match self.store.get(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %self.key, "No saved session");
                return None;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Could not read saved session");
                return None;
            }
        };

        match Snapshot::from_json(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring unreadable saved session");
                None
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) {
        let result = snapshot
            .to_json()
            .and_then(|json| self.store.set(&self.key, &json));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Could not save session");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Could not clear saved session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use std::collections::BTreeMap;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk on fire".to_string()))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("disk on fire".to_string()))
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            current_episode_id: Some("E1".to_string()),
            current_time_seconds: 120.0,
            episode_progress: BTreeMap::from([("E1".to_string(), 120.0)]),
            ..Default::default()
        }
    }

    #[test]
    fn save_then_load_returns_the_snapshot() {
        let adapter = PersistenceAdapter::in_memory("podcast-store");

        adapter.save(&snapshot());

        assert_eq!(adapter.load(), Some(snapshot()));
    }

    #[test]
    fn clear_forgets_the_snapshot() {
        let adapter = PersistenceAdapter::in_memory("podcast-store");
        adapter.save(&snapshot());

        adapter.clear();

        assert_eq!(adapter.load(), None);
    }

    #[test]
    fn corrupt_data_loads_as_none() {
        let store = Arc::new(MemoryStore::new());
        store.set("podcast-store", b"\xff\xfe garbage").unwrap();
        let adapter = PersistenceAdapter::new(store, "podcast-store");

        assert_eq!(adapter.load(), None);
    }

    #[test]
    fn broken_store_degrades_to_noop() {
        let adapter = PersistenceAdapter::new(Arc::new(BrokenStore), "podcast-store");

        adapter.save(&snapshot());
        adapter.clear();

        assert_eq!(adapter.load(), None);
    }
}
