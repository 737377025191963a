// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store for settings tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use weft_app_core::{ConfigError, ConfigStore};

/// In-memory [`ConfigStore`] with call counters and injectable failures.
///
/// Clones share one backing map, so a test can hand one clone to a service
/// and inspect the other.
///
/// ```
/// use weft_app_core::ConfigService;
/// use weft_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// service.save("prefs", &serde_json::json!({"curve_samples": 16})).unwrap();
/// assert!(store.contains_key("prefs"));
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryConfigStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    blobs: BTreeMap<String, Vec<u8>>,
    loads: usize,
    saves: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later `load_raw` fail with [`ConfigError::Other`].
    pub fn set_fail_on_load(&self, fail: bool) {
        self.state().fail_on_load = fail;
    }

    /// Make every later `save_raw` fail with [`ConfigError::Other`].
    pub fn set_fail_on_save(&self, fail: bool) {
        self.state().fail_on_save = fail;
    }

    /// Attempted loads, failed ones included.
    pub fn load_count(&self) -> usize {
        self.state().loads
    }

    /// Attempted saves, failed ones included.
    pub fn save_count(&self) -> usize {
        self.state().saves
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state().blobs.keys().cloned().collect()
    }

    /// Whether a blob is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state().blobs.contains_key(key)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut state = self.state();
        state.loads += 1;
        if state.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        state.blobs.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut state = self.state();
        state.saves += 1;
        if state.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        state.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_blobs_and_counters() {
        let a = InMemoryConfigStore::new();
        let b = a.clone();
        a.save_raw("k", b"v").unwrap();
        assert_eq!(b.load_raw("k").unwrap(), b"v");
        assert_eq!((a.save_count(), a.load_count()), (1, 1));
    }

    #[test]
    fn failed_saves_count_but_store_nothing() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_save(true);
        assert!(matches!(store.save_raw("k", b"v"), Err(ConfigError::Other(_))));
        assert_eq!(store.save_count(), 1);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn missing_keys_are_not_found() {
        let store = InMemoryConfigStore::new();
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::NotFound)));
        store.set_fail_on_load(true);
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::Other(_))));
    }
}
