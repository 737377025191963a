// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Keyed store from `(entity, time)` to renderer node handles.

use rustc_hash::FxHashMap;
use tracing::debug;
use weft_port::{EntityRef, NodeHandle};

use crate::key::MapKey;

/// At-most-once translation cache.
///
/// Owns the *mapping* only; the renderer owns the nodes. A reverse index
/// (`handle -> keys`) is maintained on every insert/erase so that
/// [`IdentityMap::erase_by_handle`] costs `O(keys for that handle)` instead of
/// a sweep over every entry.
#[derive(Debug, Clone)]
pub struct IdentityMap<K: MapKey> {
    /// Forward mapping.
    entries: FxHashMap<K, NodeHandle>,
    /// Reverse index of `handle -> keys`.
    by_handle: FxHashMap<NodeHandle, Vec<K>>,
}

impl<K: MapKey> Default for IdentityMap<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            by_handle: FxHashMap::default(),
        }
    }
}

impl<K: MapKey> IdentityMap<K> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure lookup.
    pub fn find(&self, key: &K) -> Option<NodeHandle> {
        self.entries.get(key).copied()
    }

    /// Inserts `key -> handle`.
    ///
    /// Refuses (returns `false`) if `key` is already present: overwriting would
    /// orphan the previous node. Callers are expected to [`find`](Self::find)
    /// first, so a refusal is a contract violation logged at debug level.
    pub fn insert(&mut self, key: K, handle: NodeHandle) -> bool {
        if let Some(existing) = self.entries.get(&key) {
            debug!(?key, %existing, rejected = %handle, "identity conflict; insert ignored");
            return false;
        }
        self.by_handle.entry(handle).or_default().push(key.clone());
        self.entries.insert(key, handle);
        true
    }

    /// Removes one entry and returns its handle.
    pub fn erase(&mut self, key: &K) -> Option<NodeHandle> {
        let handle = self.entries.remove(key)?;
        if let Some(keys) = self.by_handle.get_mut(&handle) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.by_handle.remove(&handle);
            }
        }
        Some(handle)
    }

    /// Removes every entry whose value is `handle`; returns the removed keys.
    pub fn erase_by_handle(&mut self, handle: NodeHandle) -> Vec<K> {
        let keys = self.by_handle.remove(&handle).unwrap_or_default();
        for key in &keys {
            self.entries.remove(key);
        }
        keys
    }

    /// Drops all entries without touching renderer nodes.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_handle.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if any entry maps to `handle`.
    pub fn contains_handle(&self, handle: NodeHandle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    /// Returns every key owned by `entity`, at any time. Linear in the map size.
    pub fn keys_for_entity(&self, entity: EntityRef) -> Vec<K> {
        self.entries
            .keys()
            .filter(|k| k.entity() == entity)
            .cloned()
            .collect()
    }

    /// Iterates over `(key, handle)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, NodeHandle)> {
        self.entries.iter().map(|(k, h)| (k, *h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NodeKey;
    use weft_port::TimeKey;

    fn key(entity: u64, frame: f64) -> NodeKey {
        NodeKey::at(EntityRef(entity), TimeKey::frame(frame))
    }

    #[test]
    fn insert_refuses_to_overwrite() {
        let mut map = IdentityMap::new();
        assert!(map.insert(key(1, 1.0), NodeHandle(10)));
        assert!(!map.insert(key(1, 1.0), NodeHandle(11)));
        assert_eq!(map.find(&key(1, 1.0)), Some(NodeHandle(10)));
        assert!(!map.contains_handle(NodeHandle(11)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn same_entity_at_other_time_is_a_distinct_key() {
        let mut map = IdentityMap::new();
        map.insert(key(1, 1.0), NodeHandle(10));
        map.insert(key(1, 2.0), NodeHandle(20));
        assert_eq!(map.len(), 2);
        let mut keys = map.keys_for_entity(EntityRef(1));
        keys.sort();
        assert_eq!(keys, vec![key(1, 1.0), key(1, 2.0)]);
    }

    #[test]
    fn erase_by_handle_removes_every_alias() {
        let mut map = IdentityMap::new();
        map.insert(key(1, 1.0), NodeHandle(10));
        map.insert(key(1, 2.0), NodeHandle(10));
        map.insert(key(2, 1.0), NodeHandle(20));

        let removed = map.erase_by_handle(NodeHandle(10));
        assert_eq!(removed.len(), 2);
        assert!(!map.contains_handle(NodeHandle(10)));
        assert!(map.iter().all(|(_, h)| h != NodeHandle(10)));
        assert_eq!(map.find(&key(2, 1.0)), Some(NodeHandle(20)));
    }

    #[test]
    fn erase_keeps_reverse_index_in_step() {
        let mut map = IdentityMap::new();
        map.insert(key(1, 1.0), NodeHandle(10));
        map.insert(key(1, 2.0), NodeHandle(10));
        assert_eq!(map.erase(&key(1, 1.0)), Some(NodeHandle(10)));
        assert!(map.contains_handle(NodeHandle(10)));
        assert_eq!(map.erase(&key(1, 2.0)), Some(NodeHandle(10)));
        assert!(!map.contains_handle(NodeHandle(10)));
        assert_eq!(map.erase(&key(1, 2.0)), None);
        assert!(map.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut map = IdentityMap::new();
        map.insert(key(1, 1.0), NodeHandle(10));
        map.clear();
        assert!(map.is_empty());
        assert!(!map.contains_handle(NodeHandle(10)));
    }
}
