// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered node lists produced by expanding one host container.

use rustc_hash::FxHashMap;
use weft_port::NodeHandle;

use crate::key::KeyTime;

/// Key of a group: container name and translation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// Unique host name of the container.
    pub container: String,
    /// Translation time.
    pub time: KeyTime,
}

impl GroupKey {
    /// Convenience constructor.
    pub fn new(container: impl Into<String>, time: KeyTime) -> Self {
        Self {
            container: container.into(),
            time,
        }
    }
}

/// Registry of container expansions.
///
/// Erasure is per node: removing one primitive leaves its group in place.
/// Only [`GroupRegistry::erase_group`] drops a whole entry.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: FxHashMap<GroupKey, Vec<NodeHandle>>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the expansion of `key`, replacing any previous list.
    pub fn push(&mut self, key: GroupKey, nodes: Vec<NodeHandle>) {
        self.groups.insert(key, nodes);
    }

    /// Returns the ordered nodes of `key`.
    pub fn get_nodes(&self, key: &GroupKey) -> Option<&[NodeHandle]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Removes `handle` from every group; returns how many lists contained it.
    pub fn erase_node_everywhere(&mut self, handle: NodeHandle) -> usize {
        let mut hits = 0;
        for nodes in self.groups.values_mut() {
            let before = nodes.len();
            nodes.retain(|n| *n != handle);
            if nodes.len() != before {
                hits += 1;
            }
        }
        hits
    }

    /// Drops a whole group and returns its nodes.
    pub fn erase_group(&mut self, key: &GroupKey) -> Option<Vec<NodeHandle>> {
        self.groups.remove(key)
    }

    /// Returns every group key whose container is `container`.
    pub fn keys_for_container(&self, container: &str) -> Vec<GroupKey> {
        self.groups
            .keys()
            .filter(|k| k.container == container)
            .cloned()
            .collect()
    }

    /// Returns `true` if any group lists `handle`.
    pub fn contains_node(&self, handle: NodeHandle) -> bool {
        self.groups.values().any(|nodes| nodes.contains(&handle))
    }

    /// Drops every group.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
