// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Opaque identifiers for host entities and renderer nodes.

use core::fmt;

/// Stable identifier for a host-scene entity (object, shader, image source,
/// parameter owner).
///
/// Equality and hashing are by id only. Holding an `EntityRef` does not keep
/// the entity alive; the host may delete it at any time and report the
/// removal through [`HostEvent::EntityRemoved`](crate::HostEvent::EntityRemoved).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef(pub u64);

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Handle to a node inside the renderer's own graph.
///
/// Handles are minted by [`RenderGraph::create_node`](crate::RenderGraph::create_node)
/// and are never reused by a conforming renderer within one session.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
