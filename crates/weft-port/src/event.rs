// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change notifications delivered by the host.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::ident::EntityRef;
use crate::time::TimeKey;

/// A host-side change notification.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// A new entity was added to the scene.
    EntityAdded {
        /// The new entity.
        entity: EntityRef,
    },
    /// An entity was deleted from the scene.
    EntityRemoved {
        /// The deleted entity. The host may no longer answer queries about it.
        entity: EntityRef,
    },
    /// A parameter value (or the authored type) of an entity changed.
    ValueChanged {
        /// The edited entity.
        entity: EntityRef,
        /// The edited parameter, when known.
        parameter: Option<String>,
        /// Host time at which the edit was reported.
        time: TimeKey,
    },
    /// The active pass / render configuration changed.
    PassChanged,
    /// The scene was closed.
    SceneClosed,
}

impl HostEvent {
    /// Returns the entity the event is about, if any.
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            Self::EntityAdded { entity }
            | Self::EntityRemoved { entity }
            | Self::ValueChanged { entity, .. } => Some(*entity),
            Self::PassChanged | Self::SceneClosed => None,
        }
    }
}

/// Single-threaded queue the host posts [`HostEvent`]s into.
///
/// Clones share one queue: the host keeps a clone and posts from its event
/// callbacks (including re-entrantly, while a translation pass is querying
/// it), and the sync controller drains the other.
#[derive(Clone, Debug, Default)]
pub struct EventInbox {
    queue: Rc<RefCell<VecDeque<HostEvent>>>,
}

impl EventInbox {
    /// Creates an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn post(&self, event: HostEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Removes and returns every queued event in arrival order.
    pub fn drain(&self) -> Vec<HostEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
