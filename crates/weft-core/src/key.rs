// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity-map key types.
//!
//! Every key is ultimately `(entity, time)`. Shader and instance keys add a
//! discriminator for the few cases where one host entity legitimately owns
//! several renderer nodes at the same time (layer composites, instance slots).

use core::fmt::Debug;
use core::hash::Hash;

use weft_port::{EntityRef, TimeKey};

/// Time component of a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyTime {
    /// Translation at a specific frame.
    At(TimeKey),
    /// The entity is known not to vary with time; one node serves every frame.
    Invariant,
}

impl KeyTime {
    /// Suffix used in renderer node names.
    pub(crate) fn name_suffix(self) -> String {
        match self {
            Self::At(t) => format!(".{t}"),
            Self::Invariant => String::new(),
        }
    }
}

/// Key of the general node map and of regular shader nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    /// Host entity.
    pub entity: EntityRef,
    /// Translation time.
    pub time: KeyTime,
}

impl NodeKey {
    /// Key at a specific frame.
    pub fn at(entity: EntityRef, time: TimeKey) -> Self {
        Self {
            entity,
            time: KeyTime::At(time),
        }
    }
}

/// Key of the shader-specific map.
///
/// `target` is `None` for the shader's own node and names the overridden
/// parameter for a layer-composite node owned by a layer entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderKey {
    /// Shader, image source or layer entity.
    pub entity: EntityRef,
    /// Translation time.
    pub time: KeyTime,
    /// Target parameter of a layer composite.
    pub target: Option<String>,
}

impl ShaderKey {
    /// Key of a shader's (or image source's) own node.
    pub fn main(key: NodeKey) -> Self {
        Self {
            entity: key.entity,
            time: key.time,
            target: None,
        }
    }

    /// Key of the composite node a layer contributes for `target`.
    pub fn composite(layer: NodeKey, target: &str) -> Self {
        Self {
            entity: layer.entity,
            time: layer.time,
            target: Some(target.to_owned()),
        }
    }
}

/// Key of the group/instance map: one entry per master primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    /// Instance entity and time.
    pub instance: NodeKey,
    /// Index of the master primitive this instance node points at.
    pub slot: u32,
}

/// Common surface of identity-map keys.
pub trait MapKey: Clone + Eq + Hash + Debug {
    /// Host entity the key belongs to.
    fn entity(&self) -> EntityRef;
}

impl MapKey for NodeKey {
    fn entity(&self) -> EntityRef {
        self.entity
    }
}

impl MapKey for ShaderKey {
    fn entity(&self) -> EntityRef {
        self.entity
    }
}

impl MapKey for InstanceKey {
    fn entity(&self) -> EntityRef {
        self.instance.entity
    }
}
