// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parameter values exchanged with the host and the renderer.
//!
//! One value type serves both sides of the translator. Host evaluation may
//! yield [`Value::Entity`] (a reference to another host entity, e.g. an
//! instance master); renderer parameters may hold [`Value::Node`] (a by-reference
//! binding to another renderer node). Comparison is structural, which is what
//! the change-detection paths in `weft-core` rely on.

use crate::ident::{EntityRef, NodeHandle};

/// A host or renderer parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Scalar float.
    Float(f32),
    /// Linear RGB color.
    Rgb([f32; 3]),
    /// Linear RGBA color.
    Rgba([f32; 4]),
    /// 3-component vector.
    Vector([f32; 3]),
    /// Row-major 4x4 transform.
    Matrix([[f32; 4]; 4]),
    /// UTF-8 string (names, enums, file paths).
    Str(String),
    /// Host-side reference to another entity.
    Entity(EntityRef),
    /// Renderer-side reference to another node.
    Node(NodeHandle),
    /// Homogeneous array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Identity transform.
    pub const IDENTITY: Value = Value::Matrix([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Returns the value's type tag.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Rgb(_) => ValueType::Rgb,
            Self::Rgba(_) => ValueType::Rgba,
            Self::Vector(_) => ValueType::Vector,
            Self::Matrix(_) => ValueType::Matrix,
            Self::Str(_) => ValueType::Str,
            Self::Entity(_) => ValueType::Entity,
            Self::Node(_) => ValueType::Node,
            Self::Array(_) => ValueType::Array,
        }
    }

    /// Returns the boolean payload, accepting integers as C-style flags.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Returns the integer payload.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a scalar float, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    /// Returns the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the referenced host entity.
    pub fn as_entity(&self) -> Option<EntityRef> {
        match self {
            Self::Entity(e) => Some(*e),
            _ => None,
        }
    }

    /// Returns the referenced renderer node.
    pub fn as_node(&self) -> Option<NodeHandle> {
        match self {
            Self::Node(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the array elements.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns `true` if this value references `node`, directly or inside an array.
    pub fn references_node(&self, node: NodeHandle) -> bool {
        match self {
            Self::Node(n) => *n == node,
            Self::Array(items) => items.iter().any(|v| v.references_node(node)),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<NodeHandle> for Value {
    fn from(v: NodeHandle) -> Self {
        Self::Node(v)
    }
}

impl From<EntityRef> for Value {
    fn from(v: EntityRef) -> Self {
        Self::Entity(v)
    }
}

/// Type tag of a [`Value`], also used by renderer parameter schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// [`Value::Rgb`].
    Rgb,
    /// [`Value::Rgba`].
    Rgba,
    /// [`Value::Vector`].
    Vector,
    /// [`Value::Matrix`].
    Matrix,
    /// [`Value::Str`].
    Str,
    /// [`Value::Entity`].
    Entity,
    /// [`Value::Node`].
    Node,
    /// [`Value::Array`].
    Array,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_node_searches_arrays() {
        let n = NodeHandle(7);
        let v = Value::Array(vec![Value::Node(NodeHandle(1)), Value::Array(vec![Value::Node(n)])]);
        assert!(v.references_node(n));
        assert!(!v.references_node(NodeHandle(2)));
        assert!(!Value::Float(7.0).references_node(n));
    }

    #[test]
    fn int_widens_to_float_and_bool() {
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::Str("x".into()).as_float(), None);
    }
}
