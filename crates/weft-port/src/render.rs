// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer node-graph surface.

use thiserror::Error;

use crate::ident::NodeHandle;
use crate::value::{Value, ValueType};

/// Errors reported by a [`RenderGraph`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The requested node type is unknown or unavailable.
    #[error("unknown node type: {0}")]
    UnknownType(String),
    /// The handle does not name a live node.
    #[error("unknown node: {0}")]
    UnknownNode(NodeHandle),
    /// The node has no parameter of that name.
    #[error("node {node} has no parameter {parameter}")]
    UnknownParameter {
        /// Target node.
        node: NodeHandle,
        /// Missing parameter.
        parameter: String,
    },
    /// A backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Native type of a renderer parameter, used to choose the binding strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// A plain value slot that may also be linked to another node's output.
    Value(ValueType),
    /// A reference to another node; bound by reference, never by link.
    NodeRef,
    /// A plain typed array.
    Array(ValueType),
    /// A switch table: the slot holds an array of node references and the
    /// named side parameter holds the matching element indices.
    IndexedTable {
        /// Name of the side index array parameter.
        index: String,
    },
}

/// Schema entry for one renderer parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Native type.
    pub ty: ParamType,
}

impl ParamSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Schema of a renderer node type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEntry {
    /// Renderer type name.
    pub type_name: String,
    /// Declared parameters.
    pub params: Vec<ParamSpec>,
}

impl NodeEntry {
    /// Returns the schema entry for `name`.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Mutation and schema surface of the renderer's node graph.
///
/// Node lifetime belongs to the renderer. The translator destroys only the
/// nodes it created, and only after purging them from its own maps.
pub trait RenderGraph {
    /// Creates a node of `type_name` named `name`.
    ///
    /// Returns [`RenderError::UnknownType`] if the type cannot be instantiated.
    fn create_node(&mut self, type_name: &str, name: &str) -> Result<NodeHandle, RenderError>;

    /// Destroys a node. Links and references pointing at it become dangling
    /// unless the caller unbinds them first.
    fn destroy_node(&mut self, node: NodeHandle) -> Result<(), RenderError>;

    /// Sets a plain value (or a by-reference binding via [`Value::Node`]).
    fn set_parameter(
        &mut self,
        node: NodeHandle,
        parameter: &str,
        value: Value,
    ) -> Result<(), RenderError>;

    /// Links `source`'s output into `dest.parameter`, replacing any existing link.
    fn link(
        &mut self,
        source: NodeHandle,
        output: Option<&str>,
        dest: NodeHandle,
        parameter: &str,
    ) -> Result<(), RenderError>;

    /// Removes whatever feeds `dest.parameter` (link or node reference),
    /// restoring its default. A no-op when nothing is bound.
    fn unlink(&mut self, dest: NodeHandle, parameter: &str) -> Result<(), RenderError>;

    /// Returns the renderer type of a live node.
    fn node_type(&self, node: NodeHandle) -> Option<String>;

    /// Returns the schema entry of `parameter` on `node`.
    fn lookup_node_entry(&self, node: NodeHandle, parameter: &str) -> Option<ParamSpec>;

    /// Destroys every node in the renderer scene.
    fn clear(&mut self);

    /// Asks the renderer to stop sampling the graph before it is mutated.
    fn pause(&mut self);

    /// Lets the renderer resume sampling after a mutation.
    fn resume(&mut self);
}
