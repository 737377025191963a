// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock renderer for headless testing of the translator.
//!
//! `MockRenderer` keeps the node graph in plain maps and counts pause
//! traffic, so tests can check graph shape, dangling references and
//! pause/resume pairing without a real renderer.

use std::collections::{BTreeMap, HashMap};

use weft_port::{NodeEntry, NodeHandle, ParamSpec, RenderError, RenderGraph, Value};

/// One live node.
#[derive(Clone, Debug, PartialEq)]
pub struct MockNode {
    /// Renderer type.
    pub type_name: String,
    /// Node name.
    pub name: String,
    /// Plain values (including [`Value::Node`] references).
    pub params: BTreeMap<String, Value>,
    /// Incoming links: parameter to `(source, output)`.
    pub links: BTreeMap<String, (NodeHandle, Option<String>)>,
}

/// In-memory [`RenderGraph`].
#[derive(Debug, Default)]
pub struct MockRenderer {
    /// Live nodes.
    pub nodes: BTreeMap<NodeHandle, MockNode>,
    /// Registered node types.
    pub schemas: HashMap<String, NodeEntry>,
    /// Every handle ever created, in order.
    pub created: Vec<NodeHandle>,
    /// Every handle destroyed through `destroy_node`, in order.
    pub destroyed: Vec<NodeHandle>,
    /// Current pause nesting.
    pub pause_depth: u32,
    /// Deepest pause nesting observed.
    pub max_pause_depth: u32,
    /// Number of `pause` calls.
    pub pause_calls: u32,
    /// Number of `resume` calls.
    pub resume_calls: u32,
    /// Mutations issued while the renderer was not paused.
    pub unpaused_mutations: u32,
    /// Number of `clear` calls.
    pub clear_count: u32,
    next: u64,
}

impl MockRenderer {
    /// Create an empty renderer with no node types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node type.
    pub fn register(&mut self, type_name: &str, params: Vec<ParamSpec>) {
        self.schemas.insert(
            type_name.to_owned(),
            NodeEntry {
                type_name: type_name.to_owned(),
                params,
            },
        );
    }

    /// Unregisters a node type, so later creations fail with `UnknownType`.
    pub fn unregister(&mut self, type_name: &str) {
        self.schemas.remove(type_name);
    }

    fn mutated(&mut self) {
        if self.pause_depth == 0 {
            self.unpaused_mutations += 1;
        }
    }

    fn declared(&self, node: NodeHandle, parameter: &str) -> Result<(), RenderError> {
        let live = self
            .nodes
            .get(&node)
            .ok_or(RenderError::UnknownNode(node))?;
        let declared = self
            .schemas
            .get(&live.type_name)
            .is_some_and(|s| s.param(parameter).is_some());
        if declared {
            Ok(())
        } else {
            Err(RenderError::UnknownParameter {
                node,
                parameter: parameter.to_owned(),
            })
        }
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.nodes.len()
    }

    /// Live node by handle.
    pub fn node(&self, node: NodeHandle) -> Option<&MockNode> {
        self.nodes.get(&node)
    }

    /// Plain value of `node.parameter`.
    pub fn param(&self, node: NodeHandle, parameter: &str) -> Option<&Value> {
        self.nodes.get(&node)?.params.get(parameter)
    }

    /// Source node linked into `node.parameter`.
    pub fn link_of(&self, node: NodeHandle, parameter: &str) -> Option<NodeHandle> {
        self.nodes.get(&node)?.links.get(parameter).map(|(s, _)| *s)
    }

    /// What feeds `node.parameter`: the linked source, else a referenced node.
    pub fn input_of(&self, node: NodeHandle, parameter: &str) -> Option<NodeHandle> {
        self.link_of(node, parameter)
            .or_else(|| self.param(node, parameter).and_then(Value::as_node))
    }

    /// Live nodes of `type_name`, in handle order.
    pub fn nodes_of_type(&self, type_name: &str) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.type_name == type_name)
            .map(|(h, _)| *h)
            .collect()
    }

    /// Live node named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name == name)
            .map(|(h, _)| *h)
    }

    /// `(dest, parameter, missing source)` for every link or reference that
    /// points at a node which no longer exists.
    pub fn dangling_references(&self) -> Vec<(NodeHandle, String, NodeHandle)> {
        let mut out = Vec::new();
        for (dest, node) in &self.nodes {
            for (parameter, (source, _)) in &node.links {
                if !self.nodes.contains_key(source) {
                    out.push((*dest, parameter.clone(), *source));
                }
            }
            for (parameter, value) in &node.params {
                collect_dead(value, &self.nodes, &mut |source| {
                    out.push((*dest, parameter.clone(), source));
                });
            }
        }
        out
    }

    /// Returns `true` when every `pause` was matched by a `resume`.
    pub fn pause_balanced(&self) -> bool {
        self.pause_depth == 0 && self.pause_calls == self.resume_calls
    }
}

fn collect_dead(
    value: &Value,
    live: &BTreeMap<NodeHandle, MockNode>,
    found: &mut dyn FnMut(NodeHandle),
) {
    match value {
        Value::Node(h) if !live.contains_key(h) => found(*h),
        Value::Array(items) => {
            for item in items {
                collect_dead(item, live, found);
            }
        }
        _ => {}
    }
}

impl RenderGraph for MockRenderer {
    fn create_node(&mut self, type_name: &str, name: &str) -> Result<NodeHandle, RenderError> {
        if !self.schemas.contains_key(type_name) {
            return Err(RenderError::UnknownType(type_name.to_owned()));
        }
        self.mutated();
        self.next += 1;
        let handle = NodeHandle(self.next);
        self.nodes.insert(
            handle,
            MockNode {
                type_name: type_name.to_owned(),
                name: name.to_owned(),
                params: BTreeMap::new(),
                links: BTreeMap::new(),
            },
        );
        self.created.push(handle);
        Ok(handle)
    }

    fn destroy_node(&mut self, node: NodeHandle) -> Result<(), RenderError> {
        self.nodes
            .remove(&node)
            .ok_or(RenderError::UnknownNode(node))?;
        self.mutated();
        self.destroyed.push(node);
        Ok(())
    }

    fn set_parameter(
        &mut self,
        node: NodeHandle,
        parameter: &str,
        value: Value,
    ) -> Result<(), RenderError> {
        self.declared(node, parameter)?;
        self.mutated();
        if let Some(live) = self.nodes.get_mut(&node) {
            live.params.insert(parameter.to_owned(), value);
        }
        Ok(())
    }

    fn link(
        &mut self,
        source: NodeHandle,
        output: Option<&str>,
        dest: NodeHandle,
        parameter: &str,
    ) -> Result<(), RenderError> {
        if !self.nodes.contains_key(&source) {
            return Err(RenderError::UnknownNode(source));
        }
        self.declared(dest, parameter)?;
        self.mutated();
        if let Some(live) = self.nodes.get_mut(&dest) {
            live.links.insert(
                parameter.to_owned(),
                (source, output.map(str::to_owned)),
            );
        }
        Ok(())
    }

    fn unlink(&mut self, dest: NodeHandle, parameter: &str) -> Result<(), RenderError> {
        if !self.nodes.contains_key(&dest) {
            return Err(RenderError::UnknownNode(dest));
        }
        self.mutated();
        if let Some(live) = self.nodes.get_mut(&dest) {
            live.links.remove(parameter);
            if live.params.get(parameter).is_some_and(|v| v.as_node().is_some()) {
                live.params.remove(parameter);
            }
        }
        Ok(())
    }

    fn node_type(&self, node: NodeHandle) -> Option<String> {
        self.nodes.get(&node).map(|n| n.type_name.clone())
    }

    fn lookup_node_entry(&self, node: NodeHandle, parameter: &str) -> Option<ParamSpec> {
        let live = self.nodes.get(&node)?;
        self.schemas.get(&live.type_name)?.param(parameter).cloned()
    }

    fn clear(&mut self) {
        self.mutated();
        self.clear_count += 1;
        self.nodes.clear();
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
        self.pause_depth += 1;
        self.max_pause_depth = self.max_pause_depth.max(self.pause_depth);
    }

    fn resume(&mut self) {
        self.resume_calls += 1;
        self.pause_depth = self.pause_depth.saturating_sub(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use weft_port::{ParamType, ValueType};

    fn renderer() -> MockRenderer {
        let mut r = MockRenderer::new();
        r.register(
            "flat",
            vec![
                ParamSpec::new("color", ParamType::Value(ValueType::Rgb)),
                ParamSpec::new("target", ParamType::NodeRef),
            ],
        );
        r
    }

    #[test]
    fn unknown_types_are_rejected() {
        let mut r = renderer();
        assert_eq!(
            r.create_node("nope", "n"),
            Err(RenderError::UnknownType("nope".into()))
        );
        assert!(r.created.is_empty());
    }

    #[test]
    fn unlink_clears_links_and_references() {
        let mut r = renderer();
        let a = r.create_node("flat", "a").unwrap();
        let b = r.create_node("flat", "b").unwrap();
        r.link(a, None, b, "color").unwrap();
        r.set_parameter(b, "target", Value::Node(a)).unwrap();
        assert_eq!(r.link_of(b, "color"), Some(a));
        r.unlink(b, "color").unwrap();
        r.unlink(b, "target").unwrap();
        assert_eq!(r.input_of(b, "color"), None);
        assert_eq!(r.input_of(b, "target"), None);
    }

    #[test]
    fn destroying_a_source_leaves_dangling_references() {
        let mut r = renderer();
        let a = r.create_node("flat", "a").unwrap();
        let b = r.create_node("flat", "b").unwrap();
        r.set_parameter(b, "target", Value::Node(a)).unwrap();
        r.destroy_node(a).unwrap();
        assert_eq!(r.dangling_references(), vec![(b, "target".into(), a)]);
    }

    #[test]
    fn undeclared_parameters_are_rejected() {
        let mut r = renderer();
        let a = r.create_node("flat", "a").unwrap();
        assert!(matches!(
            r.set_parameter(a, "nope", Value::Int(1)),
            Err(RenderError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn mutations_outside_pause_are_counted() {
        let mut r = renderer();
        r.pause();
        let a = r.create_node("flat", "a").unwrap();
        r.resume();
        r.set_parameter(a, "color", Value::Rgb([1.0, 0.0, 0.0])).unwrap();
        assert_eq!(r.unpaused_mutations, 1);
        assert!(r.pause_balanced());
    }
}
