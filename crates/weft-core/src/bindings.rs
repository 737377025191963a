// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ledger of every link and by-reference bind issued into the renderer graph.
//!
//! The renderer does not tell us who points at a node. Without this record a
//! destroyed (or destroyed-and-recreated) node would leave its dependents
//! holding a dangling link. Each entry is keyed by the destination slot; a
//! reverse index maps source nodes to the slots they feed.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use weft_port::{NodeHandle, RenderError, RenderGraph, Value};

/// What currently feeds one destination parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundParam {
    /// An output link from `source`.
    Link {
        /// Upstream node.
        source: NodeHandle,
        /// Named output, if any.
        output: Option<String>,
    },
    /// A by-reference bind (`Value::Node(source)`).
    Reference {
        /// Referenced node.
        source: NodeHandle,
    },
    /// An array whose elements include node references.
    NodeArray {
        /// Array as written, including any plain elements.
        values: Vec<Value>,
        /// Side index parameter and its element indices, parallel to `values`.
        index: Option<(String, Vec<i64>)>,
    },
}

impl BoundParam {
    /// Nodes this binding depends on.
    pub fn sources(&self) -> Vec<NodeHandle> {
        match self {
            Self::Link { source, .. } | Self::Reference { source } => vec![*source],
            Self::NodeArray { values, .. } => {
                let mut out: Vec<NodeHandle> = values.iter().filter_map(Value::as_node).collect();
                out.sort();
                out.dedup();
                out
            }
        }
    }
}

/// A binding removed from the ledger when its source node went away.
///
/// Holds the binding as it was before removal so the caller can re-point it
/// at a replacement node with [`BindingLedger::restore`].
#[derive(Clone, Debug, PartialEq)]
pub struct DetachedBinding {
    /// Destination node.
    pub dest: NodeHandle,
    /// Destination parameter.
    pub parameter: String,
    /// Binding state prior to detaching.
    pub bound: BoundParam,
}

type Slot = (NodeHandle, String);

/// Link/reference bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct BindingLedger {
    by_dest: FxHashMap<Slot, BoundParam>,
    by_source: FxHashMap<NodeHandle, FxHashSet<Slot>>,
}

impl BindingLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `source[.output] -> dest.parameter`.
    pub fn record_link(
        &mut self,
        source: NodeHandle,
        output: Option<&str>,
        dest: NodeHandle,
        parameter: &str,
    ) {
        self.record(
            dest,
            parameter,
            BoundParam::Link {
                source,
                output: output.map(str::to_owned),
            },
        );
    }

    /// Records `dest.parameter = &source`.
    pub fn record_reference(&mut self, source: NodeHandle, dest: NodeHandle, parameter: &str) {
        self.record(dest, parameter, BoundParam::Reference { source });
    }

    /// Records an array write. Arrays without node elements are only forgotten.
    pub fn record_array(
        &mut self,
        dest: NodeHandle,
        parameter: &str,
        values: Vec<Value>,
        index: Option<(String, Vec<i64>)>,
    ) {
        if values.iter().any(|v| v.as_node().is_some()) {
            self.record(dest, parameter, BoundParam::NodeArray { values, index });
        } else {
            self.forget(dest, parameter);
        }
    }

    fn record(&mut self, dest: NodeHandle, parameter: &str, bound: BoundParam) {
        self.forget(dest, parameter);
        let slot = (dest, parameter.to_owned());
        for source in bound.sources() {
            self.by_source.entry(source).or_default().insert(slot.clone());
        }
        self.by_dest.insert(slot, bound);
    }

    /// Drops whatever was recorded for `dest.parameter`.
    pub fn forget(&mut self, dest: NodeHandle, parameter: &str) -> Option<BoundParam> {
        let slot = (dest, parameter.to_owned());
        let bound = self.by_dest.remove(&slot)?;
        for source in bound.sources() {
            if let Some(slots) = self.by_source.get_mut(&source) {
                slots.remove(&slot);
                if slots.is_empty() {
                    self.by_source.remove(&source);
                }
            }
        }
        Some(bound)
    }

    /// Drops every binding whose destination is `dest`.
    pub fn forget_dest(&mut self, dest: NodeHandle) -> usize {
        let params: Vec<String> = self
            .by_dest
            .keys()
            .filter(|(d, _)| *d == dest)
            .map(|(_, p)| p.clone())
            .collect();
        for p in &params {
            self.forget(dest, p);
        }
        params.len()
    }

    /// Returns what feeds `dest.parameter`.
    pub fn get(&self, dest: NodeHandle, parameter: &str) -> Option<&BoundParam> {
        self.by_dest.get(&(dest, parameter.to_owned()))
    }

    /// Destination slots fed by `source`, sorted.
    pub fn dependents(&self, source: NodeHandle) -> Vec<(NodeHandle, String)> {
        let mut out: Vec<Slot> = self
            .by_source
            .get(&source)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Returns `true` if `node` appears as a source or destination.
    pub fn mentions(&self, node: NodeHandle) -> bool {
        self.by_source.contains_key(&node) || self.by_dest.keys().any(|(d, _)| *d == node)
    }

    /// Number of recorded destination slots.
    pub fn len(&self) -> usize {
        self.by_dest.len()
    }

    /// Returns `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.by_dest.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.by_dest.clear();
        self.by_source.clear();
    }

    /// Unbinds every dependent of `source` in the renderer.
    ///
    /// Links and references are unlinked. Arrays drop the elements that point
    /// at `source` (and the matching index entries) and are rewritten. Returns
    /// the prior state of every affected slot.
    pub fn detach(
        &mut self,
        renderer: &mut dyn RenderGraph,
        source: NodeHandle,
    ) -> Result<Vec<DetachedBinding>, RenderError> {
        let mut detached = Vec::new();
        for (dest, parameter) in self.dependents(source) {
            let Some(bound) = self.forget(dest, &parameter) else {
                continue;
            };
            trace!(%source, %dest, %parameter, "detaching dependent");
            match &bound {
                BoundParam::Link { .. } | BoundParam::Reference { .. } => {
                    renderer.unlink(dest, &parameter)?;
                }
                BoundParam::NodeArray { values, index } => {
                    let keep: Vec<bool> = values.iter().map(|v| v.as_node() != Some(source)).collect();
                    let values: Vec<Value> = values
                        .iter()
                        .zip(&keep)
                        .filter(|(_, k)| **k)
                        .map(|(v, _)| v.clone())
                        .collect();
                    let index = index.as_ref().map(|(name, idx)| {
                        let idx: Vec<i64> = idx
                            .iter()
                            .zip(&keep)
                            .filter(|(_, k)| **k)
                            .map(|(i, _)| *i)
                            .collect();
                        (name.clone(), idx)
                    });
                    write_array(renderer, dest, &parameter, &values, index.as_ref())?;
                    self.record_array(dest, &parameter, values, index);
                }
            }
            detached.push(DetachedBinding {
                dest,
                parameter,
                bound,
            });
        }
        Ok(detached)
    }

    /// Re-points detached bindings from `old` to `new` and re-records them.
    ///
    /// Slots whose destination node no longer exists are skipped.
    pub fn restore(
        &mut self,
        renderer: &mut dyn RenderGraph,
        detached: Vec<DetachedBinding>,
        old: NodeHandle,
        new: NodeHandle,
    ) -> Result<usize, RenderError> {
        let swap = |h: NodeHandle| if h == old { new } else { h };
        let mut restored = 0;
        for DetachedBinding {
            dest,
            parameter,
            bound,
        } in detached
        {
            if renderer.node_type(dest).is_none() {
                continue;
            }
            match bound {
                BoundParam::Link { source, output } => {
                    let source = swap(source);
                    renderer.link(source, output.as_deref(), dest, &parameter)?;
                    self.record_link(source, output.as_deref(), dest, &parameter);
                }
                BoundParam::Reference { source } => {
                    let source = swap(source);
                    renderer.set_parameter(dest, &parameter, Value::Node(source))?;
                    self.record_reference(source, dest, &parameter);
                }
                BoundParam::NodeArray { values, index } => {
                    let values: Vec<Value> = values
                        .into_iter()
                        .map(|v| match v {
                            Value::Node(h) => Value::Node(swap(h)),
                            other => other,
                        })
                        .collect();
                    write_array(renderer, dest, &parameter, &values, index.as_ref())?;
                    self.record_array(dest, &parameter, values, index);
                }
            }
            restored += 1;
        }
        Ok(restored)
    }
}

/// Writes an array parameter and, when present, its side index array.
pub(crate) fn write_array(
    renderer: &mut dyn RenderGraph,
    dest: NodeHandle,
    parameter: &str,
    values: &[Value],
    index: Option<&(String, Vec<i64>)>,
) -> Result<(), RenderError> {
    renderer.set_parameter(dest, parameter, Value::Array(values.to_vec()))?;
    if let Some((name, idx)) = index {
        renderer.set_parameter(
            dest,
            name,
            Value::Array(idx.iter().map(|i| Value::Int(*i)).collect()),
        )?;
    }
    Ok(())
}
