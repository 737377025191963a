// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural fingerprint of the pass-level shader branches.
//!
//! A pass-level edit only needs the background / atmosphere / AOV stacks
//! re-translated when the shading topology behind them changed. The
//! fingerprint is an ordered walk of that topology; two walks compare equal
//! exactly when the same shaders, of the same types, feed the same slots.

use rustc_hash::FxHashSet;
use weft_port::{EntityRef, HostScene, TimeKey, Value};

use crate::source::{resolve_source, Source};

/// Pass parameters holding shader stacks, in translation order.
pub const PASS_SHADER_PARAMS: [&str; 3] = ["background", "atmosphere", "aov_shaders"];

/// One step of a branch walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchStep {
    /// Entering a parameter slot.
    Slot(String),
    /// A shader and its authored type.
    Shader {
        /// Shader entity.
        entity: EntityRef,
        /// Authored type at walk time.
        type_name: Option<String>,
        /// Named output feeding the slot.
        output: Option<String>,
    },
    /// A shader already visited earlier in this walk.
    Revisit(EntityRef),
    /// An image source.
    Image(EntityRef),
    /// A time curve.
    Curve(EntityRef),
    /// An expression.
    Expression(EntityRef),
    /// An array of `n` element sources follows.
    Array(usize),
    /// Plain or missing value; values are not part of the topology.
    Leaf,
    /// A connection cycle.
    Cycle,
}

/// Walks the pass shader branches of `pass` at `time`.
pub fn fingerprint(host: &dyn HostScene, pass: EntityRef, time: TimeKey) -> Vec<BranchStep> {
    let mut steps = Vec::new();
    let mut seen = FxHashSet::default();
    for param in PASS_SHADER_PARAMS {
        walk_slot(host, pass, param, time, &mut seen, &mut steps);
    }
    steps
}

fn walk_slot(
    host: &dyn HostScene,
    entity: EntityRef,
    param: &str,
    time: TimeKey,
    seen: &mut FxHashSet<EntityRef>,
    steps: &mut Vec<BranchStep>,
) {
    steps.push(BranchStep::Slot(param.to_owned()));
    match resolve_source(host, entity, param, time) {
        Ok(source) => walk_source(host, source, time, seen, steps),
        Err(_) => steps.push(BranchStep::Cycle),
    }
}

fn walk_source(
    host: &dyn HostScene,
    source: Source,
    time: TimeKey,
    seen: &mut FxHashSet<EntityRef>,
    steps: &mut Vec<BranchStep>,
) {
    match source {
        Source::Shader { shader, output } => {
            if !seen.insert(shader) {
                steps.push(BranchStep::Revisit(shader));
                return;
            }
            steps.push(BranchStep::Shader {
                entity: shader,
                type_name: host.type_name(shader),
                output,
            });
            for param in host.get_properties(shader) {
                walk_slot(host, shader, &param, time, seen, steps);
            }
        }
        Source::ImageSource(e) => steps.push(BranchStep::Image(e)),
        Source::Curve { curve, .. } => steps.push(BranchStep::Curve(curve)),
        Source::Expression(e) => steps.push(BranchStep::Expression(e)),
        Source::ArrayOfSources(items) => {
            steps.push(BranchStep::Array(items.len()));
            for item in items {
                walk_source(host, item, time, seen, steps);
            }
        }
        Source::PlainValue(Value::Entity(shader)) => {
            walk_source(host, Source::Shader { shader, output: None }, time, seen, steps);
        }
        Source::PlainValue(Value::Array(items)) if items.iter().any(|v| v.as_entity().is_some()) => {
            steps.push(BranchStep::Array(items.len()));
            for item in items {
                walk_source(host, Source::PlainValue(item), time, seen, steps);
            }
        }
        Source::PlainValue(_) | Source::Unset => steps.push(BranchStep::Leaf),
    }
}
