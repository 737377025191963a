// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compositing layer stacks.
//!
//! For every parameter a shader's active layers override, one composite node
//! per `(layer, parameter)` is chained top to bottom: the first composite's
//! `base` input receives the shader's own unlayered value, each later
//! composite's `base` receives the previous composite, and the last composite
//! feeds the shader's real parameter.

use tracing::trace;
use weft_port::{EntityRef, HostScene, NodeHandle, TimeKey, Value};

use crate::catalog::LAYER_NODE_TYPE;
use crate::error::TranslateError;
use crate::key::ShaderKey;
use crate::shading::Translator;

/// Layer properties that control the layer itself rather than override a
/// shader parameter.
pub const LAYER_CONTROL_PARAMS: [&str; 3] = ["enabled", "solo", "mix"];

/// Layers of `shader` that take part in compositing at `time`, in authored
/// order.
///
/// Disabled layers never take part. If any enabled layer is soloed, only the
/// soloed layers do.
pub fn active_layers(host: &dyn HostScene, shader: EntityRef, time: TimeKey) -> Vec<EntityRef> {
    let flag = |layer: EntityRef, name: &str, default: bool| {
        host.evaluate(layer, name, time)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    };
    let enabled: Vec<EntityRef> = host
        .layers(shader)
        .into_iter()
        .filter(|l| flag(*l, "enabled", true))
        .collect();
    if enabled.iter().any(|l| flag(*l, "solo", false)) {
        enabled
            .into_iter()
            .filter(|l| flag(*l, "solo", false))
            .collect()
    } else {
        enabled
    }
}

impl Translator<'_> {
    /// Translates the layer stack of `shader` onto its node.
    ///
    /// Composites are memoized per `(layer, parameter, time)`; composites the
    /// stack no longer uses are destroyed and the parameters they fed are
    /// re-bound to their unlayered sources.
    pub fn translate_layer_stack(
        &mut self,
        shader: EntityRef,
        node: NodeHandle,
    ) -> Result<(), TranslateError> {
        let layers = active_layers(self.host, shader, self.time);
        let mut targets: Vec<(EntityRef, Vec<String>)> = Vec::with_capacity(layers.len());
        let mut order: Vec<String> = Vec::new();
        for layer in &layers {
            let params: Vec<String> = self
                .host
                .get_properties(*layer)
                .into_iter()
                .filter(|p| !LAYER_CONTROL_PARAMS.contains(&p.as_str()))
                .collect();
            for p in &params {
                if !order.contains(p) {
                    order.push(p.clone());
                }
            }
            self.session
                .layer_owners
                .entry(*layer)
                .or_default()
                .insert(shader);
            targets.push((*layer, params));
        }

        let mut used = Vec::new();
        for target in &order {
            let Some(spec) = self.renderer.lookup_node_entry(node, target) else {
                trace!(%shader, %target, "layered parameter not declared on shader node");
                continue;
            };
            let mut previous: Option<NodeHandle> = None;
            for (layer, params) in &targets {
                if !params.contains(target) {
                    continue;
                }
                let Some(composite) = self.composite_node(*layer, target)? else {
                    break;
                };
                self.bind_composite_base(shader, target, previous, composite)?;
                self.bind_parameter(*layer, target, composite, "layer")?;
                let mix = self
                    .host
                    .evaluate(*layer, "mix", self.time)
                    .unwrap_or(Value::Float(1.0));
                self.set_declared(composite, "mix", mix)?;
                used.push(composite);
                previous = Some(composite);
            }
            if let Some(last) = previous {
                self.bind_node(last, None, node, &spec)?;
            }
        }

        let chain_key = ShaderKey::main(self.key(shader));
        let stale: Vec<NodeHandle> = self
            .session
            .layer_chains
            .insert(chain_key, used.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|h| !used.contains(h))
            .collect();
        for composite in stale {
            let detached = self.session.destroy_node(self.renderer, composite)?;
            for slot in detached {
                if slot.dest == node {
                    self.bind_parameter(shader, &slot.parameter, node, &slot.parameter)?;
                }
            }
        }
        Ok(())
    }

    fn composite_node(
        &mut self,
        layer: EntityRef,
        target: &str,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        let key = ShaderKey::composite(self.key(layer), target);
        if let Some(composite) = self.session.shaders.find(&key) {
            return Ok(Some(composite));
        }
        let name = format!(
            "{}.{target}{}",
            self.display_name(layer),
            key.time.name_suffix()
        );
        let Some(composite) = self.create(LAYER_NODE_TYPE, &name)? else {
            return Ok(None);
        };
        self.session.shaders.insert(key, composite);
        Ok(Some(composite))
    }

    fn bind_composite_base(
        &mut self,
        shader: EntityRef,
        target: &str,
        previous: Option<NodeHandle>,
        composite: NodeHandle,
    ) -> Result<(), TranslateError> {
        match previous {
            Some(prev) => match self.renderer.lookup_node_entry(composite, "base") {
                Some(spec) => self.bind_node(prev, None, composite, &spec),
                None => Ok(()),
            },
            None => self.bind_parameter(shader, target, composite, "base"),
        }
    }
}
