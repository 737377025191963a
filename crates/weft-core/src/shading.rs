// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shading-network translation.
//!
//! [`Translator`] walks what feeds each parameter of a destination node,
//! translates the upstream entity first (memoized through the session's
//! identity maps), then binds it. Every bind goes through one of three paths:
//! a plain value write, an output link, or a by-reference bind; the last two
//! are recorded in the session's binding ledger.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};
use weft_port::{
    EntityRef, HostScene, NodeHandle, ParamSpec, ParamType, RenderError, RenderGraph, TimeKey,
    Value,
};

use crate::bindings::write_array;
use crate::catalog::{self, IMAGE_NODE_TYPE};
use crate::error::TranslateError;
use crate::key::{KeyTime, NodeKey, ShaderKey};
use crate::session::TranslationSession;
use crate::source::{resolve_source, Source};

/// Translates host entities into renderer nodes for one evaluation time.
///
/// Identity lookups use the session's lookup time (the pinned time in
/// flythrough); parameter values are always evaluated at `time`.
pub struct Translator<'a> {
    pub(crate) session: &'a mut TranslationSession,
    pub(crate) host: &'a dyn HostScene,
    pub(crate) renderer: &'a mut dyn RenderGraph,
    pub(crate) time: TimeKey,
    visiting: FxHashSet<EntityRef>,
}

impl<'a> Translator<'a> {
    /// Creates a translator evaluating at `time`.
    pub fn new(
        session: &'a mut TranslationSession,
        host: &'a dyn HostScene,
        renderer: &'a mut dyn RenderGraph,
        time: TimeKey,
    ) -> Self {
        Self {
            session,
            host,
            renderer,
            time,
            visiting: FxHashSet::default(),
        }
    }

    /// Evaluation time.
    pub fn time(&self) -> TimeKey {
        self.time
    }

    /// Session being populated.
    pub fn session(&self) -> &TranslationSession {
        &*self.session
    }

    pub(crate) fn key(&self, entity: EntityRef) -> NodeKey {
        self.session.node_key(self.host, entity, self.time)
    }

    pub(crate) fn display_name(&self, entity: EntityRef) -> String {
        self.host
            .name(entity)
            .unwrap_or_else(|| entity.to_string())
    }

    pub(crate) fn node_name(&self, entity: EntityRef, time: KeyTime) -> String {
        format!("{}{}", self.display_name(entity), time.name_suffix())
    }

    /// Creates a node, turning an unknown type into a recorded miss.
    pub(crate) fn create(
        &mut self,
        type_name: &str,
        name: &str,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        match self.renderer.create_node(type_name, name) {
            Ok(node) => {
                trace!(%type_name, %name, %node, "node created");
                Ok(Some(node))
            }
            Err(RenderError::UnknownType(t)) => {
                self.session.missing.report(self.host, &t);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Translates a shader once per key and loads its parameters.
    ///
    /// Returns `Ok(None)` when the shader's type has no renderer equivalent and
    /// [`TranslateError::Cycle`] when `shader` is already being translated
    /// further up the current walk.
    pub fn translate_shader(
        &mut self,
        shader: EntityRef,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        if self.visiting.contains(&shader) {
            return Err(TranslateError::Cycle { entity: shader });
        }
        let key = ShaderKey::main(self.key(shader));
        if let Some(node) = self.session.shaders.find(&key) {
            return Ok(Some(node));
        }
        let Some(type_name) = catalog::expected_type(self.host, shader) else {
            let label = catalog::missing_label(self.host, shader);
            self.session.missing.report(self.host, &label);
            return Ok(None);
        };
        let name = self.node_name(shader, key.time);
        let Some(node) = self.create(&type_name, &name)? else {
            return Ok(None);
        };
        self.session.shaders.insert(key, node);

        self.visiting.insert(shader);
        let loaded = self.load_shader_parameters(shader, node);
        self.visiting.remove(&shader);
        loaded?;
        Ok(Some(node))
    }

    /// Re-loads an already translated shader in place.
    ///
    /// The shader counts as in progress while it loads, so an upstream edit
    /// that closes a loop back to it is caught as a cycle.
    pub fn patch_shader(&mut self, shader: EntityRef, node: NodeHandle) -> Result<(), TranslateError> {
        self.visiting.insert(shader);
        let loaded = self.load_shader_parameters(shader, node);
        self.visiting.remove(&shader);
        loaded
    }

    /// Binds every property of `shader` onto `node`, then its layer stack.
    pub fn load_shader_parameters(
        &mut self,
        shader: EntityRef,
        node: NodeHandle,
    ) -> Result<(), TranslateError> {
        for property in self.host.get_properties(shader) {
            self.bind_parameter(shader, &property, node, &property)?;
        }
        self.translate_layer_stack(shader, node)
    }

    /// Translates an image source into an `image` node once per key.
    pub fn translate_image(
        &mut self,
        image: EntityRef,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        let key = ShaderKey::main(self.key(image));
        if let Some(node) = self.session.shaders.find(&key) {
            return Ok(Some(node));
        }
        let name = self.node_name(image, key.time);
        let Some(node) = self.create(IMAGE_NODE_TYPE, &name)? else {
            return Ok(None);
        };
        self.session.shaders.insert(key, node);
        self.load_image_parameters(image, node)?;
        Ok(Some(node))
    }

    /// Writes an image node's file name and texture options.
    pub fn load_image_parameters(
        &mut self,
        image: EntityRef,
        node: NodeHandle,
    ) -> Result<(), TranslateError> {
        for property in self.host.get_properties(image) {
            self.bind_parameter(image, &property, node, &property)?;
        }
        if let Some(path) = self.host.resolve_path(image, self.time) {
            self.set_declared(node, "filename", Value::Str(path))?;
        }
        let options = self.host.texture_options(image).unwrap_or_default();
        self.set_declared(node, "swrap", options.wrap_u.as_str().into())?;
        self.set_declared(node, "twrap", options.wrap_v.as_str().into())?;
        self.set_declared(node, "mipmap_bias", Value::Int(options.mipmap_bias.into()))?;
        self.set_declared(node, "filter", Value::Str(options.filter))?;
        self.set_declared(node, "color_space", Value::Str(options.color_space))?;
        if let Some(crop) = options.crop {
            let crop = crop.iter().map(|c| Value::Float(*c)).collect();
            self.set_declared(node, "uvcoords", Value::Array(crop))?;
        }
        Ok(())
    }

    /// Materializes whatever feeds `entity.parameter` and binds it to
    /// `dest.dest_param`.
    ///
    /// Parameters the destination does not declare are skipped. A connection
    /// cycle leaves the destination at its default and is reported once.
    pub fn bind_parameter(
        &mut self,
        entity: EntityRef,
        parameter: &str,
        dest: NodeHandle,
        dest_param: &str,
    ) -> Result<(), TranslateError> {
        let Some(spec) = self.renderer.lookup_node_entry(dest, dest_param) else {
            trace!(%entity, %parameter, %dest, "parameter not declared on node; skipped");
            return Ok(());
        };
        match resolve_source(self.host, entity, parameter, self.time) {
            Ok(source) => self.bind_source(source, dest, &spec),
            Err(TranslateError::Cycle { entity }) => {
                self.report_cycle(entity);
                self.unbind(dest, &spec.name)
            }
            Err(err) => Err(err),
        }
    }

    fn bind_source(
        &mut self,
        source: Source,
        dest: NodeHandle,
        spec: &ParamSpec,
    ) -> Result<(), TranslateError> {
        match source {
            Source::PlainValue(value) => self.bind_value(dest, spec, value),
            Source::Unset => self.unbind(dest, &spec.name),
            Source::Shader { shader, output } => match self.translate_upstream(shader, true)? {
                Some(node) => self.bind_node(node, output.as_deref(), dest, spec),
                None => self.unbind(dest, &spec.name),
            },
            Source::ImageSource(image) => match self.translate_image(image)? {
                Some(node) => self.bind_node(node, None, dest, spec),
                None => self.unbind(dest, &spec.name),
            },
            Source::Curve { curve, domain } => match self.bake_curve(curve, domain, &spec.ty) {
                Some(value) => self.set_value(dest, &spec.name, value),
                None => self.unbind(dest, &spec.name),
            },
            Source::Expression(expression) => {
                match self.host.evaluate(expression, "value", self.time) {
                    Some(value) => self.bind_value(dest, spec, value),
                    None => self.unbind(dest, &spec.name),
                }
            }
            Source::ArrayOfSources(items) => self.bind_array(items, dest, spec),
        }
    }

    fn bind_value(
        &mut self,
        dest: NodeHandle,
        spec: &ParamSpec,
        value: Value,
    ) -> Result<(), TranslateError> {
        match value {
            Value::Entity(entity) => match self.translate_upstream(entity, false)? {
                Some(node) => self.bind_node(node, None, dest, spec),
                None => self.unbind(dest, &spec.name),
            },
            Value::Array(items) if items.iter().any(|v| v.as_entity().is_some()) => {
                let items = items.into_iter().map(Source::PlainValue).collect();
                self.bind_array(items, dest, spec)
            }
            value => self.set_value(dest, &spec.name, value),
        }
    }

    /// Binds `node` to `dest`: by reference for node-typed slots, by link
    /// otherwise.
    pub(crate) fn bind_node(
        &mut self,
        node: NodeHandle,
        output: Option<&str>,
        dest: NodeHandle,
        spec: &ParamSpec,
    ) -> Result<(), TranslateError> {
        if spec.ty == ParamType::NodeRef {
            self.renderer
                .set_parameter(dest, &spec.name, Value::Node(node))?;
            self.session
                .bindings
                .record_reference(node, dest, &spec.name);
        } else {
            self.renderer.link(node, output, dest, &spec.name)?;
            self.session
                .bindings
                .record_link(node, output, dest, &spec.name);
        }
        Ok(())
    }

    fn bind_array(
        &mut self,
        items: Vec<Source>,
        dest: NodeHandle,
        spec: &ParamSpec,
    ) -> Result<(), TranslateError> {
        let (values, index) = if let ParamType::IndexedTable { index } = &spec.ty {
            let mut values = Vec::new();
            let mut positions = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                if let Some(node) = self.element_node(item)? {
                    values.push(Value::Node(node));
                    positions.push(i64::try_from(i).unwrap_or(i64::MAX));
                }
            }
            (values, Some((index.clone(), positions)))
        } else {
            let mut values = Vec::new();
            for item in items {
                if let Some(value) = self.element_value(item)? {
                    values.push(value);
                }
            }
            (values, None)
        };
        self.renderer.unlink(dest, &spec.name)?;
        write_array(self.renderer, dest, &spec.name, &values, index.as_ref())?;
        self.session
            .bindings
            .record_array(dest, &spec.name, values, index);
        Ok(())
    }

    fn element_node(&mut self, item: Source) -> Result<Option<NodeHandle>, TranslateError> {
        match item {
            Source::Shader { shader, .. } => self.translate_upstream(shader, true),
            Source::ImageSource(image) => self.translate_image(image),
            Source::PlainValue(Value::Entity(entity)) => self.translate_upstream(entity, false),
            _ => Ok(None),
        }
    }

    fn element_value(&mut self, item: Source) -> Result<Option<Value>, TranslateError> {
        Ok(match item {
            Source::PlainValue(Value::Entity(_)) | Source::Shader { .. } | Source::ImageSource(_) => {
                self.element_node(item)?.map(Value::Node)
            }
            Source::PlainValue(value) => Some(value),
            Source::Curve { curve, .. } => self.host.sample_curve(curve, self.time.value()),
            Source::Expression(expression) => self.host.evaluate(expression, "value", self.time),
            Source::ArrayOfSources(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = self.element_value(item)? {
                        values.push(value);
                    }
                }
                Some(Value::Array(values))
            }
            Source::Unset => None,
        })
    }

    /// Bakes a curve: a sample array for array slots, the value at the
    /// current time otherwise.
    fn bake_curve(&self, curve: EntityRef, domain: [f64; 2], ty: &ParamType) -> Option<Value> {
        if !matches!(ty, ParamType::Array(_)) {
            return self.host.sample_curve(curve, self.time.value());
        }
        let samples = self.session.settings.curve_samples.max(1);
        let span = domain[1] - domain[0];
        let steps = f64::from(samples.saturating_sub(1).max(1));
        let values = (0..samples)
            .filter_map(|i| {
                let x = if samples == 1 {
                    domain[0]
                } else {
                    domain[0] + span * f64::from(i) / steps
                };
                self.host.sample_curve(curve, x)
            })
            .collect();
        Some(Value::Array(values))
    }

    /// Translates an upstream dependency, turning a cycle into a reported miss.
    pub(crate) fn translate_upstream(
        &mut self,
        entity: EntityRef,
        shader_only: bool,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        let translated = if shader_only {
            self.translate_shader(entity)
        } else {
            self.translate_entity(entity)
        };
        match translated {
            Err(TranslateError::Cycle { entity }) => {
                self.report_cycle(entity);
                Ok(None)
            }
            other => other,
        }
    }

    fn report_cycle(&mut self, entity: EntityRef) {
        let name = self.display_name(entity);
        debug!(%entity, %name, "connection cycle; binding left at default");
        self.session.missing.report_with(
            self.host,
            &format!("cycle:{name}"),
            &format!("Shading network cycle through '{name}'; parameter left unconnected"),
        );
    }

    /// Writes a plain value, dropping any link or reference in that slot.
    pub(crate) fn set_value(
        &mut self,
        dest: NodeHandle,
        parameter: &str,
        value: Value,
    ) -> Result<(), TranslateError> {
        self.session.bindings.forget(dest, parameter);
        self.renderer.unlink(dest, parameter)?;
        self.renderer.set_parameter(dest, parameter, value)?;
        Ok(())
    }

    /// Writes `value` only if `node` declares `parameter`.
    pub(crate) fn set_declared(
        &mut self,
        node: NodeHandle,
        parameter: &str,
        value: Value,
    ) -> Result<bool, TranslateError> {
        if self.renderer.lookup_node_entry(node, parameter).is_none() {
            return Ok(false);
        }
        self.set_value(node, parameter, value)?;
        Ok(true)
    }

    /// Restores a slot to its default.
    pub(crate) fn unbind(&mut self, dest: NodeHandle, parameter: &str) -> Result<(), TranslateError> {
        self.session.bindings.forget(dest, parameter);
        self.renderer.unlink(dest, parameter)?;
        Ok(())
    }
}
