// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Translation of non-shader entities: options, cameras, lights, geometry,
//! point clouds and instances.

use tracing::{debug, warn};
use weft_port::{EntityKind, EntityRef, NodeHandle, Severity, Value};

use crate::branch::{fingerprint, PASS_SHADER_PARAMS};
use crate::catalog::{self, INSTANCE_NODE_TYPE, POINTS_NODE_TYPE};
use crate::error::TranslateError;
use crate::group::GroupKey;
use crate::key::{InstanceKey, KeyTime};
use crate::settings::OutputMask;
use crate::shading::Translator;

/// Properties written by dedicated code paths instead of the generic binder.
const DEDICATED_PARAMS: [&str; 4] = ["matrix", "master", "motion_start", "motion_end"];

impl Translator<'_> {
    /// Translates any entity kind, returning its (first) renderer node.
    ///
    /// Layers, curves and expressions never become nodes of their own and
    /// yield `Ok(None)`, as does an entity the host no longer knows.
    pub fn translate_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        let Some(kind) = self.host.kind(entity) else {
            debug!(%entity, "entity not in host scene; nothing to translate");
            return Ok(None);
        };
        match kind {
            EntityKind::Shader => self.translate_shader(entity),
            EntityKind::ImageSource => self.translate_image(entity),
            EntityKind::PointCloud => Ok(self.translate_point_cloud(entity)?.first().copied()),
            EntityKind::Instance => Ok(self.translate_instance(entity)?.first().copied()),
            EntityKind::Layer | EntityKind::Curve | EntityKind::Expression => Ok(None),
            EntityKind::Pass
            | EntityKind::Operator
            | EntityKind::Camera
            | EntityKind::Imager
            | EntityKind::Light
            | EntityKind::PolyMesh
            | EntityKind::Curves => self.translate_object(entity),
        }
    }

    /// Translates a single-node object once per key.
    ///
    /// In flythrough, a cached camera or light keyed at the pinned time has
    /// its time-varying parameters refreshed at the current time.
    pub fn translate_object(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<NodeHandle>, TranslateError> {
        let key = self.key(entity);
        if let Some(node) = self.session.nodes.find(&key) {
            let stale_time = key.time != KeyTime::At(self.time) && key.time != KeyTime::Invariant;
            let refreshable = matches!(
                self.host.kind(entity),
                Some(EntityKind::Camera | EntityKind::Light)
            );
            if self.session.mode().is_flythrough() && stale_time && refreshable {
                self.refresh_time_varying(entity, node)?;
            }
            return Ok(Some(node));
        }
        let Some(type_name) = catalog::expected_type(self.host, entity) else {
            let label = catalog::missing_label(self.host, entity);
            self.session.missing.report(self.host, &label);
            return Ok(None);
        };
        let name = self.node_name(entity, key.time);
        let Some(node) = self.create(&type_name, &name)? else {
            return Ok(None);
        };
        self.session.nodes.insert(key, node);
        self.load_entity_parameters(entity, node)?;
        Ok(Some(node))
    }

    /// Binds every property of `entity` onto `node`, plus motion keys.
    ///
    /// The material slot (`shader`) is skipped when materials are masked out;
    /// pass shader stacks are left to [`Self::translate_pass_shaders`].
    pub fn load_entity_parameters(
        &mut self,
        entity: EntityRef,
        node: NodeHandle,
    ) -> Result<(), TranslateError> {
        let is_pass = self.host.kind(entity) == Some(EntityKind::Pass);
        let materials = self
            .session
            .settings
            .output
            .contains(OutputMask::MATERIALS);
        for property in self.host.get_properties(entity) {
            let p = property.as_str();
            if DEDICATED_PARAMS.contains(&p)
                || (p == "shader" && !materials)
                || (is_pass && PASS_SHADER_PARAMS.contains(&p))
            {
                continue;
            }
            self.bind_parameter(entity, p, node, p)?;
        }
        self.write_motion(entity, node)
    }

    /// Re-evaluates an already translated object at the current time.
    pub fn refresh_time_varying(
        &mut self,
        entity: EntityRef,
        node: NodeHandle,
    ) -> Result<(), TranslateError> {
        self.load_entity_parameters(entity, node)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_motion(&mut self, entity: EntityRef, node: NodeHandle) -> Result<(), TranslateError> {
        if self.renderer.lookup_node_entry(node, "matrix").is_some() {
            let keys = self.session.settings.motion.key_times(self.time);
            let mut matrices: Vec<Value> = keys
                .iter()
                .filter_map(|t| self.host.evaluate(entity, "matrix", *t))
                .collect();
            let value = match matrices.len() {
                0 => None,
                1 => matrices.pop(),
                _ => Some(Value::Array(matrices)),
            };
            if let Some(value) = value {
                self.set_value(node, "matrix", value)?;
            }
        }
        let (start, end) = self.session.settings.motion.range();
        self.set_declared(node, "motion_start", Value::Float(start as f32))?;
        self.set_declared(node, "motion_end", Value::Float(end as f32))?;
        Ok(())
    }

    /// Binds the pass shader stacks onto the options node built from `pass`
    /// and records their structural fingerprint.
    pub fn translate_pass_shaders(&mut self, pass: EntityRef) -> Result<usize, TranslateError> {
        let Some(options) = self.session.nodes.find(&self.key(pass)) else {
            return Ok(0);
        };
        let mut bound = 0;
        for param in PASS_SHADER_PARAMS {
            if self.renderer.lookup_node_entry(options, param).is_some() {
                self.bind_parameter(pass, param, options, param)?;
                bound += 1;
            }
        }
        self.session.pass_fingerprint = Some(fingerprint(self.host, pass, self.time));
        Ok(bound)
    }

    /// Expands a point cloud into `primitive_count` point primitives.
    ///
    /// The primitives form one group keyed by the cloud's name. A count change
    /// destroys the previous expansion and builds a new one.
    pub fn translate_point_cloud(
        &mut self,
        cloud: EntityRef,
    ) -> Result<Vec<NodeHandle>, TranslateError> {
        let key = self.key(cloud);
        let container = self.display_name(cloud);
        let group = GroupKey::new(container.clone(), key.time);
        let count = self
            .host
            .evaluate(cloud, "primitive_count", self.time)
            .and_then(|v| v.as_int())
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        if let Some(existing) = self.session.groups.get_nodes(&group) {
            if existing.len() == count {
                return Ok(existing.to_vec());
            }
            debug!(%container, from = existing.len(), to = count, "point count changed; re-expanding");
            let stale = existing.to_vec();
            self.session.groups.erase_group(&group);
            for node in stale {
                self.session.destroy_node(self.renderer, node)?;
            }
        }

        let mut nodes = Vec::with_capacity(count);
        let mut outcome = Ok(());
        for i in 0..count {
            let name = format!("{container}.{i}{}", key.time.name_suffix());
            let node = match self.create(POINTS_NODE_TYPE, &name) {
                Ok(Some(node)) => node,
                Ok(None) => break,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            };
            nodes.push(node);
            if let Err(err) = self.load_point(cloud, node, i) {
                outcome = Err(err);
                break;
            }
        }
        self.session.groups.push(group, nodes.clone());
        self.session.container_names.insert(cloud, container);
        outcome.map(|()| nodes)
    }

    /// Loads one point primitive's parameters.
    pub(crate) fn load_point(
        &mut self,
        cloud: EntityRef,
        node: NodeHandle,
        index: usize,
    ) -> Result<(), TranslateError> {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        self.set_declared(node, "index", Value::Int(index))?;
        self.load_entity_parameters(cloud, node)
    }

    /// Translates an instance into one `ginstance` node per master primitive.
    ///
    /// Each node references its primitive by reference through `node`. Slots
    /// beyond the master's current primitive count are destroyed.
    pub fn translate_instance(
        &mut self,
        instance: EntityRef,
    ) -> Result<Vec<NodeHandle>, TranslateError> {
        let key = self.key(instance);
        let container = self.display_name(instance);
        let Some(master) = self
            .host
            .evaluate(instance, "master", self.time)
            .and_then(|v| v.as_entity())
        else {
            warn!(%instance, "instance has no master");
            self.host.report(
                Severity::Warning,
                &format!("Instance '{container}' has no master; skipped"),
            );
            return Ok(Vec::new());
        };
        let masters = self.master_nodes(master)?;

        let mut nodes = Vec::with_capacity(masters.len());
        for (slot, primitive) in masters.iter().enumerate() {
            let slot = u32::try_from(slot).unwrap_or(u32::MAX);
            let slot_key = InstanceKey {
                instance: key,
                slot,
            };
            let node = match self.session.instances.find(&slot_key) {
                Some(node) => node,
                None => {
                    let name = format!("{container}.{slot}{}", key.time.name_suffix());
                    let Some(node) = self.create(INSTANCE_NODE_TYPE, &name)? else {
                        break;
                    };
                    self.session.instances.insert(slot_key, node);
                    node
                }
            };
            if let Some(spec) = self.renderer.lookup_node_entry(node, "node") {
                self.bind_node(*primitive, None, node, &spec)?;
            }
            self.load_entity_parameters(instance, node)?;
            nodes.push(node);
        }

        let surplus: Vec<NodeHandle> = self
            .session
            .instances
            .keys_for_entity(instance)
            .into_iter()
            .filter(|k| k.instance.time == key.time)
            .filter(|k| usize::try_from(k.slot).map_or(true, |s| s >= nodes.len()))
            .filter_map(|k| self.session.instances.find(&k))
            .collect();
        for node in surplus {
            self.session.destroy_node(self.renderer, node)?;
        }

        self.session
            .groups
            .push(GroupKey::new(container.clone(), key.time), nodes.clone());
        self.session.container_names.insert(instance, container);
        Ok(nodes)
    }

    fn master_nodes(&mut self, master: EntityRef) -> Result<Vec<NodeHandle>, TranslateError> {
        if self.host.kind(master) == Some(EntityKind::PointCloud) {
            return self.translate_point_cloud(master);
        }
        Ok(self
            .translate_upstream(master, false)?
            .into_iter()
            .collect())
    }
}
