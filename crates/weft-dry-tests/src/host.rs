// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scriptable host scene.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use weft_port::{
    Connection, EntityKind, EntityRef, EventInbox, HostEvent, HostScene, MessageLog, Scope,
    Severity, TextureOptions, TimeKey, Value,
};

/// A parameter's authored value.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// Same value at every time.
    Constant(Value),
    /// Step-keyed: the last key at or before the query time wins; queries
    /// before the first key see the first key.
    Keyed(Vec<(f64, Value)>),
}

impl Param {
    fn at(&self, time: TimeKey) -> Option<Value> {
        match self {
            Self::Constant(v) => Some(v.clone()),
            Self::Keyed(keys) => keys
                .iter()
                .rev()
                .find(|(t, _)| *t <= time.value())
                .or_else(|| keys.first())
                .map(|(_, v)| v.clone()),
        }
    }
}

#[derive(Clone, Debug)]
struct EntityRecord {
    kind: EntityKind,
    name: String,
    type_name: Option<String>,
    parent: Option<EntityRef>,
    order: Vec<String>,
    params: HashMap<String, Param>,
    connections: HashMap<String, Connection>,
    layers: Vec<EntityRef>,
    texture: Option<TextureOptions>,
    path: Option<String>,
    invariant: bool,
    curve: Vec<(f64, f32)>,
}

impl EntityRecord {
    fn touch(&mut self, parameter: &str) {
        if !self.order.iter().any(|p| p == parameter) {
            self.order.push(parameter.to_owned());
        }
    }
}

type EnumerateFn = Box<dyn Fn(Option<EntityKind>)>;

#[derive(Default)]
struct EnumerateHook(Option<EnumerateFn>);

impl fmt::Debug for EnumerateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Some(..)" } else { "None" })
    }
}

/// In-memory [`HostScene`] whose contents tests edit directly.
///
/// Every mutator takes `&self`, so a test can keep editing the scene between
/// controller calls without juggling borrows.
#[derive(Debug, Default)]
pub struct MockHost {
    entities: RefCell<BTreeMap<EntityRef, EntityRecord>>,
    next: Cell<u64>,
    messages: RefCell<Vec<(Severity, String)>>,
    inbox: RefCell<Option<EventInbox>>,
    post_on_enumerate: RefCell<Vec<HostEvent>>,
    enumerate_calls: Cell<usize>,
    enumerate_hook: RefCell<EnumerateHook>,
}

impl MockHost {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity without an authored type.
    pub fn add(&self, kind: EntityKind, name: &str) -> EntityRef {
        let id = self.next.get() + 1;
        self.next.set(id);
        let entity = EntityRef(id);
        self.entities.borrow_mut().insert(
            entity,
            EntityRecord {
                kind,
                name: name.to_owned(),
                type_name: None,
                parent: None,
                order: Vec::new(),
                params: HashMap::new(),
                connections: HashMap::new(),
                layers: Vec::new(),
                texture: None,
                path: None,
                invariant: false,
                curve: Vec::new(),
            },
        );
        entity
    }

    /// Adds an entity with an authored type.
    pub fn add_typed(&self, kind: EntityKind, name: &str, type_name: &str) -> EntityRef {
        let entity = self.add(kind, name);
        self.set_type(entity, type_name);
        entity
    }

    /// Deletes an entity.
    pub fn remove(&self, entity: EntityRef) {
        self.entities.borrow_mut().remove(&entity);
    }

    fn edit(&self, entity: EntityRef, f: impl FnOnce(&mut EntityRecord)) {
        if let Some(record) = self.entities.borrow_mut().get_mut(&entity) {
            f(record);
        }
    }

    /// Changes the authored type.
    pub fn set_type(&self, entity: EntityRef, type_name: &str) {
        self.edit(entity, |r| r.type_name = Some(type_name.to_owned()));
    }

    /// Sets a constant parameter value.
    pub fn set(&self, entity: EntityRef, parameter: &str, value: impl Into<Value>) {
        let value = value.into();
        self.edit(entity, |r| {
            r.touch(parameter);
            r.params.insert(parameter.to_owned(), Param::Constant(value));
        });
    }

    /// Sets a step-keyed parameter.
    pub fn set_keyed(&self, entity: EntityRef, parameter: &str, keys: Vec<(f64, Value)>) {
        self.edit(entity, |r| {
            r.touch(parameter);
            r.params.insert(parameter.to_owned(), Param::Keyed(keys));
        });
    }

    /// Connects a parameter.
    pub fn connect(&self, entity: EntityRef, parameter: &str, connection: Connection) {
        self.edit(entity, |r| {
            r.touch(parameter);
            r.connections.insert(parameter.to_owned(), connection);
        });
    }

    /// Connects `entity.parameter` to the default output of `shader`.
    pub fn connect_shader(&self, entity: EntityRef, parameter: &str, shader: EntityRef) {
        self.connect(
            entity,
            parameter,
            Connection::Shader {
                shader,
                output: None,
            },
        );
    }

    /// Removes a connection; the parameter keeps its own value, if any.
    pub fn disconnect(&self, entity: EntityRef, parameter: &str) {
        self.edit(entity, |r| {
            r.connections.remove(parameter);
        });
    }

    /// Sets the ordered layer stack of a shader.
    pub fn set_layers(&self, shader: EntityRef, layers: Vec<EntityRef>) {
        self.edit(shader, |r| r.layers = layers);
    }

    /// Sets the texture side-table of an image source.
    pub fn set_texture_options(&self, image: EntityRef, options: TextureOptions) {
        self.edit(image, |r| r.texture = Some(options));
    }

    /// Sets the resolved file path of an image source.
    pub fn set_path(&self, image: EntityRef, path: &str) {
        self.edit(image, |r| r.path = Some(path.to_owned()));
    }

    /// Marks an entity as not varying with time.
    pub fn set_time_invariant(&self, entity: EntityRef, invariant: bool) {
        self.edit(entity, |r| r.invariant = invariant);
    }

    /// Sets the control points of a piecewise-linear curve.
    pub fn set_curve(&self, curve: EntityRef, points: Vec<(f64, f32)>) {
        self.edit(curve, |r| r.curve = points);
    }

    /// Parents `child` under `parent` for [`Scope::Children`] queries.
    pub fn set_parent(&self, child: EntityRef, parent: EntityRef) {
        self.edit(child, |r| r.parent = Some(parent));
    }

    /// Routes [`Self::post_during_enumerate`] events into `inbox`.
    pub fn attach_inbox(&self, inbox: EventInbox) {
        *self.inbox.borrow_mut() = Some(inbox);
    }

    /// Queues an event the host will post on its next `enumerate` call,
    /// imitating an edit that lands while a pass is running.
    pub fn post_during_enumerate(&self, event: HostEvent) {
        self.post_on_enumerate.borrow_mut().push(event);
    }

    /// Runs `hook` with the kind filter of every later `enumerate` call.
    ///
    /// Tests use it to raise an interrupt once a pass reaches a given stage.
    pub fn on_enumerate(&self, hook: impl Fn(Option<EntityKind>) + 'static) {
        self.enumerate_hook.borrow_mut().0 = Some(Box::new(hook));
    }

    /// Number of `enumerate` calls so far.
    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.get()
    }

    /// Every message reported so far.
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    /// Number of reported messages containing `needle`.
    pub fn messages_containing(&self, needle: &str) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|(_, m)| m.contains(needle))
            .count()
    }

    /// Looks an entity up by name.
    pub fn find(&self, name: &str) -> Option<EntityRef> {
        self.entities
            .borrow()
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(e, _)| *e)
    }
}

impl MessageLog for MockHost {
    fn report(&self, severity: Severity, message: &str) {
        self.messages
            .borrow_mut()
            .push((severity, message.to_owned()));
    }
}

impl HostScene for MockHost {
    fn enumerate(&self, scope: Scope, filter: Option<EntityKind>) -> Vec<EntityRef> {
        self.enumerate_calls.set(self.enumerate_calls.get() + 1);
        if let Some(hook) = self.enumerate_hook.borrow().0.as_ref() {
            hook(filter);
        }
        let pending: Vec<HostEvent> = self.post_on_enumerate.borrow_mut().drain(..).collect();
        if let Some(inbox) = self.inbox.borrow().as_ref() {
            for event in pending {
                inbox.post(event);
            }
        }
        self.entities
            .borrow()
            .iter()
            .filter(|(_, r)| filter.map_or(true, |k| r.kind == k))
            .filter(|(_, r)| match scope {
                Scope::Scene => true,
                Scope::Children(parent) => r.parent == Some(parent),
            })
            .map(|(e, _)| *e)
            .collect()
    }

    fn kind(&self, entity: EntityRef) -> Option<EntityKind> {
        self.entities.borrow().get(&entity).map(|r| r.kind)
    }

    fn name(&self, entity: EntityRef) -> Option<String> {
        self.entities.borrow().get(&entity).map(|r| r.name.clone())
    }

    fn type_name(&self, entity: EntityRef) -> Option<String> {
        self.entities
            .borrow()
            .get(&entity)
            .and_then(|r| r.type_name.clone())
    }

    fn evaluate(&self, entity: EntityRef, parameter: &str, time: TimeKey) -> Option<Value> {
        self.entities
            .borrow()
            .get(&entity)?
            .params
            .get(parameter)?
            .at(time)
    }

    fn get_source(&self, entity: EntityRef, parameter: &str) -> Option<Connection> {
        self.entities
            .borrow()
            .get(&entity)?
            .connections
            .get(parameter)
            .cloned()
    }

    fn get_properties(&self, entity: EntityRef) -> Vec<String> {
        self.entities
            .borrow()
            .get(&entity)
            .map(|r| r.order.clone())
            .unwrap_or_default()
    }

    fn sample_curve(&self, curve: EntityRef, x: f64) -> Option<Value> {
        let entities = self.entities.borrow();
        let points = &entities.get(&curve)?.curve;
        let first = points.first()?;
        if x <= first.0 {
            return Some(Value::Float(first.1));
        }
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x <= x1 {
                #[allow(clippy::cast_possible_truncation)]
                let t = ((x - x0) / (x1 - x0)) as f32;
                return Some(Value::Float(y0 + (y1 - y0) * t));
            }
        }
        points.last().map(|p| Value::Float(p.1))
    }

    fn layers(&self, shader: EntityRef) -> Vec<EntityRef> {
        self.entities
            .borrow()
            .get(&shader)
            .map(|r| r.layers.clone())
            .unwrap_or_default()
    }

    fn texture_options(&self, image: EntityRef) -> Option<TextureOptions> {
        self.entities.borrow().get(&image)?.texture.clone()
    }

    fn resolve_path(&self, image: EntityRef, _time: TimeKey) -> Option<String> {
        self.entities.borrow().get(&image)?.path.clone()
    }

    fn is_time_invariant(&self, entity: EntityRef) -> bool {
        self.entities
            .borrow()
            .get(&entity)
            .is_some_and(|r| r.invariant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_authored_order() {
        let host = MockHost::new();
        let s = host.add_typed(EntityKind::Shader, "s", "standard_surface");
        host.set(s, "base", 0.8_f32);
        host.connect_shader(s, "base_color", EntityRef(99));
        host.set(s, "base", 0.5_f32);
        assert_eq!(host.get_properties(s), vec!["base", "base_color"]);
        assert_eq!(host.evaluate(s, "base", TimeKey::ZERO), Some(Value::Float(0.5)));
    }

    #[test]
    fn keyed_params_step_between_keys() {
        let host = MockHost::new();
        let cam = host.add_typed(EntityKind::Camera, "cam", "perspective");
        host.set_keyed(
            cam,
            "fov",
            vec![(1.0, Value::Float(40.0)), (5.0, Value::Float(60.0))],
        );
        let at = |f| host.evaluate(cam, "fov", TimeKey::frame(f));
        assert_eq!(at(0.0), Some(Value::Float(40.0)));
        assert_eq!(at(4.9), Some(Value::Float(40.0)));
        assert_eq!(at(5.0), Some(Value::Float(60.0)));
    }

    #[test]
    fn curves_interpolate_linearly() {
        let host = MockHost::new();
        let c = host.add(EntityKind::Curve, "c");
        host.set_curve(c, vec![(0.0, 0.0), (1.0, 2.0)]);
        assert_eq!(host.sample_curve(c, 0.5), Some(Value::Float(1.0)));
        assert_eq!(host.sample_curve(c, 3.0), Some(Value::Float(2.0)));
        assert_eq!(host.sample_curve(c, -1.0), Some(Value::Float(0.0)));
    }

    #[test]
    fn queued_event_posts_on_next_enumerate() {
        let host = MockHost::new();
        let inbox = EventInbox::new();
        host.attach_inbox(inbox.clone());
        host.post_during_enumerate(HostEvent::PassChanged);
        assert!(inbox.is_empty());
        let _ = host.enumerate(Scope::Scene, None);
        assert_eq!(inbox.drain(), vec![HostEvent::PassChanged]);
        let _ = host.enumerate(Scope::Scene, None);
        assert!(inbox.is_empty());
    }
}
