// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Interactive synchronization controller.
//!
//! Per host edit the controller decides whether to patch the existing node,
//! destroy and recreate it because its renderer type changed, or tear the
//! whole renderer scene down and rebuild it on the next render request.
//!
//! Events reach the controller through an [`EventInbox`]. The host may post
//! while a pass is running (translation queries the host re-entrantly); such
//! events are picked up after the pass and coalesced into a single rebuild.

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, instrument, warn};
use weft_port::{
    EntityKind, EntityRef, EventInbox, HostEvent, HostScene, NodeHandle, RenderGraph, Scope,
    Severity, TimeKey,
};

use crate::branch::fingerprint;
use crate::build::{BuildReport, SceneBuilder, Stage};
use crate::catalog;
use crate::error::TranslateError;
use crate::group::GroupKey;
use crate::interrupt::Interrupt;
use crate::key::{KeyTime, ShaderKey};
use crate::pause::RenderPause;
use crate::session::{SessionMode, TranslationSession};
use crate::settings::{OutputMask, SessionSettings};
use crate::shading::Translator;

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Renderer graph matches the host as far as the controller knows.
    Idle,
    /// An edit or a pass is being applied.
    Syncing,
    /// The next render request performs a full build.
    PendingFullRebuild,
}

/// Outcome of one host event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Existing nodes were re-loaded in place.
    Patched(usize),
    /// The renderer type changed; `old` was destroyed and `new` translated.
    Rebuilt {
        /// Destroyed node.
        old: NodeHandle,
        /// Replacement, or `None` if the new type has no translation.
        new: Option<NodeHandle>,
    },
    /// A new entity was point-translated.
    Added(Option<NodeHandle>),
    /// Nodes destroyed for a removed entity, including dependent instances.
    Removed(usize),
    /// Nothing to do: the entity was never built, or the session does not
    /// track edits.
    Ignored,
    /// The renderer scene was torn down; the next render rebuilds it.
    RebuildScheduled,
}

/// Outcome of a render request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A full build pass ran.
    Built(BuildReport),
    /// Flythrough: this many cameras and lights were refreshed at the new time.
    Refreshed(usize),
    /// Nothing changed since the last render.
    UpToDate,
}

/// The in-place update state machine.
#[derive(Debug)]
pub struct SyncController {
    session: TranslationSession,
    inbox: EventInbox,
    state: SyncState,
    built_time: Option<TimeKey>,
    /// Time of an interrupted pass whose nodes are still in the renderer.
    partial: Option<TimeKey>,
    interrupt: Interrupt,
}

impl SyncController {
    /// Creates a controller owning a fresh session.
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_session(TranslationSession::new(settings))
    }

    /// Creates a controller around an existing session.
    pub fn with_session(session: TranslationSession) -> Self {
        Self {
            session,
            inbox: EventInbox::new(),
            state: SyncState::Idle,
            built_time: None,
            partial: None,
            interrupt: Interrupt::new(),
        }
    }

    /// Handle the host posts events into.
    pub fn inbox(&self) -> EventInbox {
        self.inbox.clone()
    }

    /// Interrupt polled by full builds. The caller resets it after an abort.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Time of the last build or refresh.
    pub fn built_time(&self) -> Option<TimeKey> {
        self.built_time
    }

    /// Time of an interrupted build the next render at that time resumes.
    pub fn partial_time(&self) -> Option<TimeKey> {
        self.partial
    }

    /// The translation session.
    pub fn session(&self) -> &TranslationSession {
        &self.session
    }

    /// Switches the session mode and schedules a full rebuild.
    pub fn set_mode(&mut self, mode: SessionMode) {
        self.session.set_mode(mode);
        self.request_rebuild();
    }

    /// Schedules a full rebuild on the next render. Repeated requests coalesce.
    pub fn request_rebuild(&mut self) {
        if self.state != SyncState::PendingFullRebuild {
            debug!("full rebuild requested");
        }
        self.state = SyncState::PendingFullRebuild;
    }

    /// Applies one event immediately, with the renderer paused.
    pub fn handle_event(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        event: HostEvent,
    ) -> Result<SyncAction, TranslateError> {
        if !self.session.mode().is_interactive() {
            return Ok(SyncAction::Ignored);
        }
        let mut paused = RenderPause::acquire(renderer);
        self.apply(host, &mut *paused, event)
    }

    /// Drains the inbox and applies the coalesced events.
    ///
    /// An event that fails to apply is logged and reported to the host; the
    /// renderer graph keeps its previous state for that entity.
    #[instrument(skip_all)]
    pub fn pump(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
    ) -> Result<Vec<SyncAction>, TranslateError> {
        let events = coalesce(self.inbox.drain());
        if events.is_empty() {
            return Ok(Vec::new());
        }
        if !self.session.mode().is_interactive() {
            return Ok(vec![SyncAction::Ignored; events.len()]);
        }
        let mut paused = RenderPause::acquire(renderer);
        let mut actions = Vec::with_capacity(events.len());
        for event in events {
            match self.apply(host, &mut *paused, event.clone()) {
                Ok(action) => actions.push(action),
                Err(err) => {
                    error!(?event, error = %err, "sync failed; keeping previous renderer state");
                    host.report(Severity::Error, &format!("Scene update failed: {err}"));
                    actions.push(SyncAction::Ignored);
                }
            }
        }
        debug!(applied = actions.len(), "inbox drained");
        Ok(actions)
    }

    /// Serves a render request at `time`.
    ///
    /// Pending events are applied first. A full build runs when one is pending,
    /// nothing was built yet, the session is a batch export, or (manual
    /// rebuild) the time changed. In flythrough a time change only refreshes
    /// cameras and lights.
    ///
    /// After an interrupted build, a render at the same time resumes it: the
    /// nodes already translated are kept and only the missing ones are built.
    /// A render at another time discards them first.
    #[instrument(skip_all, fields(time = %time))]
    pub fn render(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        time: TimeKey,
    ) -> Result<RenderOutcome, TranslateError> {
        self.pump(host, renderer)?;
        let mode = self.session.mode();
        let time_changed = self.built_time != Some(time);
        let full = self.state == SyncState::PendingFullRebuild
            || self.built_time.is_none()
            || !mode.is_interactive()
            || (mode == SessionMode::InteractiveManualRebuild && time_changed);
        if full {
            return self.full_build(host, renderer, time).map(RenderOutcome::Built);
        }
        if mode.is_flythrough() && time_changed {
            let refreshed = self.refresh(host, renderer, time)?;
            self.built_time = Some(time);
            return Ok(RenderOutcome::Refreshed(refreshed));
        }
        Ok(RenderOutcome::UpToDate)
    }

    fn full_build(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        time: TimeKey,
    ) -> Result<BuildReport, TranslateError> {
        let partial = self.partial.take();
        let resume = partial == Some(time) && self.state != SyncState::PendingFullRebuild;
        if resume {
            info!(%time, "resuming interrupted build");
        } else if self.built_time.is_some() || partial.is_some() {
            let mut paused = RenderPause::acquire(renderer);
            self.session.teardown(&mut *paused);
        }
        self.state = SyncState::Syncing;
        let built = SceneBuilder::build(&mut self.session, host, renderer, time, &self.interrupt);
        self.state = SyncState::Idle;
        let report = match built {
            Ok(report) => report,
            Err(err) => {
                host.report(Severity::Error, &format!("Scene build failed: {err}"));
                return Err(err);
            }
        };
        if report.is_aborted() {
            warn!(status = ?report.status, "build interrupted; next render at this time resumes it");
            self.built_time = None;
            self.partial = Some(time);
        } else {
            self.built_time = Some(time);
        }

        let late = self.inbox.drain();
        if !late.is_empty() {
            info!(events = late.len(), "edits arrived during rebuild; one more rebuild scheduled");
            self.state = SyncState::PendingFullRebuild;
        }
        Ok(report)
    }

    fn refresh(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        time: TimeKey,
    ) -> Result<usize, TranslateError> {
        let targets: Vec<(EntityRef, NodeHandle)> = self
            .session
            .nodes
            .iter()
            .filter(|(key, _)| {
                matches!(
                    host.kind(key.entity),
                    Some(EntityKind::Camera | EntityKind::Light)
                )
            })
            .map(|(key, node)| (key.entity, node))
            .collect();
        let mut paused = RenderPause::acquire(renderer);
        let mut tr = Translator::new(&mut self.session, host, &mut *paused, time);
        for (entity, node) in &targets {
            tr.refresh_time_varying(*entity, *node)?;
        }
        Ok(targets.len())
    }

    fn apply(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        event: HostEvent,
    ) -> Result<SyncAction, TranslateError> {
        match event {
            HostEvent::PassChanged => {
                self.schedule_rebuild(renderer);
                Ok(SyncAction::RebuildScheduled)
            }
            HostEvent::SceneClosed => {
                self.schedule_rebuild(renderer);
                self.session.reset_flythrough();
                Ok(SyncAction::RebuildScheduled)
            }
            _ if self.partial.is_some() => {
                // Resuming would keep stale nodes; start over instead.
                self.schedule_rebuild(renderer);
                Ok(SyncAction::RebuildScheduled)
            }
            _ if self.state == SyncState::PendingFullRebuild || self.built_time.is_none() => {
                Ok(SyncAction::Ignored)
            }
            event => {
                self.state = SyncState::Syncing;
                let applied = self.apply_edit(host, renderer, event);
                self.state = SyncState::Idle;
                applied
            }
        }
    }

    fn schedule_rebuild(&mut self, renderer: &mut dyn RenderGraph) {
        if self.built_time.is_some() || self.partial.is_some() {
            self.session.teardown(renderer);
            self.built_time = None;
            self.partial = None;
        }
        self.state = SyncState::PendingFullRebuild;
    }

    fn apply_edit(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        event: HostEvent,
    ) -> Result<SyncAction, TranslateError> {
        let current = self.built_time.unwrap_or(TimeKey::ZERO);
        match event {
            HostEvent::ValueChanged { entity, time, .. } => {
                let mut tr = Translator::new(&mut self.session, host, renderer, time);
                value_changed(&mut tr, entity)
            }
            HostEvent::EntityRemoved { entity } => {
                let mut tr = Translator::new(&mut self.session, host, renderer, current);
                remove_entity(&mut tr, entity)
            }
            HostEvent::EntityAdded { entity } => {
                let Some(kind) = host.kind(entity) else {
                    return Ok(SyncAction::Ignored);
                };
                let mask = self.session.settings().output;
                if !stage_for(kind).is_some_and(|s| mask.contains(s.mask())) {
                    return Ok(SyncAction::Ignored);
                }
                let mut tr = Translator::new(&mut self.session, host, renderer, current);
                Ok(SyncAction::Added(tr.translate_entity(entity)?))
            }
            HostEvent::PassChanged | HostEvent::SceneClosed => Ok(SyncAction::Ignored),
        }
    }
}

/// Build stage that owns entities of `kind`; `None` for kinds translated on
/// demand (shaders, images, layers, curves, expressions).
fn stage_for(kind: EntityKind) -> Option<Stage> {
    Stage::ORDER
        .into_iter()
        .find(|s| s.kind() == kind && *s != Stage::PassShaders)
}

fn value_changed(tr: &mut Translator<'_>, entity: EntityRef) -> Result<SyncAction, TranslateError> {
    let Some(kind) = tr.host.kind(entity) else {
        return Ok(SyncAction::Ignored);
    };
    match kind {
        EntityKind::Layer => {
            let owners: Vec<EntityRef> = tr
                .session
                .layer_owners
                .get(&entity)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            patch_shaders(tr, owners)
        }
        EntityKind::Curve | EntityKind::Expression => patch_everything(tr),
        EntityKind::PointCloud => patch_point_cloud(tr, entity),
        EntityKind::Instance => {
            if tr.session.instances.keys_for_entity(entity).is_empty() {
                return Ok(SyncAction::Ignored);
            }
            Ok(SyncAction::Patched(tr.translate_instance(entity)?.len()))
        }
        EntityKind::Pass => patch_pass(tr, entity),
        _ => patch_or_rebuild(tr, entity, kind),
    }
}

fn patch_or_rebuild(
    tr: &mut Translator<'_>,
    entity: EntityRef,
    kind: EntityKind,
) -> Result<SyncAction, TranslateError> {
    let key = tr.key(entity);
    let shading = matches!(kind, EntityKind::Shader | EntityKind::ImageSource);
    let found = if shading {
        tr.session.shaders.find(&ShaderKey::main(key))
    } else {
        tr.session.nodes.find(&key)
    };
    let Some(node) = found else {
        debug!(%entity, "edit to an untranslated entity ignored");
        return Ok(SyncAction::Ignored);
    };

    let expected = catalog::expected_type(tr.host, entity);
    let current = tr.renderer.node_type(node);
    if expected.is_some() && expected == current {
        match kind {
            EntityKind::Shader => tr.patch_shader(entity, node)?,
            EntityKind::ImageSource => tr.load_image_parameters(entity, node)?,
            _ => tr.load_entity_parameters(entity, node)?,
        }
        return Ok(SyncAction::Patched(1));
    }

    info!(%entity, from = ?current, to = ?expected, "renderer type changed; rebuilding node");
    let detached = tr.session.destroy_node(tr.renderer, node)?;
    let new = tr.translate_entity(entity)?;
    if let Some(new) = new {
        let restored = tr.session.bindings.restore(tr.renderer, detached, node, new)?;
        debug!(%node, %new, restored, "dependents re-pointed");
    }
    Ok(SyncAction::Rebuilt { old: node, new })
}

fn patch_shaders(
    tr: &mut Translator<'_>,
    shaders: Vec<EntityRef>,
) -> Result<SyncAction, TranslateError> {
    let mut patched = 0;
    for shader in shaders {
        if let Some(node) = tr.session.shaders.find(&ShaderKey::main(tr.key(shader))) {
            tr.patch_shader(shader, node)?;
            patched += 1;
        }
    }
    Ok(SyncAction::Patched(patched))
}

/// Curves and expressions may drive any parameter; every cached shader,
/// object, point primitive and instance node at the edit's key time is
/// re-loaded.
fn patch_everything(tr: &mut Translator<'_>) -> Result<SyncAction, TranslateError> {
    let at = |t: KeyTime, lookup: KeyTime| t == lookup || t == KeyTime::Invariant;
    let lookup = KeyTime::At(tr.session.lookup_time(tr.time));
    let shaders: Vec<(EntityRef, NodeHandle)> = tr
        .session
        .shaders
        .iter()
        .filter(|(k, _)| k.target.is_none() && at(k.time, lookup))
        .map(|(k, h)| (k.entity, h))
        .collect();
    let objects: Vec<(EntityRef, NodeHandle)> = tr
        .session
        .nodes
        .iter()
        .filter(|(k, _)| at(k.time, lookup))
        .map(|(k, h)| (k.entity, h))
        .collect();
    let mut patched = 0;
    for (shader, node) in shaders {
        match tr.host.kind(shader) {
            Some(EntityKind::ImageSource) => tr.load_image_parameters(shader, node)?,
            _ => tr.patch_shader(shader, node)?,
        }
        patched += 1;
    }
    for (entity, node) in objects {
        tr.load_entity_parameters(entity, node)?;
        patched += 1;
    }

    let containers: Vec<(EntityRef, String)> = tr
        .session
        .container_names
        .iter()
        .map(|(e, name)| (*e, name.clone()))
        .collect();
    for (entity, container) in containers {
        match tr.host.kind(entity) {
            Some(EntityKind::PointCloud) => {
                let time = tr.key(entity).time;
                if !at(time, lookup) {
                    continue;
                }
                let points: Vec<NodeHandle> = tr
                    .session
                    .groups
                    .get_nodes(&GroupKey::new(container, time))
                    .map(<[NodeHandle]>::to_vec)
                    .unwrap_or_default();
                for (i, node) in points.iter().enumerate() {
                    tr.load_point(entity, *node, i)?;
                }
                patched += points.len();
            }
            Some(EntityKind::Instance) => {
                let tracked = tr
                    .session
                    .instances
                    .keys_for_entity(entity)
                    .iter()
                    .any(|k| at(k.instance.time, lookup));
                if tracked {
                    patched += tr.translate_instance(entity)?.len();
                }
            }
            _ => {}
        }
    }
    Ok(SyncAction::Patched(patched))
}

fn patch_pass(tr: &mut Translator<'_>, pass: EntityRef) -> Result<SyncAction, TranslateError> {
    let Some(options) = tr.session.nodes.find(&tr.key(pass)) else {
        return Ok(SyncAction::Ignored);
    };
    tr.load_entity_parameters(pass, options)?;
    let pass_shaders = tr
        .session
        .settings()
        .output
        .contains(OutputMask::PASS_SHADERS);
    let current = fingerprint(tr.host, pass, tr.time);
    if pass_shaders && tr.session.pass_fingerprint.as_ref() != Some(&current) {
        debug!(%pass, "pass shader topology changed; re-translating stacks");
        tr.translate_pass_shaders(pass)?;
    }
    Ok(SyncAction::Patched(1))
}

fn patch_point_cloud(
    tr: &mut Translator<'_>,
    cloud: EntityRef,
) -> Result<SyncAction, TranslateError> {
    let Some(container) = tr.session.container_names.get(&cloud).cloned() else {
        return Ok(SyncAction::Ignored);
    };
    let group = GroupKey::new(container, tr.key(cloud).time);
    let before: Vec<NodeHandle> = tr
        .session
        .groups
        .get_nodes(&group)
        .map(<[NodeHandle]>::to_vec)
        .unwrap_or_default();
    let nodes = tr.translate_point_cloud(cloud)?;
    if nodes == before {
        for (i, node) in nodes.iter().enumerate() {
            tr.load_point(cloud, *node, i)?;
        }
        return Ok(SyncAction::Patched(nodes.len()));
    }

    // Re-expansion dropped the old primitives; re-attach instances of this cloud.
    let instances: Vec<EntityRef> = tr
        .host
        .enumerate(Scope::Scene, Some(EntityKind::Instance))
        .into_iter()
        .filter(|i| {
            tr.host
                .evaluate(*i, "master", tr.time)
                .and_then(|v| v.as_entity())
                == Some(cloud)
        })
        .filter(|i| !tr.session.instances.keys_for_entity(*i).is_empty())
        .collect();
    for instance in instances {
        tr.translate_instance(instance)?;
    }
    Ok(SyncAction::Patched(nodes.len()))
}

fn remove_entity(tr: &mut Translator<'_>, entity: EntityRef) -> Result<SyncAction, TranslateError> {
    let mut handles: Vec<NodeHandle> = Vec::new();
    handles.extend(
        tr.session
            .nodes
            .keys_for_entity(entity)
            .iter()
            .filter_map(|k| tr.session.nodes.find(k)),
    );
    handles.extend(
        tr.session
            .shaders
            .keys_for_entity(entity)
            .iter()
            .filter_map(|k| tr.session.shaders.find(k)),
    );
    handles.extend(
        tr.session
            .instances
            .keys_for_entity(entity)
            .iter()
            .filter_map(|k| tr.session.instances.find(k)),
    );
    if let Some(container) = tr.session.container_names.remove(&entity) {
        for key in tr.session.groups.keys_for_container(&container) {
            handles.extend(tr.session.groups.erase_group(&key).unwrap_or_default());
        }
    }
    handles.sort();
    handles.dedup();

    let owners: Vec<EntityRef> = tr
        .session
        .layer_owners
        .remove(&entity)
        .map(|s| s.into_iter().collect())
        .unwrap_or_default();
    for shaders in tr.session.layer_owners.values_mut() {
        shaders.remove(&entity);
    }
    tr.session.layer_chains.retain(|k, _| k.entity != entity);

    let mut dependents = Vec::new();
    for node in &handles {
        for slot in tr.session.destroy_node(tr.renderer, *node)? {
            if tr.session.instances.contains_handle(slot.dest) {
                dependents.push(slot.dest);
            }
        }
    }
    dependents.sort();
    dependents.dedup();
    dependents.retain(|d| !handles.contains(d));
    for node in &dependents {
        tr.session.destroy_node(tr.renderer, *node)?;
    }
    let removed = handles.len() + dependents.len();
    if removed > 0 {
        info!(%entity, removed, "entity removed");
    }

    if !owners.is_empty() {
        patch_shaders(tr, owners)?;
    }
    Ok(SyncAction::Removed(removed))
}

enum Merge {
    Replace(HostEvent),
    Append(HostEvent),
    Keep,
}

/// Collapses a drained batch of events.
///
/// A pass change or scene close makes every other event moot. Otherwise one
/// event per entity survives: repeated value changes merge, a removal
/// supersedes earlier edits, and an addition absorbs later value changes.
/// An addition after a removal or an edit is kept as a separate event.
fn coalesce(events: Vec<HostEvent>) -> Vec<HostEvent> {
    if events.iter().any(|e| matches!(e, HostEvent::SceneClosed)) {
        return vec![HostEvent::SceneClosed];
    }
    if events.iter().any(|e| matches!(e, HostEvent::PassChanged)) {
        return vec![HostEvent::PassChanged];
    }
    let mut out: Vec<HostEvent> = Vec::with_capacity(events.len());
    let mut slot: FxHashMap<EntityRef, usize> = FxHashMap::default();
    for event in events {
        let Some(entity) = event.entity() else {
            continue;
        };
        let Some(&at) = slot.get(&entity) else {
            slot.insert(entity, out.len());
            out.push(event);
            continue;
        };
        let merged = match (&out[at], event) {
            (
                HostEvent::ValueChanged { parameter: p0, .. },
                HostEvent::ValueChanged {
                    parameter, time, ..
                },
            ) => Merge::Replace(HostEvent::ValueChanged {
                entity,
                parameter: if *p0 == parameter { parameter } else { None },
                time,
            }),
            (
                _,
                HostEvent::ValueChanged { .. } | HostEvent::PassChanged | HostEvent::SceneClosed,
            ) => Merge::Keep,
            (_, removed @ HostEvent::EntityRemoved { .. }) => Merge::Replace(removed),
            (HostEvent::EntityAdded { .. }, HostEvent::EntityAdded { .. }) => {
                warn!(%entity, "duplicate add notification dropped");
                Merge::Keep
            }
            (_, added @ HostEvent::EntityAdded { .. }) => Merge::Append(added),
        };
        match merged {
            Merge::Replace(event) => out[at] = event,
            Merge::Append(event) => {
                slot.insert(entity, out.len());
                out.push(event);
            }
            Merge::Keep => {}
        }
    }
    out
}
