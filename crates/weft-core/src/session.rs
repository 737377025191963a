// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The translation session: one explicit owner for every identity structure.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use weft_port::{EntityRef, HostScene, NodeHandle, RenderError, RenderGraph, TimeKey};

use crate::bindings::{BindingLedger, DetachedBinding};
use crate::branch::BranchStep;
use crate::group::GroupRegistry;
use crate::identity::IdentityMap;
use crate::key::{InstanceKey, KeyTime, NodeKey, ShaderKey};
use crate::missing::MissingTranslationSet;
use crate::settings::{ModeSetting, SessionSettings};

/// Runtime session mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// One-shot export. Host edits are not tracked.
    BatchExport,
    /// Interactive; edits patch in place and a time change rebuilds.
    InteractiveManualRebuild,
    /// Interactive; node identities stay keyed at the pinned time while
    /// parameter values follow the current time.
    InteractiveFlythrough {
        /// Time at which the session began; `None` until the next pass pins it.
        pinned: Option<TimeKey>,
    },
}

impl SessionMode {
    /// Runtime mode for a persisted setting. Flythrough starts unpinned.
    pub fn from_setting(setting: ModeSetting) -> Self {
        match setting {
            ModeSetting::Batch => Self::BatchExport,
            ModeSetting::ManualRebuild => Self::InteractiveManualRebuild,
            ModeSetting::Flythrough => Self::InteractiveFlythrough { pinned: None },
        }
    }

    /// Returns `true` for both interactive modes.
    pub fn is_interactive(self) -> bool {
        !matches!(self, Self::BatchExport)
    }

    /// Returns `true` in flythrough mode.
    pub fn is_flythrough(self) -> bool {
        matches!(self, Self::InteractiveFlythrough { .. })
    }
}

/// All translation state for one render session.
///
/// Created at session start and dropped at session end; every translator and
/// the sync controller receive it by reference.
#[derive(Debug)]
pub struct TranslationSession {
    pub(crate) nodes: IdentityMap<NodeKey>,
    pub(crate) shaders: IdentityMap<ShaderKey>,
    pub(crate) instances: IdentityMap<InstanceKey>,
    pub(crate) groups: GroupRegistry,
    pub(crate) missing: MissingTranslationSet,
    pub(crate) bindings: BindingLedger,
    pub(crate) settings: SessionSettings,
    mode: SessionMode,
    /// Composite nodes used by each shader's layer stack on its last translation.
    pub(crate) layer_chains: FxHashMap<ShaderKey, Vec<NodeHandle>>,
    /// Layer entity -> shaders whose stack includes it.
    pub(crate) layer_owners: FxHashMap<EntityRef, FxHashSet<EntityRef>>,
    /// Container entity -> group container name.
    pub(crate) container_names: FxHashMap<EntityRef, String>,
    /// Structural summary of the pass shader branches at the last translation.
    pub(crate) pass_fingerprint: Option<Vec<BranchStep>>,
}

impl TranslationSession {
    /// Starts a session with the given settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            nodes: IdentityMap::new(),
            shaders: IdentityMap::new(),
            instances: IdentityMap::new(),
            groups: GroupRegistry::new(),
            missing: MissingTranslationSet::new(),
            bindings: BindingLedger::new(),
            mode: SessionMode::from_setting(settings.mode),
            settings,
            layer_chains: FxHashMap::default(),
            layer_owners: FxHashMap::default(),
            container_names: FxHashMap::default(),
            pass_fingerprint: None,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Switches mode.
    ///
    /// Entering flythrough from another mode always starts unpinned, so the
    /// next pass pins its own time. A pinned time is only carried over while
    /// staying in flythrough.
    pub fn set_mode(&mut self, mode: SessionMode) {
        let mode = match mode {
            SessionMode::InteractiveFlythrough { .. } if !self.mode.is_flythrough() => {
                SessionMode::InteractiveFlythrough { pinned: None }
            }
            other => other,
        };
        debug!(from = ?self.mode, to = ?mode, "session mode change");
        self.mode = mode;
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// General node map.
    pub fn nodes(&self) -> &IdentityMap<NodeKey> {
        &self.nodes
    }

    /// Shader, image and layer-composite map.
    pub fn shaders(&self) -> &IdentityMap<ShaderKey> {
        &self.shaders
    }

    /// Instance map.
    pub fn instances(&self) -> &IdentityMap<InstanceKey> {
        &self.instances
    }

    /// Container expansions.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Types that failed to translate this session.
    pub fn missing(&self) -> &MissingTranslationSet {
        &self.missing
    }

    /// Link/reference ledger.
    pub fn bindings(&self) -> &BindingLedger {
        &self.bindings
    }

    /// Pins the flythrough time on the first pass after (re)entering flythrough.
    pub fn begin_pass(&mut self, time: TimeKey) {
        if let SessionMode::InteractiveFlythrough { pinned: None } = self.mode {
            debug!(%time, "pinning flythrough time");
            self.mode = SessionMode::InteractiveFlythrough { pinned: Some(time) };
        }
    }

    /// Forgets the pinned flythrough time so the next pass re-pins it.
    pub fn reset_flythrough(&mut self) {
        if self.mode.is_flythrough() {
            self.mode = SessionMode::InteractiveFlythrough { pinned: None };
        }
    }

    /// Time used for identity lookups: the pinned time in flythrough, else `time`.
    pub fn lookup_time(&self, time: TimeKey) -> TimeKey {
        match self.mode {
            SessionMode::InteractiveFlythrough { pinned: Some(pinned) } => pinned,
            _ => time,
        }
    }

    /// Key time for `entity` at `time`.
    pub fn key_time(&self, host: &dyn HostScene, entity: EntityRef, time: TimeKey) -> KeyTime {
        if host.is_time_invariant(entity) {
            KeyTime::Invariant
        } else {
            KeyTime::At(self.lookup_time(time))
        }
    }

    /// Identity key for `entity` at `time`.
    pub fn node_key(&self, host: &dyn HostScene, entity: EntityRef, time: TimeKey) -> NodeKey {
        NodeKey {
            entity,
            time: self.key_time(host, entity, time),
        }
    }

    /// Removes `handle` from every identity structure without touching the
    /// renderer. Returns the number of structures that held it.
    pub fn purge_handle(&mut self, handle: NodeHandle) -> usize {
        let mut hits = 0;
        hits += usize::from(!self.nodes.erase_by_handle(handle).is_empty());
        hits += usize::from(!self.shaders.erase_by_handle(handle).is_empty());
        hits += usize::from(!self.instances.erase_by_handle(handle).is_empty());
        hits += self.groups.erase_node_everywhere(handle);
        for chain in self.layer_chains.values_mut() {
            chain.retain(|h| *h != handle);
        }
        hits
    }

    /// Destroys a translator-created node.
    ///
    /// Dependents are unbound first, then the handle is purged from every map,
    /// group and ledger entry, then the renderer node is destroyed. The
    /// returned bindings can be re-pointed at a replacement node.
    pub fn destroy_node(
        &mut self,
        renderer: &mut dyn RenderGraph,
        handle: NodeHandle,
    ) -> Result<Vec<DetachedBinding>, RenderError> {
        let detached = self.bindings.detach(renderer, handle)?;
        self.purge_handle(handle);
        self.bindings.forget_dest(handle);
        match renderer.destroy_node(handle) {
            Ok(()) | Err(RenderError::UnknownNode(_)) => {}
            Err(err) => return Err(err),
        }
        debug!(%handle, dependents = detached.len(), "node destroyed");
        Ok(detached)
    }

    /// Number of identity structures still referring to `handle`.
    pub fn references(&self, handle: NodeHandle) -> usize {
        usize::from(self.nodes.contains_handle(handle))
            + usize::from(self.shaders.contains_handle(handle))
            + usize::from(self.instances.contains_handle(handle))
            + usize::from(self.groups.contains_node(handle))
            + usize::from(self.bindings.mentions(handle))
            + usize::from(self.layer_chains.values().any(|c| c.contains(&handle)))
    }

    /// Drops every mapping without touching the renderer.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.shaders.clear();
        self.instances.clear();
        self.groups.clear();
        self.bindings.clear();
        self.layer_chains.clear();
        self.layer_owners.clear();
        self.container_names.clear();
        self.pass_fingerprint = None;
    }

    /// Full teardown: clears the renderer scene and every session structure,
    /// including the missing-type set.
    pub fn teardown(&mut self, renderer: &mut dyn RenderGraph) {
        renderer.clear();
        self.clear();
        self.missing.clear();
    }
}
