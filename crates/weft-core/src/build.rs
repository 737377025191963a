// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Full scene-build pass.
//!
//! One pass per requested time, in a fixed stage order: later stages look up
//! nodes created by earlier ones (instances need their masters, pass shader
//! stacks may reference the camera).

use tracing::{debug, info, instrument, warn};
use weft_port::{EntityKind, EntityRef, HostScene, RenderGraph, Scope, Severity, TimeKey};

use crate::error::TranslateError;
use crate::interrupt::Interrupt;
use crate::pause::RenderPause;
use crate::session::{SessionMode, TranslationSession};
use crate::settings::OutputMask;
use crate::shading::Translator;
use crate::source::{resolve_source, Source};

/// One stage of a build pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Options node from the active pass.
    Options,
    /// Scene operators.
    Operators,
    /// Cameras.
    Cameras,
    /// Imagers.
    Imagers,
    /// Background / atmosphere / AOV shader stacks.
    PassShaders,
    /// Lights.
    Lights,
    /// Polygon meshes.
    PolyMeshes,
    /// Curves and hair.
    Curves,
    /// Point clouds.
    PointClouds,
    /// Instances.
    Instances,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDER: [Stage; 10] = [
        Stage::Options,
        Stage::Operators,
        Stage::Cameras,
        Stage::Imagers,
        Stage::PassShaders,
        Stage::Lights,
        Stage::PolyMeshes,
        Stage::Curves,
        Stage::PointClouds,
        Stage::Instances,
    ];

    /// Output-mask bit gating this stage.
    pub fn mask(self) -> OutputMask {
        match self {
            Self::Options => OutputMask::OPTIONS,
            Self::Operators => OutputMask::OPERATORS,
            Self::Cameras => OutputMask::CAMERAS,
            Self::Imagers => OutputMask::IMAGERS,
            Self::PassShaders => OutputMask::PASS_SHADERS,
            Self::Lights => OutputMask::LIGHTS,
            Self::PolyMeshes => OutputMask::POLYMESHES,
            Self::Curves => OutputMask::CURVES,
            Self::PointClouds => OutputMask::POINT_CLOUDS,
            Self::Instances => OutputMask::INSTANCES,
        }
    }

    /// Host entity kind the stage enumerates.
    pub fn kind(self) -> EntityKind {
        match self {
            Self::Options | Self::PassShaders => EntityKind::Pass,
            Self::Operators => EntityKind::Operator,
            Self::Cameras => EntityKind::Camera,
            Self::Imagers => EntityKind::Imager,
            Self::Lights => EntityKind::Light,
            Self::PolyMeshes => EntityKind::PolyMesh,
            Self::Curves => EntityKind::Curves,
            Self::PointClouds => EntityKind::PointCloud,
            Self::Instances => EntityKind::Instance,
        }
    }

    /// Returns `true` for the geometry stages, which poll the interrupt per object.
    pub fn is_geometry(self) -> bool {
        OutputMask::GEOMETRY.contains(self.mask())
    }
}

/// How a pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    /// Every unmasked stage ran.
    Complete,
    /// The interrupt was raised; `stage` and everything after it did not finish.
    /// Nodes translated so far stay valid and cached.
    Aborted {
        /// Stage that observed the interrupt.
        stage: Stage,
    },
}

/// Summary of one build pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    /// Requested time.
    pub time: TimeKey,
    /// Entities translated per stage that ran.
    pub counts: Vec<(Stage, usize)>,
    /// Stages skipped by the output mask.
    pub skipped: Vec<Stage>,
    /// Materials translated for masked-out geometry.
    pub materials: usize,
    /// Entities whose translation failed; the pass continued past them.
    pub failures: usize,
    /// Completion status.
    pub status: BuildStatus,
}

impl BuildReport {
    fn new(time: TimeKey) -> Self {
        Self {
            time,
            counts: Vec::new(),
            skipped: Vec::new(),
            materials: 0,
            failures: 0,
            status: BuildStatus::Complete,
        }
    }

    /// Count recorded for `stage`, if it ran.
    pub fn count(&self, stage: Stage) -> Option<usize> {
        self.counts
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, n)| *n)
    }

    /// Returns `true` if the pass was interrupted.
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, BuildStatus::Aborted { .. })
    }
}

/// Drives full translation passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneBuilder;

impl SceneBuilder {
    /// Runs one pass at `time`.
    ///
    /// The renderer is paused for the whole pass. Per-entity failures are
    /// logged and counted; only an options failure during a batch export with
    /// `abort_on_options_failure` set fails the pass.
    #[instrument(skip_all, fields(time = %time))]
    pub fn build(
        session: &mut TranslationSession,
        host: &dyn HostScene,
        renderer: &mut dyn RenderGraph,
        time: TimeKey,
        interrupt: &Interrupt,
    ) -> Result<BuildReport, TranslateError> {
        let mut paused = RenderPause::acquire(renderer);
        session.begin_pass(time);
        let mask = session.settings().output;
        let abort_on_options = session.mode() == SessionMode::BatchExport
            && session.settings().abort_on_options_failure;
        let mut tr = Translator::new(session, host, &mut *paused, time);
        let mut report = BuildReport::new(time);

        for stage in Stage::ORDER {
            if interrupt.is_raised() {
                report.status = BuildStatus::Aborted { stage };
                break;
            }
            if !mask.contains(stage.mask()) {
                report.skipped.push(stage);
                if stage.is_geometry() && mask.contains(OutputMask::MATERIALS) {
                    report.materials += translate_materials(&mut tr, stage, &mut report.failures);
                }
                continue;
            }
            let entities = host.enumerate(Scope::Scene, Some(stage.kind()));
            let mut count = 0;
            if stage == Stage::Options {
                count = build_options(&mut tr, &entities, abort_on_options)?;
                report.counts.push((stage, count));
                continue;
            }
            for entity in entities {
                if stage.is_geometry() && interrupt.is_raised() {
                    report.status = BuildStatus::Aborted { stage };
                    break;
                }
                match translate_for_stage(&mut tr, stage, entity) {
                    Ok(n) => count += n,
                    Err(err) => {
                        report.failures += 1;
                        warn!(?stage, %entity, error = %err, "translation failed; continuing");
                    }
                }
            }
            report.counts.push((stage, count));
            if report.is_aborted() {
                break;
            }
        }

        info!(status = ?report.status, failures = report.failures, "build pass finished");
        Ok(report)
    }
}

fn build_options(
    tr: &mut Translator<'_>,
    passes: &[EntityRef],
    abort_on_failure: bool,
) -> Result<usize, TranslateError> {
    let failure = match passes.first() {
        None => "no active pass".to_owned(),
        Some(pass) => match tr.translate_object(*pass) {
            Ok(Some(_)) => return Ok(1),
            Ok(None) => format!("pass {pass} has no options translation"),
            Err(err) => err.to_string(),
        },
    };
    if abort_on_failure {
        tr.host.report(
            Severity::Error,
            &format!("Options translation failed: {failure}; export aborted"),
        );
        return Err(TranslateError::OptionsFailed(failure));
    }
    warn!(%failure, "options translation failed; continuing");
    tr.host.report(
        Severity::Warning,
        &format!("Options translation failed: {failure}"),
    );
    Ok(0)
}

fn translate_for_stage(
    tr: &mut Translator<'_>,
    stage: Stage,
    entity: EntityRef,
) -> Result<usize, TranslateError> {
    Ok(match stage {
        Stage::PassShaders => tr.translate_pass_shaders(entity)?,
        Stage::PointClouds => tr.translate_point_cloud(entity)?.len(),
        Stage::Instances => tr.translate_instance(entity)?.len(),
        _ => usize::from(tr.translate_object(entity)?.is_some()),
    })
}

/// Materials-only path for a masked geometry stage.
fn translate_materials(tr: &mut Translator<'_>, stage: Stage, failures: &mut usize) -> usize {
    let mut translated = 0;
    for entity in tr.host.enumerate(Scope::Scene, Some(stage.kind())) {
        let shader = match resolve_source(tr.host, entity, "shader", tr.time) {
            Ok(Source::Shader { shader, .. }) => shader,
            Ok(Source::PlainValue(value)) => match value.as_entity() {
                Some(shader) => shader,
                None => continue,
            },
            Ok(_) => continue,
            Err(err) => {
                debug!(%entity, error = %err, "material source unresolved");
                continue;
            }
        };
        match tr.translate_upstream(shader, true) {
            Ok(Some(_)) => translated += 1,
            Ok(None) => {}
            Err(err) => {
                *failures += 1;
                warn!(%entity, error = %err, "material translation failed; continuing");
            }
        }
    }
    translated
}
