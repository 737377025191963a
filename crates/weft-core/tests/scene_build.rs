// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Full build passes: stage order, output masks, interruption and options
//! failures.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{at, settings};
use weft_core::motion::{MotionSettings, ShutterPosition};
use weft_core::settings::ModeSetting;
use weft_core::{
    BuildStatus, Interrupt, OutputMask, SceneBuilder, SessionSettings, Stage, TranslateError,
    TranslationSession,
};
use weft_dry_tests::{basic_scene, MockHost, MockRenderer};
use weft_port::{EntityKind, Severity, Value};

fn build(
    host: &MockHost,
    renderer: &mut MockRenderer,
    settings: SessionSettings,
) -> (TranslationSession, Result<weft_core::BuildReport, TranslateError>) {
    let mut session = TranslationSession::new(settings);
    let report = SceneBuilder::build(&mut session, host, renderer, at(1.0), &Interrupt::new());
    (session, report)
}

#[test]
fn stages_run_in_fixed_order_with_counts() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let (_, report) = build(&host, &mut renderer, SessionSettings::default());
    let report = report.unwrap();

    assert_eq!(report.status, BuildStatus::Complete);
    let stages: Vec<Stage> = report.counts.iter().map(|(s, _)| *s).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());
    assert_eq!(report.count(Stage::Options), Some(1));
    assert_eq!(report.count(Stage::Cameras), Some(1));
    assert_eq!(report.count(Stage::PassShaders), Some(3));
    assert_eq!(report.count(Stage::Lights), Some(1));
    assert_eq!(report.count(Stage::PolyMeshes), Some(1));
    assert_eq!(report.count(Stage::Instances), Some(0));
    assert_eq!(report.failures, 0);

    // The camera was reached through the pass first and reused by its stage.
    assert_eq!(renderer.nodes_of_type("persp_camera").len(), 1);
    let options = renderer.nodes_of_type("options")[0];
    assert_eq!(renderer.param(options, "xres"), Some(&Value::Int(640)));
    assert!(renderer.pause_balanced());
    assert_eq!(renderer.unpaused_mutations, 0);
}

#[test]
fn masked_stage_is_skipped_without_touching_the_renderer() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut settings = SessionSettings::default();
    settings.output.remove(OutputMask::LIGHTS);
    let (_, report) = build(&host, &mut renderer, settings);
    let report = report.unwrap();

    assert_eq!(report.skipped, vec![Stage::Lights]);
    assert_eq!(report.count(Stage::Lights), None);
    assert!(renderer.nodes_of_type("point_light").is_empty());
    assert_eq!(renderer.nodes_of_type("polymesh").len(), 1);
}

#[test]
fn materials_only_export_translates_bound_shaders() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let settings = SessionSettings {
        output: OutputMask::OPTIONS | OutputMask::MATERIALS,
        ..SessionSettings::default()
    };
    let (_, report) = build(&host, &mut renderer, settings);
    let report = report.unwrap();

    assert_eq!(report.materials, 1);
    assert!(report.skipped.contains(&Stage::PolyMeshes));
    assert!(renderer.nodes_of_type("polymesh").is_empty());
    assert_eq!(renderer.nodes_of_type("standard_surface").len(), 1);
}

#[test]
fn geometry_without_materials_leaves_the_slot_empty() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut settings = SessionSettings::default();
    settings.output.remove(OutputMask::MATERIALS);
    let (_, report) = build(&host, &mut renderer, settings);
    report.unwrap();

    let mesh = renderer.nodes_of_type("polymesh")[0];
    assert_eq!(renderer.param(mesh, "shader"), None);
    assert!(renderer.nodes_of_type("standard_surface").is_empty());
}

#[test]
fn interrupt_raised_before_the_pass_aborts_at_options() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut session = TranslationSession::new(SessionSettings::default());
    let interrupt = Interrupt::new();
    interrupt.raise();

    let report =
        SceneBuilder::build(&mut session, &host, &mut renderer, at(1.0), &interrupt).unwrap();
    assert_eq!(
        report.status,
        BuildStatus::Aborted {
            stage: Stage::Options
        }
    );
    assert!(report.counts.is_empty());
    assert_eq!(renderer.live_count(), 0);
    assert!(renderer.pause_balanced());
}

#[test]
fn interrupt_during_geometry_keeps_what_was_built() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut session = TranslationSession::new(SessionSettings::default());
    let interrupt = Interrupt::new();
    let trigger = interrupt.clone();
    host.on_enumerate(move |kind| {
        if kind == Some(EntityKind::PolyMesh) {
            trigger.raise();
        }
    });

    let report =
        SceneBuilder::build(&mut session, &host, &mut renderer, at(1.0), &interrupt).unwrap();
    assert_eq!(
        report.status,
        BuildStatus::Aborted {
            stage: Stage::PolyMeshes
        }
    );
    assert_eq!(report.count(Stage::PolyMeshes), Some(0));
    assert_eq!(report.count(Stage::Lights), Some(1));
    assert!(renderer.nodes_of_type("polymesh").is_empty());
    // Earlier stages stay translated and cached.
    assert_eq!(session.nodes().len(), 3);
    assert!(renderer.pause_balanced());
}

#[test]
fn missing_pass_aborts_a_batch_export() {
    let host = MockHost::new();
    host.add(EntityKind::PolyMesh, "Body");
    let mut renderer = MockRenderer::standard();
    let (_, report) = build(&host, &mut renderer, settings(ModeSetting::Batch));

    assert!(matches!(report, Err(TranslateError::OptionsFailed(_))));
    let errors: Vec<_> = host
        .messages()
        .into_iter()
        .filter(|(s, m)| *s == Severity::Error && m.contains("export aborted"))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(renderer.pause_balanced());
}

#[test]
fn missing_pass_only_warns_interactively() {
    let host = MockHost::new();
    host.add(EntityKind::PolyMesh, "Body");
    let mut renderer = MockRenderer::standard();
    let (_, report) = build(&host, &mut renderer, settings(ModeSetting::ManualRebuild));
    let report = report.unwrap();

    assert_eq!(report.count(Stage::Options), Some(0));
    assert_eq!(report.count(Stage::PolyMeshes), Some(1));
    assert_eq!(host.messages_containing("Options translation failed"), 1);
}

#[test]
fn motion_keys_write_a_matrix_per_key_and_the_shutter_range() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let moved = Value::Matrix([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [2.0, 0.0, 0.0, 1.0],
    ]);
    host.set_keyed(
        scene.mesh,
        "matrix",
        vec![(0.0, Value::IDENTITY), (1.0, moved.clone())],
    );
    let mut renderer = MockRenderer::standard();
    let settings = SessionSettings {
        motion: MotionSettings {
            enabled: true,
            transform_keys: 3,
            shutter: [-0.25, 0.25],
            position: ShutterPosition::Center,
        },
        ..SessionSettings::default()
    };
    let (_, report) = build(&host, &mut renderer, settings);
    report.unwrap();

    let mesh = renderer.nodes_of_type("polymesh")[0];
    // Keys at 0.75, 1.0 and 1.25; the step curve switches at 1.0.
    assert_eq!(
        renderer.param(mesh, "matrix"),
        Some(&Value::Array(vec![Value::IDENTITY, moved.clone(), moved]))
    );
    assert_eq!(renderer.param(mesh, "motion_start"), Some(&Value::Float(-0.25)));
    assert_eq!(renderer.param(mesh, "motion_end"), Some(&Value::Float(0.25)));
}
