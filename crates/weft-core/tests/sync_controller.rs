// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Interactive synchronization: adds, removals, coalescing, rebuild
//! scheduling, point-cloud re-expansion and flythrough refresh.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::cell::Cell;

use common::{at, built, changed, settings};
use weft_core::settings::ModeSetting;
use weft_core::{
    BuildStatus, NodeKey, OutputMask, RenderOutcome, SessionSettings, Stage, SyncAction,
    SyncController, SyncState,
};
use weft_dry_tests::{basic_scene, MockHost, MockRenderer};
use weft_port::{Connection, EntityKind, EntityRef, HostEvent, NodeHandle, RenderGraph, Value};

/// A three-point cloud and one instance of it.
fn cloud_scene(host: &MockHost) -> (EntityRef, EntityRef) {
    let cloud = host.add(EntityKind::PointCloud, "Dots");
    host.set(cloud, "primitive_count", 3_i64);
    host.set(cloud, "radius", 0.1_f32);
    let copy = host.add(EntityKind::Instance, "Copy");
    host.set(copy, "master", cloud);
    host.set(copy, "matrix", Value::IDENTITY);
    (cloud, copy)
}

fn instance_targets(renderer: &MockRenderer) -> Vec<Option<NodeHandle>> {
    renderer
        .nodes_of_type("ginstance")
        .into_iter()
        .map(|g| renderer.param(g, "node").and_then(Value::as_node))
        .collect()
}

#[test]
fn removing_a_shader_unbinds_its_dependents() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));
    let surface = renderer.nodes_of_type("standard_surface")[0];

    host.remove(scene.surface);
    controller.inbox().post(HostEvent::EntityRemoved {
        entity: scene.surface,
    });
    let actions = controller.pump(&host, &mut renderer).unwrap();
    assert_eq!(actions, vec![SyncAction::Removed(1)]);

    let mesh = renderer.nodes_of_type("polymesh")[0];
    assert_eq!(renderer.param(mesh, "shader"), None);
    assert_eq!(controller.session().references(surface), 0);
    assert!(renderer.dangling_references().is_empty());
}

#[test]
fn removing_a_point_cloud_takes_its_instances_with_it() {
    let host = MockHost::new();
    basic_scene(&host);
    let (cloud, _) = cloud_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));
    assert_eq!(renderer.nodes_of_type("points").len(), 3);
    assert_eq!(renderer.nodes_of_type("ginstance").len(), 3);

    host.remove(cloud);
    let action = controller
        .handle_event(&host, &mut renderer, HostEvent::EntityRemoved { entity: cloud })
        .unwrap();
    assert_eq!(action, SyncAction::Removed(6));
    assert!(renderer.nodes_of_type("points").is_empty());
    assert!(renderer.nodes_of_type("ginstance").is_empty());
    assert!(controller.session().instances().is_empty());
    assert!(renderer.dangling_references().is_empty());
}

#[test]
fn point_count_change_re_expands_and_reattaches_instances() {
    let host = MockHost::new();
    basic_scene(&host);
    let (cloud, _) = cloud_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);
    let before = renderer.nodes_of_type("points");
    assert_eq!(renderer.node(before[2]).unwrap().name, "Dots.2.1");

    host.set(cloud, "primitive_count", 5_i64);
    let action = controller
        .handle_event(&host, &mut renderer, changed(cloud, "primitive_count", t1))
        .unwrap();
    assert_eq!(action, SyncAction::Patched(5));

    let points = renderer.nodes_of_type("points");
    assert_eq!(points.len(), 5);
    assert!(before.iter().all(|p| renderer.node(*p).is_none()));
    assert_eq!(renderer.param(points[4], "index"), Some(&Value::Int(4)));
    let targets = instance_targets(&renderer);
    assert_eq!(targets.len(), 5);
    assert!(targets.iter().all(|t| t.is_some_and(|p| points.contains(&p))));
    assert!(renderer.dangling_references().is_empty());
}

#[test]
fn unchanged_point_count_patches_in_place() {
    let host = MockHost::new();
    basic_scene(&host);
    let (cloud, _) = cloud_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);
    let points = renderer.nodes_of_type("points");

    host.set(cloud, "radius", 0.4_f32);
    let action = controller
        .handle_event(&host, &mut renderer, changed(cloud, "radius", t1))
        .unwrap();
    assert_eq!(action, SyncAction::Patched(3));
    assert_eq!(renderer.nodes_of_type("points"), points);
    assert!(points
        .iter()
        .all(|p| renderer.param(*p, "radius") == Some(&Value::Float(0.4))));
}

#[test]
fn added_entities_are_point_translated_unless_masked() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));

    let fill = host.add_typed(EntityKind::Light, "Fill", "spot");
    let action = controller
        .handle_event(&host, &mut renderer, HostEvent::EntityAdded { entity: fill })
        .unwrap();
    let SyncAction::Added(Some(node)) = action else {
        panic!("expected an added node, got {action:?}");
    };
    assert_eq!(renderer.node_type(node).as_deref(), Some("spot_light"));

    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut masked = settings(ModeSetting::ManualRebuild);
    masked.output.remove(OutputMask::LIGHTS);
    let mut controller = SyncController::new(masked);
    controller.render(&host, &mut renderer, at(1.0)).unwrap();
    let fill = host.add_typed(EntityKind::Light, "Fill", "spot");
    let action = controller
        .handle_event(&host, &mut renderer, HostEvent::EntityAdded { entity: fill })
        .unwrap();
    assert_eq!(action, SyncAction::Ignored);
    assert!(renderer.nodes_of_type("spot_light").is_empty());
}

#[test]
fn repeated_edits_to_one_entity_apply_once() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);
    let inbox = controller.inbox();

    host.set(scene.light, "intensity", 3.0_f32);
    inbox.post(changed(scene.light, "intensity", t1));
    host.set(scene.light, "intensity", 4.0_f32);
    inbox.post(changed(scene.light, "intensity", t1));
    let actions = controller.pump(&host, &mut renderer).unwrap();
    assert_eq!(actions, vec![SyncAction::Patched(1)]);

    let light = renderer.nodes_of_type("point_light")[0];
    assert_eq!(renderer.param(light, "intensity"), Some(&Value::Float(4.0)));
    assert!(controller.pump(&host, &mut renderer).unwrap().is_empty());
}

#[test]
fn curve_edit_repatches_every_cached_node_at_that_time() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let ramp = host.add(EntityKind::Curve, "Ramp");
    host.set_curve(ramp, vec![(0.0, 1.0), (2.0, 3.0)]);
    host.connect(
        scene.light,
        "intensity",
        Connection::Curve {
            curve: ramp,
            domain: [0.0, 2.0],
        },
    );
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);
    let light = renderer.nodes_of_type("point_light")[0];
    assert_eq!(renderer.param(light, "intensity"), Some(&Value::Float(2.0)));

    host.set_curve(ramp, vec![(0.0, 5.0), (2.0, 5.0)]);
    let action = controller
        .handle_event(&host, &mut renderer, changed(ramp, "points", t1))
        .unwrap();
    // Skin, plus the options, camera, light and mesh objects.
    assert_eq!(action, SyncAction::Patched(5));
    assert_eq!(renderer.param(light, "intensity"), Some(&Value::Float(5.0)));
}

#[test]
fn curve_edit_repatches_point_primitives_and_instances() {
    let host = MockHost::new();
    basic_scene(&host);
    let (cloud, _) = cloud_scene(&host);
    host.set(cloud, "primitive_count", 2_i64);
    let ramp = host.add(EntityKind::Curve, "Ramp");
    host.set_curve(ramp, vec![(0.0, 1.0), (2.0, 1.0)]);
    host.connect(
        cloud,
        "radius",
        Connection::Curve {
            curve: ramp,
            domain: [0.0, 2.0],
        },
    );
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);
    let points = renderer.nodes_of_type("points");
    assert_eq!(points.len(), 2);
    assert_eq!(renderer.param(points[0], "radius"), Some(&Value::Float(1.0)));

    host.set_curve(ramp, vec![(0.0, 5.0), (2.0, 5.0)]);
    let action = controller
        .handle_event(&host, &mut renderer, changed(ramp, "points", t1))
        .unwrap();
    // Five basic-scene nodes, two primitives and two instance nodes.
    assert_eq!(action, SyncAction::Patched(9));
    for point in &points {
        assert_eq!(renderer.param(*point, "radius"), Some(&Value::Float(5.0)));
    }
    assert_eq!(renderer.nodes_of_type("points"), points);
    assert_eq!(instance_targets(&renderer), vec![Some(points[0]), Some(points[1])]);
}

#[test]
fn interrupted_build_resumes_at_the_same_time() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = SyncController::new(settings(ModeSetting::ManualRebuild));
    let interrupt = controller.interrupt();
    let trigger = interrupt.clone();
    let armed = Cell::new(true);
    host.on_enumerate(move |kind| {
        if kind == Some(EntityKind::PolyMesh) && armed.replace(false) {
            trigger.raise();
        }
    });

    let RenderOutcome::Built(first) = controller.render(&host, &mut renderer, t1).unwrap() else {
        panic!("expected a build");
    };
    assert_eq!(
        first.status,
        BuildStatus::Aborted {
            stage: Stage::PolyMeshes
        }
    );
    assert_eq!(controller.built_time(), None);
    assert_eq!(controller.partial_time(), Some(t1));
    let camera = renderer.nodes_of_type("persp_camera")[0];
    let created = renderer.created.len();

    interrupt.reset();
    let RenderOutcome::Built(second) = controller.render(&host, &mut renderer, t1).unwrap() else {
        panic!("expected the build to resume");
    };
    assert_eq!(second.status, BuildStatus::Complete);
    assert_eq!(renderer.clear_count, 0);
    assert_eq!(renderer.nodes_of_type("persp_camera"), vec![camera]);
    assert_eq!(renderer.nodes_of_type("polymesh").len(), 1);
    // Only the mesh and its material were missing.
    assert_eq!(renderer.created.len(), created + 2);
    assert_eq!(renderer.nodes_of_type("standard_surface").len(), 1);
    assert_eq!(controller.built_time(), Some(t1));
    assert_eq!(controller.partial_time(), None);
    assert_eq!(
        controller.render(&host, &mut renderer, t1).unwrap(),
        RenderOutcome::UpToDate
    );
}

#[test]
fn interrupted_build_is_discarded_by_an_edit_or_a_new_time() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = SyncController::new(settings(ModeSetting::ManualRebuild));
    let interrupt = controller.interrupt();
    let trigger = interrupt.clone();
    host.on_enumerate(move |kind| {
        if kind == Some(EntityKind::PolyMesh) {
            trigger.raise();
        }
    });
    controller.render(&host, &mut renderer, t1).unwrap();
    assert_eq!(controller.partial_time(), Some(t1));

    interrupt.reset();
    let action = controller
        .handle_event(&host, &mut renderer, changed(scene.camera, "fov", t1))
        .unwrap();
    assert_eq!(action, SyncAction::RebuildScheduled);
    assert_eq!(renderer.clear_count, 1);
    assert_eq!(renderer.live_count(), 0);
    assert_eq!(controller.state(), SyncState::PendingFullRebuild);

    controller.render(&host, &mut renderer, t1).unwrap();
    assert_eq!(controller.partial_time(), Some(t1));
    interrupt.reset();
    controller.render(&host, &mut renderer, at(2.0)).unwrap();
    assert_eq!(renderer.clear_count, 2);
    assert!(renderer.find_by_name("CamA.1").is_none());
    assert!(renderer.find_by_name("CamA.2").is_some());
}

#[test]
fn events_posted_during_a_build_schedule_exactly_one_rebuild() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = SyncController::new(settings(ModeSetting::ManualRebuild));
    host.attach_inbox(controller.inbox());
    host.post_during_enumerate(changed(scene.light, "intensity", at(1.0)));
    host.post_during_enumerate(changed(scene.camera, "fov", at(1.0)));

    let first = controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert!(matches!(first, RenderOutcome::Built(_)));
    assert_eq!(controller.state(), SyncState::PendingFullRebuild);
    assert_eq!(renderer.clear_count, 0);

    let second = controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert!(matches!(second, RenderOutcome::Built(_)));
    assert_eq!(controller.state(), SyncState::Idle);
    assert_eq!(renderer.clear_count, 1);

    let third = controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert_eq!(third, RenderOutcome::UpToDate);
    assert_eq!(renderer.clear_count, 1);
}

#[test]
fn pass_change_tears_down_and_rebuilds_on_next_render() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));
    let inbox = controller.inbox();

    inbox.post(changed(scene.light, "intensity", at(1.0)));
    inbox.post(HostEvent::PassChanged);
    let actions = controller.pump(&host, &mut renderer).unwrap();
    assert_eq!(actions, vec![SyncAction::RebuildScheduled]);
    assert_eq!(controller.state(), SyncState::PendingFullRebuild);
    assert_eq!(renderer.live_count(), 0);
    assert!(controller.session().nodes().is_empty());

    // Edits while a rebuild is pending are left to the rebuild.
    let action = controller
        .handle_event(&host, &mut renderer, changed(scene.light, "intensity", at(1.0)))
        .unwrap();
    assert_eq!(action, SyncAction::Ignored);

    let outcome = controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert!(matches!(outcome, RenderOutcome::Built(_)));
    assert_eq!(renderer.nodes_of_type("options").len(), 1);
    assert_eq!(renderer.clear_count, 1);
}

#[test]
fn manual_rebuild_rebuilds_on_time_change() {
    let host = MockHost::new();
    basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));

    let outcome = controller.render(&host, &mut renderer, at(2.0)).unwrap();
    assert!(matches!(outcome, RenderOutcome::Built(_)));
    assert_eq!(controller.built_time(), Some(at(2.0)));
    assert!(renderer.find_by_name("CamA.2").is_some());
    assert!(renderer.find_by_name("CamA.1").is_none());
}

#[test]
fn batch_sessions_ignore_edits_and_always_rebuild() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::Batch, at(1.0));

    controller
        .inbox()
        .post(changed(scene.light, "intensity", at(1.0)));
    let actions = controller.pump(&host, &mut renderer).unwrap();
    assert_eq!(actions, vec![SyncAction::Ignored]);

    let outcome = controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert!(matches!(outcome, RenderOutcome::Built(_)));
    assert_eq!(renderer.clear_count, 1);
}

#[test]
fn flythrough_refreshes_cameras_and_lights_under_pinned_keys() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    host.set_keyed(
        scene.camera,
        "fov",
        vec![(1.0, Value::Float(54.0)), (2.0, Value::Float(60.0))],
    );
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::Flythrough, t1);
    let camera = controller
        .session()
        .nodes()
        .find(&NodeKey::at(scene.camera, t1))
        .unwrap();
    let created = renderer.created.len();

    let outcome = controller.render(&host, &mut renderer, at(2.0)).unwrap();
    assert_eq!(outcome, RenderOutcome::Refreshed(2));
    assert_eq!(renderer.param(camera, "fov"), Some(&Value::Float(60.0)));
    assert_eq!(renderer.created.len(), created);
    assert_eq!(
        controller.session().nodes().find(&NodeKey::at(scene.camera, t1)),
        Some(camera)
    );
    assert_eq!(controller.built_time(), Some(at(2.0)));
}

#[test]
fn renderer_is_paused_around_every_mutation() {
    let host = MockHost::new();
    let scene = basic_scene(&host);
    let (cloud, _) = cloud_scene(&host);
    let mut renderer = MockRenderer::standard();
    let t1 = at(1.0);
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, t1);

    host.set(cloud, "primitive_count", 2_i64);
    let inbox = controller.inbox();
    inbox.post(changed(cloud, "primitive_count", t1));
    inbox.post(changed(scene.camera, "fov", t1));
    inbox.post(HostEvent::EntityRemoved { entity: scene.mesh });
    controller.pump(&host, &mut renderer).unwrap();
    controller.render(&host, &mut renderer, at(2.0)).unwrap();
    inbox.post(HostEvent::SceneClosed);
    controller.pump(&host, &mut renderer).unwrap();

    assert!(renderer.pause_balanced());
    assert_eq!(renderer.unpaused_mutations, 0);
    assert_eq!(renderer.max_pause_depth, 1);
}

#[test]
fn interactive_controller_defaults() {
    let controller = SyncController::new(SessionSettings {
        mode: ModeSetting::ManualRebuild,
        ..SessionSettings::default()
    });
    assert_eq!(controller.state(), SyncState::Idle);
    assert_eq!(controller.built_time(), None);
    assert!(controller.session().mode().is_interactive());
}

#[test]
fn missing_types_are_reported_again_after_a_rebuild() {
    let host = MockHost::new();
    basic_scene(&host);
    host.add_typed(EntityKind::Camera, "Pin", "pinhole");
    let mut renderer = MockRenderer::standard();
    let mut controller = built(&host, &mut renderer, ModeSetting::ManualRebuild, at(1.0));
    assert_eq!(host.messages_containing("Cannot translate 'pinhole'"), 1);

    // Re-rendering the same time reuses the session and stays quiet.
    controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert_eq!(host.messages_containing("Cannot translate 'pinhole'"), 1);

    controller.inbox().post(HostEvent::PassChanged);
    controller.render(&host, &mut renderer, at(1.0)).unwrap();
    assert_eq!(host.messages_containing("Cannot translate 'pinhole'"), 2);
}
