// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, clippy::expect_used)]

use weft_core::settings::ModeSetting;
use weft_core::{RenderOutcome, SessionSettings, SyncController};
use weft_dry_tests::{MockHost, MockRenderer};
use weft_port::{EntityRef, HostEvent, TimeKey};

/// Shorthand for a frame key.
pub fn at(frame: f64) -> TimeKey {
    TimeKey::frame(frame)
}

/// Settings for a session in `mode`.
pub fn settings(mode: ModeSetting) -> SessionSettings {
    SessionSettings {
        mode,
        ..SessionSettings::default()
    }
}

/// An interactive controller that has completed its first build at `time`.
pub fn built(
    host: &MockHost,
    renderer: &mut MockRenderer,
    mode: ModeSetting,
    time: TimeKey,
) -> SyncController {
    let mut controller = SyncController::new(settings(mode));
    let outcome = controller.render(host, renderer, time).expect("first build");
    assert!(matches!(outcome, RenderOutcome::Built(_)), "{outcome:?}");
    controller
}

/// Value-change notification for `entity.parameter` at `time`.
pub fn changed(entity: EntityRef, parameter: &str, time: TimeKey) -> HostEvent {
    HostEvent::ValueChanged {
        entity,
        parameter: Some(parameter.to_owned()),
        time,
    }
}
