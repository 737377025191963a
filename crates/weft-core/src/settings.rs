// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted session settings.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::motion::MotionSettings;

bitflags! {
    /// Output categories a build pass may touch.
    ///
    /// Clearing a bit skips the matching stage without a separate code path
    /// (e.g. "export only materials", "render without re-touching drivers").
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OutputMask: u32 {
        /// The options node built from the active pass.
        const OPTIONS = 1 << 0;
        /// Scene operators.
        const OPERATORS = 1 << 1;
        /// Cameras.
        const CAMERAS = 1 << 2;
        /// Imagers attached to the output driver.
        const IMAGERS = 1 << 3;
        /// Background / atmosphere / AOV shader stacks of the pass.
        const PASS_SHADERS = 1 << 4;
        /// Lights.
        const LIGHTS = 1 << 5;
        /// Polygon meshes.
        const POLYMESHES = 1 << 6;
        /// Curves and hair.
        const CURVES = 1 << 7;
        /// Procedural point clouds.
        const POINT_CLOUDS = 1 << 8;
        /// Instances.
        const INSTANCES = 1 << 9;
        /// Materials bound to geometry.
        const MATERIALS = 1 << 10;
        /// Every geometry stage.
        const GEOMETRY = Self::POLYMESHES.bits()
            | Self::CURVES.bits()
            | Self::POINT_CLOUDS.bits()
            | Self::INSTANCES.bits();
    }
}

impl Default for OutputMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Session mode as stored in settings. The runtime form, which carries the
/// pinned flythrough time, is [`SessionMode`](crate::SessionMode).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    /// One-shot export; edits are not tracked.
    #[default]
    Batch,
    /// Interactive session; edits patch in place, time changes rebuild.
    ManualRebuild,
    /// Interactive session with node identities pinned to the start time.
    Flythrough,
}

/// Everything a translation session is configured with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session mode.
    pub mode: ModeSetting,
    /// Output category mask.
    pub output: OutputMask,
    /// Transform motion-key schedule.
    pub motion: MotionSettings,
    /// Samples taken when baking a time curve into a value array.
    pub curve_samples: u32,
    /// Abort a batch export when the options node fails to build.
    pub abort_on_options_failure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Batch,
            output: OutputMask::all(),
            motion: MotionSettings::default(),
            curve_samples: 32,
            abort_on_options_failure: true,
        }
    }
}
