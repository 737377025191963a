// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transform motion-key schedule.

use serde::{Deserialize, Serialize};
use weft_port::TimeKey;

/// Where the shutter interval sits relative to the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterPosition {
    /// `[frame, frame + length]`.
    Start,
    /// `[frame - length / 2, frame + length / 2]`.
    #[default]
    Center,
    /// `[frame - length, frame]`.
    End,
    /// `[frame + shutter[0], frame + shutter[1]]`.
    Custom,
}

/// Motion-blur key settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Write one matrix per key instead of a single one.
    pub enabled: bool,
    /// Number of transform keys when enabled (at least 2).
    pub transform_keys: u32,
    /// Shutter offsets in frames; their difference is the shutter length.
    pub shutter: [f64; 2],
    /// Placement of the shutter interval.
    pub position: ShutterPosition,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            transform_keys: 2,
            shutter: [-0.25, 0.25],
            position: ShutterPosition::Center,
        }
    }
}

impl MotionSettings {
    /// Shutter interval as offsets relative to the frame.
    pub fn range(&self) -> (f64, f64) {
        if !self.enabled {
            return (0.0, 0.0);
        }
        let length = (self.shutter[1] - self.shutter[0]).abs();
        match self.position {
            ShutterPosition::Start => (0.0, length),
            ShutterPosition::Center => (-length * 0.5, length * 0.5),
            ShutterPosition::End => (-length, 0.0),
            ShutterPosition::Custom => (
                self.shutter[0].min(self.shutter[1]),
                self.shutter[0].max(self.shutter[1]),
            ),
        }
    }

    /// Key times for `frame`, evenly spaced over the shutter, inclusive.
    pub fn key_times(&self, frame: TimeKey) -> Vec<TimeKey> {
        if !self.enabled || self.transform_keys < 2 {
            return vec![frame];
        }
        let (start, end) = self.range();
        let steps = f64::from(self.transform_keys - 1);
        (0..self.transform_keys)
            .map(|i| frame.offset(start + (end - start) * f64::from(i) / steps))
            .collect()
    }
}
