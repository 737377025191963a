// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame-time keys with canonical equality and hashing.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A host frame value usable as a map key.
///
/// Construction canonicalizes `-0.0` to `0.0` and rejects NaN/Infinity, so the
/// bitwise `Eq`/`Hash` implementations agree with numeric equality.
#[derive(Clone, Copy)]
pub struct TimeKey(f64);

impl TimeKey {
    /// Frame zero.
    pub const ZERO: TimeKey = TimeKey(0.0);

    /// Builds a key from a frame value. Returns `None` for non-finite input.
    pub fn new(frame: f64) -> Option<Self> {
        if !frame.is_finite() {
            return None;
        }
        if frame == 0.0 {
            return Some(Self::ZERO);
        }
        Some(Self(frame))
    }

    /// Builds a key from a frame value, folding non-finite input to frame zero.
    ///
    /// Intended for literals and host frames already known to be finite.
    pub fn frame(frame: f64) -> Self {
        Self::new(frame).unwrap_or(Self::ZERO)
    }

    /// Returns the frame value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Returns `self + delta`, or `self` if the sum is not finite.
    pub fn offset(self, delta: f64) -> Self {
        Self::new(self.0 + delta).unwrap_or(self)
    }
}

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for TimeKey {}

impl Hash for TimeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Debug for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeKey({})", self.0)
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
