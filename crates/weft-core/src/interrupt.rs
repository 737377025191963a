// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cooperative cancellation of long passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag.
///
/// Clones share the flag, so a UI thread can raise it while the event thread
/// polls it between translation units.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Lowers the flag before a new pass.
    pub fn reset(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
