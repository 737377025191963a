// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scoped "render is paused" condition.

use core::ops::{Deref, DerefMut};

use weft_port::RenderGraph;

/// Holds the renderer paused for as long as the guard lives.
///
/// Every graph mutation goes through the guard, and `resume` runs on drop, so
/// early returns (`?`, aborts) cannot leave the renderer paused.
pub struct RenderPause<'a> {
    renderer: &'a mut dyn RenderGraph,
}

impl<'a> RenderPause<'a> {
    /// Pauses `renderer` and returns the guard.
    pub fn acquire(renderer: &'a mut dyn RenderGraph) -> Self {
        renderer.pause();
        Self { renderer }
    }
}

impl<'a> Deref for RenderPause<'a> {
    type Target = dyn RenderGraph + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.renderer
    }
}

impl DerefMut for RenderPause<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.renderer
    }
}

impl Drop for RenderPause<'_> {
    fn drop(&mut self) {
        self.renderer.resume();
    }
}
