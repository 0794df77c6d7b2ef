//! Shared teardown protocol for world objects and pooled objects.
//!
//! Destruction runs in fixed stages: object-specific pre-destroy hook, reset
//! (skipped when the object already reports reset), then dispose. Each stage
//! runs at most once per object, so repeated destroy calls are harmless.

mod type_hooks;

pub use type_hooks::TypeCleanupRegistry;

use crate::physics::PhysicsWorld;
use crate::render::{RenderIndex, Vec2};

/// Simulation-side resources an object may touch while updating or tearing down.
pub struct SimContext<'a> {
    pub physics: &'a mut dyn PhysicsWorld,
    pub render_index: &'a mut RenderIndex,
}

impl<'a> SimContext<'a> {
    pub fn new(physics: &'a mut dyn PhysicsWorld, render_index: &'a mut RenderIndex) -> Self {
        Self {
            physics,
            render_index,
        }
    }

    /// Shorter-lived copy, for handing the context down a call.
    pub fn reborrow(&mut self) -> SimContext<'_> {
        SimContext {
            physics: &mut *self.physics,
            render_index: &mut *self.render_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpawnParams {
    pub position: Vec2,
    pub rotation_radians: f32,
}

impl SpawnParams {
    pub fn at(position: Vec2, rotation_radians: f32) -> Self {
        Self {
            position,
            rotation_radians,
        }
    }
}

/// Stage bookkeeping owned by each destroyable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownState {
    pre_destroyed: bool,
    disposed: bool,
}

impl TeardownState {
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

pub trait Destroy {
    fn teardown_state(&mut self) -> &mut TeardownState;

    fn is_reset(&self) -> bool;

    /// Returns the object to its inert state (bodies removed, flags cleared).
    fn reset(&mut self, ctx: &mut SimContext<'_>);

    fn pre_destroy(&mut self, _ctx: &mut SimContext<'_>) {}

    /// Final release of components, graphics and anything else the object holds.
    fn dispose(&mut self, ctx: &mut SimContext<'_>);
}

/// Runs the staged teardown. Returns `false` when the object was already disposed.
pub fn destroy<D>(target: &mut D, ctx: &mut SimContext<'_>) -> bool
where
    D: Destroy + ?Sized,
{
    if target.teardown_state().disposed {
        return false;
    }
    if !target.teardown_state().pre_destroyed {
        target.teardown_state().pre_destroyed = true;
        target.pre_destroy(ctx);
    }
    if !target.is_reset() {
        target.reset(ctx);
    }
    target.teardown_state().disposed = true;
    target.dispose(ctx);
    true
}
