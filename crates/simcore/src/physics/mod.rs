//! Contract with the external 2D physics engine.
//!
//! The core never integrates bodies itself. It steps whatever implements
//! [`PhysicsWorld`], hands it a [`ContactListener`] to report into, and relies
//! on it for body creation and destruction.

mod contacts;

pub use contacts::{Contact, ContactDispatcher, ContactImpulse, ContactListener};

use crate::render::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    Static,
    Kinematic,
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub rotation_radians: f32,
    pub linear_velocity: Vec2,
    pub half_extents: Vec2,
    pub is_sensor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec2,
    pub rotation_radians: f32,
    pub linear_velocity: Vec2,
}

pub trait PhysicsWorld: Send {
    /// Advances the simulation, reporting contact events to `contacts`.
    fn step(
        &mut self,
        dt_seconds: f32,
        velocity_iterations: u32,
        position_iterations: u32,
        contacts: &mut dyn ContactListener,
    );

    fn create_body(&mut self, def: BodyDef) -> BodyId;

    /// Returns `false` for unknown or already destroyed bodies.
    fn destroy_body(&mut self, body: BodyId) -> bool;

    fn body_state(&self, body: BodyId) -> Option<BodyState>;

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec2) -> bool;

    fn set_transform(&mut self, body: BodyId, position: Vec2, rotation_radians: f32) -> bool;

    fn body_count(&self) -> usize;

    /// Releases the engine's own resources. Called exactly once, after every
    /// body owned by game objects has been destroyed.
    fn dispose(&mut self);
}
