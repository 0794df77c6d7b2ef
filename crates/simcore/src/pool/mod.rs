//! Pooling of high-churn transient objects.
//!
//! [`ObjectPool`] holds free instances for one concrete type, [`ProjectilePool`]
//! adds the active set on top of it, and [`ProjectileRegistry`] keeps one
//! projectile pool per registered type together with the timers that drive
//! periodic reclamation.

mod object_pool;
mod projectile_pool;
mod registry;

pub use object_pool::{Factory, ObjectPool};
pub use projectile_pool::ProjectilePool;
pub use registry::{ProjectileId, ProjectileRegistry};

use serde::Serialize;
use thiserror::Error;

use crate::lifecycle::{Destroy, SimContext, SpawnParams};
use crate::render::RenderHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool for {type_name} needs a capacity of at least one")]
    InvalidCapacity { type_name: &'static str },
    #[error("no factory registered for {type_name}")]
    MissingFactory { type_name: &'static str },
    #[error("{count} free {type_name} instance(s) were not reset before destruction")]
    NotReset { type_name: &'static str, count: usize },
    #[error("no active projectile with serial {serial}")]
    UnknownProjectile { serial: u64 },
    #[error("pool registered for {type_name} holds a different type")]
    PoolTypeMismatch { type_name: &'static str },
}

/// Capability of objects that can live in a pool.
///
/// `reset` (from [`Destroy`]) must leave the object inert: no live physics
/// body, nothing in the render index, and `is_reset()` reporting `true`.
pub trait Poolable: Destroy + Send + 'static {
    fn activate(&mut self, params: SpawnParams, ctx: &mut SimContext<'_>);

    fn update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>);

    fn post_update(&mut self, _dt_seconds: f32, _ctx: &mut SimContext<'_>) {}

    /// Polled after every update; `true` sends the object back to the free list.
    fn should_release(&self) -> bool {
        false
    }

    fn render_handle(&self) -> Option<RenderHandle> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub type_name: &'static str,
    pub free: usize,
    pub active: usize,
    pub cap: usize,
    pub created: u64,
    pub destroyed: u64,
}
