//! Runtime core of a 2D fixed-timestep simulation.
//!
//! - [`schedule`]: frame drivers that turn wall-clock deltas into fixed steps,
//!   on the caller's thread or on a dedicated worker.
//! - [`pool`]: per-type pools for short-lived objects such as projectiles.
//! - [`render`]: draw-ordered, culled index of renderables.
//! - [`world`]: the object manager and the [`World`] that ties physics,
//!   objects, pools and the render index together.

pub mod config;
pub mod lifecycle;
pub mod physics;
pub mod pool;
pub mod render;
pub mod schedule;
pub mod time;
pub mod world;

pub use config::{ConfigError, CoreConfig, ExecutionStrategy, LoopConfig, PoolSettings};
pub use lifecycle::{destroy, Destroy, SimContext, SpawnParams, TeardownState, TypeCleanupRegistry};
pub use physics::{
    BodyDef, BodyId, BodyKind, BodyState, Contact, ContactDispatcher, ContactImpulse,
    ContactListener, PhysicsWorld,
};
pub use pool::{
    Factory, ObjectPool, PoolError, PoolStats, Poolable, ProjectileId, ProjectilePool,
    ProjectileRegistry,
};
pub use render::{
    cull_visible, Camera2D, DrawCommand, Rect, RenderBatch, RenderHandle, RenderId, RenderIndex,
    Renderable, RenderableObject, Vec2, Viewport, CULL_MARGIN_FACTOR,
};
pub use schedule::{
    AnyDriver, CooperativeDriver, FrameDriver, LoopMetricsSnapshot, MetricsHandle,
    SchedulerError, ShutdownHandle, Simulation, WorkerDriver, WORKER_THREAD_NAME,
};
pub use time::{FixedStepper, Timer, DEFAULT_MAX_FRAME_DELTA};
pub use world::{GameObject, ObjectId, ObjectIdAllocator, ObjectManager, StepContext, World};
