//! The simulation world: owns the physics collaborator, world objects,
//! projectile pools and the render index, and tears them down in a fixed
//! order.

mod objects;


pub use objects::{GameObject, ObjectId, ObjectIdAllocator, ObjectManager, StepContext};

use tracing::{debug, error, info};

use crate::config::CoreConfig;
use crate::lifecycle::{SimContext, SpawnParams};
use crate::physics::{ContactDispatcher, ContactListener, PhysicsWorld};
use crate::pool::{PoolError, PoolStats, Poolable, ProjectileId, ProjectileRegistry};
use crate::render::{Camera2D, RenderBatch, RenderIndex, Viewport};
use crate::schedule::Simulation;

pub struct World {
    physics: Box<dyn PhysicsWorld>,
    contacts: ContactDispatcher,
    objects: ObjectManager,
    projectiles: ProjectileRegistry,
    render_index: RenderIndex,
    velocity_iterations: u32,
    position_iterations: u32,
    steps: u64,
    alpha: f32,
    disposed: bool,
}

impl World {
    pub fn new(physics: Box<dyn PhysicsWorld>, config: &CoreConfig) -> Self {
        Self {
            physics,
            contacts: ContactDispatcher::new(),
            objects: ObjectManager::new(),
            projectiles: ProjectileRegistry::new(&config.pools),
            render_index: RenderIndex::new(),
            velocity_iterations: config.loop_config.velocity_iterations.max(1),
            position_iterations: config.loop_config.position_iterations.max(1),
            steps: 0,
            alpha: 0.0,
            disposed: false,
        }
    }

    pub fn add_object(&mut self, object: Box<dyn GameObject>) -> ObjectId {
        self.objects.add(object)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        self.objects.remove(id)
    }

    pub fn register_object_cleanup<T, F>(&mut self, cleanup: F)
    where
        T: GameObject,
        F: FnOnce() + Send + 'static,
    {
        self.objects.register_type_cleanup::<T, F>(cleanup);
    }

    pub fn register_projectile_factory<T, F>(&mut self, cap: usize, factory: F)
    where
        T: Poolable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.projectiles.register_factory(cap, factory);
    }

    pub fn register_projectile_cleanup<T, F>(&mut self, cleanup: F)
    where
        T: Poolable,
        F: FnOnce() + Send + 'static,
    {
        self.projectiles.register_type_cleanup::<T, F>(cleanup);
    }

    /// Registers a contact sub-listener; an existing one under `key` is replaced and returned.
    pub fn register_contact_listener(
        &mut self,
        key: impl Into<String>,
        listener: Box<dyn ContactListener>,
    ) -> Option<Box<dyn ContactListener>> {
        self.contacts.register(key, listener)
    }

    pub fn unregister_contact_listener(&mut self, key: &str) -> Option<Box<dyn ContactListener>> {
        self.contacts.unregister(key)
    }

    pub fn spawn_projectile<T: Poolable>(
        &mut self,
        params: SpawnParams,
    ) -> Result<Option<ProjectileId>, PoolError> {
        let mut sim = SimContext::new(self.physics.as_mut(), &mut self.render_index);
        self.projectiles.obtain::<T>(params, &mut sim)
    }

    pub fn release_projectile(&mut self, id: ProjectileId) -> bool {
        let mut sim = SimContext::new(self.physics.as_mut(), &mut self.render_index);
        self.projectiles.release(id, &mut sim)
    }

    pub fn projectile<T: Poolable>(&self, id: ProjectileId) -> Option<&T> {
        self.projectiles.get(id)
    }

    /// One fixed step: objects (flushing pending additions first), projectiles,
    /// physics, then the post-physics pass.
    pub fn fixed_step(&mut self, dt_seconds: f32) {
        if self.disposed {
            return;
        }

        self.objects.step(
            dt_seconds,
            SimContext::new(self.physics.as_mut(), &mut self.render_index),
            &mut self.projectiles,
        );
        {
            let mut sim = SimContext::new(self.physics.as_mut(), &mut self.render_index);
            if let Err(error) = self.projectiles.update(dt_seconds, &mut sim) {
                error!(error = %error, "projectile_maintenance_failed");
            }
        }

        self.physics.step(
            dt_seconds,
            self.velocity_iterations,
            self.position_iterations,
            &mut self.contacts,
        );

        let mut sim = SimContext::new(self.physics.as_mut(), &mut self.render_index);
        self.objects.post_step(dt_seconds, &mut sim);
        self.projectiles.post_update(dt_seconds, &mut sim);
        self.steps = self.steps.saturating_add(1);
    }

    /// Updates visuals and draws every renderable near the camera, back to front.
    pub fn render(
        &self,
        camera: &Camera2D,
        viewport: Viewport,
        batch: &mut dyn RenderBatch,
        dt_seconds: f32,
    ) -> usize {
        self.render_index
            .for_each_culled(camera.position, camera.view_size(viewport), |target| {
                target.update_visuals(dt_seconds);
                target.render(batch);
            })
    }

    /// Staged teardown. Bodies owned by objects are destroyed while the
    /// physics world still exists; the physics world goes last.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.contacts.clear();
        debug!(stage = "general", "world_dispose_stage");

        let mut sim = SimContext::new(self.physics.as_mut(), &mut self.render_index);
        let objects = self.objects.dispose_instances(&mut sim);
        let projectiles = self.projectiles.dispose_instances(&mut sim);
        debug!(stage = "instances", objects, projectiles, "world_dispose_stage");

        let cleanups = self.objects.run_type_cleanups() + self.projectiles.run_type_cleanups();
        debug!(stage = "type_cleanups", cleanups, "world_dispose_stage");

        self.objects.clear_lists();
        self.render_index.clear();
        debug!(stage = "lists", "world_dispose_stage");

        self.physics.dispose();
        info!(objects, projectiles, cleanups, steps = self.steps, "world_disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    pub fn projectiles(&self) -> &ProjectileRegistry {
        &self.projectiles
    }

    pub fn projectile_stats(&self) -> Vec<PoolStats> {
        self.projectiles.stats()
    }

    pub fn render_index(&self) -> &RenderIndex {
        &self.render_index
    }

    pub fn physics(&self) -> &dyn PhysicsWorld {
        self.physics.as_ref()
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Interpolation alpha handed over by the driver after the last frame.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Simulation for World {
    fn step(&mut self, fixed_dt_seconds: f32) {
        self.fixed_step(fixed_dt_seconds);
    }

    fn after_frame(&mut self, alpha: f32) {
        self.alpha = alpha;
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.dispose();
    }
}
