use std::any::type_name;

use tracing::debug;

use crate::lifecycle::{self, Destroy, SimContext, SpawnParams, TypeCleanupRegistry};
use crate::physics::PhysicsWorld;
use crate::pool::{PoolError, Poolable, ProjectileId, ProjectileRegistry};
use crate::render::{RenderHandle, RenderIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Long-lived world object driven by the [`ObjectManager`].
pub trait GameObject: Destroy + Send + 'static {
    /// Runs when the object leaves the pending list, at the start of a step.
    fn on_added(&mut self, _id: ObjectId, _ctx: &mut StepContext<'_>) {}

    fn update(&mut self, dt_seconds: f32, ctx: &mut StepContext<'_>);

    /// Runs after the physics step; the place to copy body state into transforms.
    fn post_update(&mut self, _dt_seconds: f32, _ctx: &mut SimContext<'_>) {}

    fn is_pending_removal(&self) -> bool;

    fn request_removal(&mut self);

    fn render_handle(&self) -> Option<RenderHandle> {
        None
    }

    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

struct ObjectEntry {
    id: ObjectId,
    object: Box<dyn GameObject>,
}

/// Everything an object may reach during its update.
pub struct StepContext<'a> {
    pub physics: &'a mut dyn PhysicsWorld,
    pub render_index: &'a mut RenderIndex,
    pub projectiles: &'a mut ProjectileRegistry,
    pending: &'a mut Vec<ObjectEntry>,
    ids: &'a mut ObjectIdAllocator,
}

impl<'a> StepContext<'a> {
    /// Queues a new object; it joins the active list at the next step.
    pub fn spawn(&mut self, object: Box<dyn GameObject>) -> ObjectId {
        let id = self.ids.allocate();
        self.pending.push(ObjectEntry { id, object });
        id
    }

    pub fn spawn_projectile<T: Poolable>(
        &mut self,
        params: SpawnParams,
    ) -> Result<Option<ProjectileId>, PoolError> {
        let mut sim = SimContext::new(&mut *self.physics, &mut *self.render_index);
        self.projectiles.obtain::<T>(params, &mut sim)
    }

    pub fn release_projectile(&mut self, id: ProjectileId) -> bool {
        let mut sim = SimContext::new(&mut *self.physics, &mut *self.render_index);
        self.projectiles.release(id, &mut sim)
    }
}

/// Per-frame manager for world objects.
///
/// Additions are deferred to the start of the next step and removals happen
/// during the update pass, which walks the active list from the back so an
/// object can be spliced out without disturbing the ones not yet visited.
#[derive(Default)]
pub struct ObjectManager {
    active: Vec<ObjectEntry>,
    pending: Vec<ObjectEntry>,
    ids: ObjectIdAllocator,
    type_cleanups: TypeCleanupRegistry,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: Box<dyn GameObject>) -> ObjectId {
        let id = self.ids.allocate();
        self.pending.push(ObjectEntry { id, object });
        id
    }

    /// Marks an object for removal at the next update pass.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.object.request_removal();
                true
            }
            None => false,
        }
    }

    pub fn register_type_cleanup<T, F>(&mut self, cleanup: F)
    where
        T: GameObject,
        F: FnOnce() + Send + 'static,
    {
        self.type_cleanups.register::<T, _>(cleanup);
    }

    /// Flushes pending additions, then updates every active object or tears
    /// it down if it asked to be removed. Returns how many were removed.
    pub fn step(
        &mut self,
        dt_seconds: f32,
        sim: SimContext<'_>,
        projectiles: &mut ProjectileRegistry,
    ) -> usize {
        let SimContext {
            physics,
            render_index,
        } = sim;
        self.flush_pending(physics, render_index, projectiles);

        let mut removed = 0;
        let mut index = self.active.len();
        while index > 0 {
            index -= 1;
            if self.active[index].object.is_pending_removal() {
                let mut entry = self.active.remove(index);
                if let Some(handle) = entry.object.render_handle() {
                    render_index.remove(handle.id());
                }
                let mut ctx = SimContext::new(&mut *physics, &mut *render_index);
                lifecycle::destroy(entry.object.as_mut(), &mut ctx);
                debug!(object_id = entry.id.0, type_name = entry.object.type_name(), "object_removed");
                removed += 1;
                continue;
            }
            let mut ctx = StepContext {
                physics: &mut *physics,
                render_index: &mut *render_index,
                projectiles: &mut *projectiles,
                pending: &mut self.pending,
                ids: &mut self.ids,
            };
            self.active[index].object.update(dt_seconds, &mut ctx);
        }
        removed
    }

    /// Post-physics pass; objects marked for removal this frame are skipped.
    pub fn post_step(&mut self, dt_seconds: f32, sim: &mut SimContext<'_>) {
        for entry in &mut self.active {
            if entry.object.is_pending_removal() {
                continue;
            }
            entry.object.post_update(dt_seconds, sim);
        }
    }

    /// Tears down every active and pending object. Lists keep their (now
    /// disposed) entries until [`ObjectManager::clear_lists`].
    pub fn dispose_instances(&mut self, sim: &mut SimContext<'_>) -> usize {
        let mut disposed = 0;
        for entry in self.active.iter_mut().chain(self.pending.iter_mut()) {
            if let Some(handle) = entry.object.render_handle() {
                sim.render_index.remove(handle.id());
            }
            if lifecycle::destroy(entry.object.as_mut(), sim) {
                disposed += 1;
            }
        }
        disposed
    }

    pub fn run_type_cleanups(&mut self) -> usize {
        self.type_cleanups.run_all()
    }

    pub fn clear_lists(&mut self) {
        self.active.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.active.iter().any(|entry| entry.id == id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&dyn GameObject> {
        self.active
            .iter()
            .chain(self.pending.iter())
            .find(|entry| entry.id == id)
            .map(|entry| entry.object.as_ref())
    }

    fn entry_mut(&mut self, id: ObjectId) -> Option<&mut ObjectEntry> {
        self.active
            .iter_mut()
            .chain(self.pending.iter_mut())
            .find(|entry| entry.id == id)
    }

    fn flush_pending(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        render_index: &mut RenderIndex,
        projectiles: &mut ProjectileRegistry,
    ) {
        // Objects spawned from `on_added` land in `pending` again and wait
        // for the next step.
        let mut batch = std::mem::take(&mut self.pending);
        for mut entry in batch.drain(..) {
            let mut ctx = StepContext {
                physics: &mut *physics,
                render_index: &mut *render_index,
                projectiles: &mut *projectiles,
                pending: &mut self.pending,
                ids: &mut self.ids,
            };
            entry.object.on_added(entry.id, &mut ctx);
            if let Some(handle) = entry.object.render_handle() {
                render_index.add(handle);
            }
            self.active.push(entry);
        }
    }
}
