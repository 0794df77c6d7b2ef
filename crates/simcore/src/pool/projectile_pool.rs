use std::any::type_name;
use std::collections::HashMap;
use std::mem;

use super::{Factory, ObjectPool, PoolError, PoolStats, Poolable};
use crate::lifecycle::{SimContext, SpawnParams};

struct ActiveEntry<T> {
    serial: u64,
    item: T,
}

/// Active set for one projectile type, layered over its [`ObjectPool`].
///
/// Active objects are owned here and addressed by a serial. A serial is either
/// in the active set or gone; it never points at a free instance. Serials only
/// grow, and a rebuilt pool continues from where its predecessor stopped via
/// [`ProjectilePool::starting_at`].
pub struct ProjectilePool<T> {
    pool: ObjectPool<T>,
    active: Vec<ActiveEntry<T>>,
    slots: HashMap<u64, usize>,
    next_serial: u64,
    release_scratch: Vec<u64>,
}

impl<T: Poolable> ProjectilePool<T> {
    pub fn new(cap: usize, factory: Factory<T>) -> Result<Self, PoolError> {
        Self::starting_at(cap, factory, 1)
    }

    pub fn starting_at(
        cap: usize,
        factory: Factory<T>,
        first_serial: u64,
    ) -> Result<Self, PoolError> {
        Ok(Self {
            pool: ObjectPool::new(cap, factory)?,
            active: Vec::new(),
            slots: HashMap::new(),
            next_serial: first_serial.max(1),
            release_scratch: Vec::new(),
        })
    }

    /// Serial the next successful `obtain` will hand out.
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Activates an instance at `params` and registers its visual, or returns
    /// `None` when the pool is at capacity.
    pub fn obtain(&mut self, params: SpawnParams, ctx: &mut SimContext<'_>) -> Option<u64> {
        let mut item = self.pool.take()?;
        item.activate(params, ctx);
        if let Some(handle) = item.render_handle() {
            ctx.render_index.add(handle);
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        self.slots.insert(serial, self.active.len());
        self.active.push(ActiveEntry { serial, item });
        Some(serial)
    }

    /// Moves an active object back to the free list. Unknown serials
    /// (including ones already released) are ignored and return `false`.
    pub fn release(&mut self, serial: u64, ctx: &mut SimContext<'_>) -> bool {
        let Some(slot) = self.slots.remove(&serial) else {
            return false;
        };
        let ActiveEntry { mut item, .. } = self.active.swap_remove(slot);
        if let Some(moved) = self.active.get(slot) {
            self.slots.insert(moved.serial, slot);
        }
        if let Some(handle) = item.render_handle() {
            ctx.render_index.remove(handle.id());
        }
        if !item.is_reset() {
            item.reset(ctx);
        }
        self.pool.give_back(item);
        true
    }

    /// Updates every active object, then releases the ones that asked for it.
    pub fn update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) -> usize {
        let mut finished = mem::take(&mut self.release_scratch);
        for entry in &mut self.active {
            entry.item.update(dt_seconds, ctx);
            if entry.item.should_release() {
                finished.push(entry.serial);
            }
        }
        let released = finished.len();
        for serial in finished.drain(..) {
            self.release(serial, ctx);
        }
        self.release_scratch = finished;
        released
    }

    pub fn post_update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) {
        for entry in &mut self.active {
            entry.item.post_update(dt_seconds, ctx);
        }
    }

    pub fn kill_all(&mut self, ctx: &mut SimContext<'_>) -> usize {
        let mut serials = mem::take(&mut self.release_scratch);
        serials.extend(self.active.iter().map(|entry| entry.serial));
        let killed = serials.len();
        for serial in serials.drain(..) {
            self.release(serial, ctx);
        }
        self.release_scratch = serials;
        killed
    }

    pub fn reclaim_idle(
        &mut self,
        batch: usize,
        ctx: &mut SimContext<'_>,
    ) -> Result<usize, PoolError> {
        self.pool.reclaim_idle(batch, ctx)
    }

    /// Releases every active object and destroys the whole free list.
    pub fn dispose(&mut self, ctx: &mut SimContext<'_>) -> usize {
        self.kill_all(ctx);
        self.pool.drain_free(ctx)
    }

    pub fn get(&self, serial: u64) -> Option<&T> {
        let slot = *self.slots.get(&serial)?;
        self.active.get(slot).map(|entry| &entry.item)
    }

    pub fn get_mut(&mut self, serial: u64) -> Option<&mut T> {
        let slot = *self.slots.get(&serial)?;
        self.active.get_mut(slot).map(|entry| &mut entry.item)
    }

    pub fn try_get(&self, serial: u64) -> Result<&T, PoolError> {
        self.get(serial)
            .ok_or(PoolError::UnknownProjectile { serial })
    }

    pub fn is_active(&self, serial: u64) -> bool {
        self.slots.contains_key(&serial)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.pool.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            type_name: type_name::<T>(),
            free: self.pool.free_count(),
            active: self.active.len(),
            cap: self.pool.cap(),
            created: self.pool.created(),
            destroyed: self.pool.destroyed(),
        }
    }
}
