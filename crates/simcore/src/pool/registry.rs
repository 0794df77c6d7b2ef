use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use tracing::{debug, error};

use super::{PoolError, PoolStats, Poolable, ProjectilePool};
use crate::config::PoolSettings;
use crate::lifecycle::{SimContext, SpawnParams, TypeCleanupRegistry};
use crate::time::Timer;

/// Address of an active pooled object, valid until it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectileId {
    pool: TypeId,
    serial: u64,
}

impl ProjectileId {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.pool == TypeId::of::<T>()
    }
}

trait ErasedPool: Send {
    fn release(&mut self, serial: u64, ctx: &mut SimContext<'_>) -> bool;
    fn update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) -> usize;
    fn post_update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>);
    fn kill_all(&mut self, ctx: &mut SimContext<'_>) -> usize;
    fn reclaim_idle(&mut self, batch: usize, ctx: &mut SimContext<'_>)
        -> Result<usize, PoolError>;
    fn dispose(&mut self, ctx: &mut SimContext<'_>) -> usize;
    fn active_count(&self) -> usize;
    fn next_serial(&self) -> u64;
    fn is_empty(&self) -> bool;
    fn stats(&self) -> PoolStats;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Poolable> ErasedPool for ProjectilePool<T> {
    fn release(&mut self, serial: u64, ctx: &mut SimContext<'_>) -> bool {
        ProjectilePool::release(self, serial, ctx)
    }

    fn update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) -> usize {
        ProjectilePool::update(self, dt_seconds, ctx)
    }

    fn post_update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) {
        ProjectilePool::post_update(self, dt_seconds, ctx)
    }

    fn kill_all(&mut self, ctx: &mut SimContext<'_>) -> usize {
        ProjectilePool::kill_all(self, ctx)
    }

    fn reclaim_idle(
        &mut self,
        batch: usize,
        ctx: &mut SimContext<'_>,
    ) -> Result<usize, PoolError> {
        ProjectilePool::reclaim_idle(self, batch, ctx)
    }

    fn dispose(&mut self, ctx: &mut SimContext<'_>) -> usize {
        ProjectilePool::dispose(self, ctx)
    }

    fn active_count(&self) -> usize {
        ProjectilePool::active_count(self)
    }

    fn next_serial(&self) -> u64 {
        ProjectilePool::next_serial(self)
    }

    fn is_empty(&self) -> bool {
        ProjectilePool::is_empty(self)
    }

    fn stats(&self) -> PoolStats {
        ProjectilePool::stats(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type PoolBuilder = Box<dyn Fn(u64) -> Result<Box<dyn ErasedPool>, PoolError> + Send>;

struct FactoryEntry {
    type_name: &'static str,
    cap: usize,
    build: PoolBuilder,
    /// First serial for the next pool built for this type. Raised whenever a
    /// pool is dropped so ids from the old pool never match new objects.
    next_serial: u64,
}

/// Per-type projectile pools, created lazily from registered factories.
///
/// Two timers drive maintenance: the clean timer destroys a bounded batch of
/// long-idle free objects per pool, the delete timer drops pools that are
/// empty on both sides. A dropped pool is rebuilt from its factory on the next
/// request.
pub struct ProjectileRegistry {
    pools: BTreeMap<TypeId, Box<dyn ErasedPool>>,
    factories: BTreeMap<TypeId, FactoryEntry>,
    clean_timer: Timer,
    delete_timer: Timer,
    clean_batch: usize,
    type_cleanups: TypeCleanupRegistry,
}

impl Default for ProjectileRegistry {
    fn default() -> Self {
        Self::new(&PoolSettings::default())
    }
}

impl ProjectileRegistry {
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            pools: BTreeMap::new(),
            factories: BTreeMap::new(),
            clean_timer: Timer::started(settings.clean_interval_seconds),
            delete_timer: Timer::started(settings.delete_interval_seconds),
            clean_batch: settings.clean_batch_size,
            type_cleanups: TypeCleanupRegistry::new(),
        }
    }

    /// Registers the factory for `T`. A `cap` of zero makes `T` permanently
    /// unavailable. Replacing a factory does not touch an existing pool.
    pub fn register_factory<T, F>(&mut self, cap: usize, factory: F)
    where
        T: Poolable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(factory);
        let build: PoolBuilder = Box::new(move |first_serial| {
            let pool = ProjectilePool::starting_at(cap, factory.clone(), first_serial)?;
            Ok(Box::new(pool) as Box<dyn ErasedPool>)
        });
        let key = TypeId::of::<T>();
        let next_serial = self.factories.get(&key).map_or(1, |entry| entry.next_serial);
        self.factories.insert(
            key,
            FactoryEntry {
                type_name: type_name::<T>(),
                cap,
                build,
                next_serial,
            },
        );
        debug!(type_name = type_name::<T>(), cap, "projectile_factory_registered");
    }

    /// Registers a one-shot hook for resources shared by every `T`; it runs
    /// at disposal even if no `T` was ever obtained.
    pub fn register_type_cleanup<T, F>(&mut self, cleanup: F)
    where
        T: Poolable,
        F: FnOnce() + Send + 'static,
    {
        self.type_cleanups.register::<T, _>(cleanup);
    }

    pub fn has_factory<T: Poolable>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    /// Activates a `T` from its pool.
    ///
    /// `Ok(None)` means the pool is at capacity (or `T` was registered with a
    /// zero cap); callers drop the spawn. A missing factory is an error.
    pub fn obtain<T: Poolable>(
        &mut self,
        params: SpawnParams,
        ctx: &mut SimContext<'_>,
    ) -> Result<Option<ProjectileId>, PoolError> {
        let key = TypeId::of::<T>();
        let Some(pool) = self.pool_mut::<T>()? else {
            return Ok(None);
        };
        match pool.obtain(params, ctx) {
            Some(serial) => Ok(Some(ProjectileId { pool: key, serial })),
            None => {
                let stats = pool.stats();
                debug!(
                    type_name = stats.type_name,
                    cap = stats.cap,
                    "projectile_pool_exhausted"
                );
                Ok(None)
            }
        }
    }

    /// Sends an active object back to its free list; `false` if it was not active.
    pub fn release(&mut self, id: ProjectileId, ctx: &mut SimContext<'_>) -> bool {
        self.pools
            .get_mut(&id.pool)
            .is_some_and(|pool| pool.release(id.serial, ctx))
    }

    pub fn get<T: Poolable>(&self, id: ProjectileId) -> Option<&T> {
        if !id.is::<T>() {
            return None;
        }
        self.pools
            .get(&id.pool)?
            .as_any()
            .downcast_ref::<ProjectilePool<T>>()?
            .get(id.serial)
    }

    pub fn get_mut<T: Poolable>(&mut self, id: ProjectileId) -> Option<&mut T> {
        if !id.is::<T>() {
            return None;
        }
        self.pools
            .get_mut(&id.pool)?
            .as_any_mut()
            .downcast_mut::<ProjectilePool<T>>()?
            .get_mut(id.serial)
    }

    /// Updates every pool, then runs whichever maintenance timers expired.
    /// Returns the number of objects released because they finished.
    pub fn update(
        &mut self,
        dt_seconds: f32,
        ctx: &mut SimContext<'_>,
    ) -> Result<usize, PoolError> {
        let mut released = 0;
        for pool in self.pools.values_mut() {
            released += pool.update(dt_seconds, ctx);
        }

        self.clean_timer.advance(dt_seconds);
        self.delete_timer.advance(dt_seconds);
        let mut cleaned = Ok(0);
        if self.clean_timer.is_finished() {
            self.clean_timer.reset();
            cleaned = self.clean(ctx);
        }
        if self.delete_timer.is_finished() {
            self.delete_timer.reset();
            self.delete_empty_pools();
        }
        cleaned.map(|_| released)
    }

    pub fn post_update(&mut self, dt_seconds: f32, ctx: &mut SimContext<'_>) {
        for pool in self.pools.values_mut() {
            pool.post_update(dt_seconds, ctx);
        }
    }

    /// One reclamation cycle across all pools.
    ///
    /// Every pool is visited even if an earlier one reports dirty entries;
    /// the first such failure is returned once the cycle is complete.
    pub fn clean(&mut self, ctx: &mut SimContext<'_>) -> Result<usize, PoolError> {
        let mut reclaimed = 0;
        let mut first_failure = None;
        for pool in self.pools.values_mut() {
            match pool.reclaim_idle(self.clean_batch, ctx) {
                Ok(count) => reclaimed += count,
                Err(err) => {
                    error!(error = %err, "projectile_pool_clean_failed");
                    first_failure.get_or_insert(err);
                }
            }
        }
        debug!(reclaimed, pools = self.pools.len(), "projectile_pools_cleaned");
        match first_failure {
            Some(err) => Err(err),
            None => Ok(reclaimed),
        }
    }

    /// Drops every pool with no free and no active objects.
    pub fn delete_empty_pools(&mut self) -> usize {
        let before = self.pools.len();
        let factories = &mut self.factories;
        self.pools.retain(|key, pool| {
            if !pool.is_empty() {
                return true;
            }
            if let Some(entry) = factories.get_mut(key) {
                entry.next_serial = entry.next_serial.max(pool.next_serial());
            }
            false
        });
        let deleted = before - self.pools.len();
        if deleted > 0 {
            debug!(deleted, remaining = self.pools.len(), "projectile_pools_deleted");
        }
        deleted
    }

    pub fn kill_all(&mut self, ctx: &mut SimContext<'_>) -> usize {
        self.pools
            .values_mut()
            .map(|pool| pool.kill_all(ctx))
            .sum()
    }

    /// Releases and destroys every pooled object, then drops the pools.
    pub fn dispose_instances(&mut self, ctx: &mut SimContext<'_>) -> usize {
        let mut destroyed = 0;
        for (key, mut pool) in mem::take(&mut self.pools) {
            destroyed += pool.dispose(ctx);
            if let Some(entry) = self.factories.get_mut(&key) {
                entry.next_serial = entry.next_serial.max(pool.next_serial());
            }
        }
        destroyed
    }

    pub fn run_type_cleanups(&mut self) -> usize {
        self.type_cleanups.run_all()
    }

    /// Full teardown: instances first, then per-type cleanup hooks.
    pub fn dispose(&mut self, ctx: &mut SimContext<'_>) {
        let destroyed = self.dispose_instances(ctx);
        let cleanups = self.run_type_cleanups();
        debug!(destroyed, cleanups, "projectile_registry_disposed");
    }

    pub fn active_count(&self) -> usize {
        self.pools.values().map(|pool| pool.active_count()).sum()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn has_pool<T: Poolable>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<T>())
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools.values().map(|pool| pool.stats()).collect()
    }

    fn pool_mut<T: Poolable>(&mut self) -> Result<Option<&mut ProjectilePool<T>>, PoolError> {
        let key = TypeId::of::<T>();
        if !self.pools.contains_key(&key) {
            let Some(entry) = self.factories.get(&key) else {
                error!(type_name = type_name::<T>(), "projectile_factory_missing");
                return Err(PoolError::MissingFactory {
                    type_name: type_name::<T>(),
                });
            };
            if entry.cap == 0 {
                return Ok(None);
            }
            let pool = (entry.build)(entry.next_serial)?;
            debug!(type_name = entry.type_name, cap = entry.cap, "projectile_pool_created");
            self.pools.insert(key, pool);
        }
        let Some(pool) = self.pools.get_mut(&key) else {
            return Ok(None);
        };
        pool.as_any_mut()
            .downcast_mut::<ProjectilePool<T>>()
            .map(Some)
            .ok_or(PoolError::PoolTypeMismatch {
                type_name: type_name::<T>(),
            })
    }
}
