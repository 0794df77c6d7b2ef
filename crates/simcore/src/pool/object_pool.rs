use std::any::type_name;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{PoolError, Poolable};
use crate::lifecycle::{self, SimContext};

pub type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct IdleEntry<T> {
    item: T,
    /// Clean cycles this entry has survived while free.
    idle_cycles: u32,
}

/// Free list plus bookkeeping for one concrete type.
///
/// The pool never holds active instances itself; it only counts how many it
/// has handed out so the cap can be enforced.
pub struct ObjectPool<T> {
    free: Vec<IdleEntry<T>>,
    handed_out: usize,
    cap: usize,
    factory: Factory<T>,
    created: u64,
    destroyed: u64,
}

impl<T: Poolable> ObjectPool<T> {
    pub fn new(cap: usize, factory: Factory<T>) -> Result<Self, PoolError> {
        if cap == 0 {
            return Err(PoolError::InvalidCapacity {
                type_name: type_name::<T>(),
            });
        }
        Ok(Self {
            free: Vec::new(),
            handed_out: 0,
            cap,
            factory,
            created: 0,
            destroyed: 0,
        })
    }

    /// Hands out a free instance, constructing one if the free list is empty.
    /// Returns `None` once `cap` instances are out.
    pub fn take(&mut self) -> Option<T> {
        if self.handed_out >= self.cap {
            return None;
        }
        let item = match self.free.pop() {
            Some(entry) => entry.item,
            None => {
                self.created += 1;
                (self.factory)()
            }
        };
        self.handed_out += 1;
        Some(item)
    }

    /// Returns a previously taken instance to the free list.
    pub fn give_back(&mut self, item: T) {
        self.handed_out = self.handed_out.saturating_sub(1);
        self.free.push(IdleEntry {
            item,
            idle_cycles: 0,
        });
    }

    /// Destroys up to `batch` free entries that were already free at the
    /// previous call, and ages the rest.
    ///
    /// A due entry that reports `!is_reset()` gets one forced reset. If it is
    /// still dirty afterwards it stays on the free list untouched. Either way
    /// the rest of the batch runs, and the cycle ends in
    /// [`PoolError::NotReset`] counting the offenders.
    pub fn reclaim_idle(
        &mut self,
        batch: usize,
        ctx: &mut SimContext<'_>,
    ) -> Result<usize, PoolError> {
        let mut reclaimed = 0;
        let mut not_reset = 0;
        let mut index = 0;
        while index < self.free.len() {
            let entry = &mut self.free[index];
            if entry.idle_cycles > 0 && reclaimed < batch {
                if !entry.item.is_reset() {
                    not_reset += 1;
                    entry.item.reset(ctx);
                    if !entry.item.is_reset() {
                        error!(
                            type_name = type_name::<T>(),
                            slot = index,
                            "pool_entry_stuck_dirty"
                        );
                        index += 1;
                        continue;
                    }
                    warn!(type_name = type_name::<T>(), slot = index, "pool_entry_force_reset");
                }
                let mut entry = self.free.swap_remove(index);
                lifecycle::destroy(&mut entry.item, ctx);
                self.destroyed += 1;
                reclaimed += 1;
                continue;
            }
            entry.idle_cycles = entry.idle_cycles.saturating_add(1);
            index += 1;
        }
        if reclaimed > 0 {
            debug!(
                type_name = type_name::<T>(),
                reclaimed,
                remaining = self.free.len(),
                "pool_reclaimed"
            );
        }
        if not_reset > 0 {
            return Err(PoolError::NotReset {
                type_name: type_name::<T>(),
                count: not_reset,
            });
        }
        Ok(reclaimed)
    }

    /// Destroys every free entry regardless of age.
    pub fn drain_free(&mut self, ctx: &mut SimContext<'_>) -> usize {
        let drained = self.free.len();
        for mut entry in self.free.drain(..) {
            lifecycle::destroy(&mut entry.item, ctx);
        }
        self.destroyed += drained as u64;
        drained
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn handed_out(&self) -> usize {
        self.handed_out
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty() && self.handed_out == 0
    }
}
