use std::any::{type_name, TypeId};
use std::collections::HashMap;

use tracing::debug;

struct TypeHook {
    type_name: &'static str,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

/// One-shot cleanup closures for per-type shared resources.
///
/// Types register explicitly when their factory or first instance is set up;
/// the hooks run once, in registration order, when the owner is disposed,
/// whether or not any instance of the type is still alive.
#[derive(Default)]
pub struct TypeCleanupRegistry {
    hooks: Vec<TypeHook>,
    slots: HashMap<TypeId, usize>,
}

impl TypeCleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the cleanup hook for `T`.
    pub fn register<T, F>(&mut self, cleanup: F)
    where
        T: ?Sized + 'static,
        F: FnOnce() + Send + 'static,
    {
        let hook = TypeHook {
            type_name: type_name::<T>(),
            cleanup: Some(Box::new(cleanup)),
        };
        match self.slots.get(&TypeId::of::<T>()) {
            Some(&slot) => self.hooks[slot] = hook,
            None => {
                self.slots.insert(TypeId::of::<T>(), self.hooks.len());
                self.hooks.push(hook);
            }
        }
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every hook that has not run yet. Returns how many ran.
    pub fn run_all(&mut self) -> usize {
        let mut ran = 0;
        for hook in &mut self.hooks {
            if let Some(cleanup) = hook.cleanup.take() {
                debug!(type_name = hook.type_name, "type_cleanup");
                cleanup();
                ran += 1;
            }
        }
        ran
    }
}
