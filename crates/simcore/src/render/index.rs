//! Draw-ordered index of renderable handles.
//!
//! Handles are grouped into buckets keyed by draw index inside a `BTreeMap`.
//! Each handle's placement (bucket key and slot) is cached at insertion time,
//! so removal never has to ask the renderable where it used to be; its draw
//! index may already have changed by then.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::geometry::{cull_visible, Rect, Vec2};

static NEXT_RENDER_ID: AtomicU64 = AtomicU64::new(1);

/// Sprite-batch collaborator; receives one command per drawn object.
pub trait RenderBatch {
    fn draw(&mut self, command: DrawCommand);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub sprite: &'static str,
    pub bounds: Rect,
    pub rotation_radians: f32,
    pub draw_index: i32,
}

/// Visual side of a game object as seen by the render stage.
pub trait Renderable {
    fn draw_index(&self) -> i32;

    fn can_render(&self) -> bool {
        true
    }

    fn bounding_box(&self) -> Rect;

    fn update_visuals(&mut self, _dt_seconds: f32) {}

    fn render(&mut self, batch: &mut dyn RenderBatch);

    fn is_graphics_disposed(&self) -> bool;

    fn dispose_graphics(&mut self);
}

pub type RenderableObject = dyn Renderable + Send;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(u64);

impl RenderId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Shared, non-owning reference the index keeps to a renderable.
///
/// The owning object keeps its own `Arc` to the concrete visual; the handle
/// only adds a stable identity used for membership tracking.
#[derive(Clone)]
pub struct RenderHandle {
    id: RenderId,
    target: Arc<Mutex<RenderableObject>>,
}

impl RenderHandle {
    pub fn new<R>(target: Arc<Mutex<R>>) -> Self
    where
        R: Renderable + Send + 'static,
    {
        let target: Arc<Mutex<RenderableObject>> = target;
        Self {
            id: RenderId(NEXT_RENDER_ID.fetch_add(1, Ordering::Relaxed)),
            target,
        }
    }

    pub fn id(&self) -> RenderId {
        self.id
    }

    /// Locks the renderable, recovering the inner value if a previous holder panicked.
    pub fn lock(&self) -> MutexGuard<'_, RenderableObject> {
        match self.target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(render_id = self.id.0, "renderable lock poisoned; recovered inner value");
                poisoned.into_inner()
            }
        }
    }

    pub fn draw_index(&self) -> i32 {
        self.lock().draw_index()
    }
}

impl fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle").field("id", &self.id).finish()
    }
}

#[derive(Debug, Default)]
struct RenderBucket {
    items: Vec<RenderHandle>,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    draw_index: i32,
    slot: usize,
}

/// Empty buckets are removed immediately, so iteration cost is the live handle
/// count plus the number of distinct draw indices in use.
#[derive(Debug, Default)]
pub struct RenderIndex {
    buckets: BTreeMap<i32, RenderBucket>,
    placements: HashMap<RenderId, Placement>,
}

impl RenderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts under the handle's current draw index. Returns `false` if the
    /// handle is already present.
    pub fn add(&mut self, handle: RenderHandle) -> bool {
        if self.placements.contains_key(&handle.id()) {
            return false;
        }
        let draw_index = handle.draw_index();
        self.insert_at(draw_index, handle);
        true
    }

    /// Removes by cached placement; safe after the renderable changed its draw index.
    pub fn remove(&mut self, id: RenderId) -> Option<RenderHandle> {
        let placement = self.placements.remove(&id)?;
        let Entry::Occupied(mut bucket) = self.buckets.entry(placement.draw_index) else {
            warn!(
                render_id = id.0,
                draw_index = placement.draw_index,
                "render index placement points at a missing bucket"
            );
            return None;
        };

        let items = &mut bucket.get_mut().items;
        if placement.slot >= items.len() {
            warn!(render_id = id.0, slot = placement.slot, "render index slot out of range");
            return None;
        }
        let removed = items.swap_remove(placement.slot);
        if let Some(moved) = items.get(placement.slot) {
            if let Some(moved_placement) = self.placements.get_mut(&moved.id()) {
                moved_placement.slot = placement.slot;
            }
        }
        if items.is_empty() {
            bucket.remove();
        }
        Some(removed)
    }

    /// Moves the handle to its current draw index. Returns `true` if it moved.
    ///
    /// The handle must not be locked by the caller.
    pub fn reindex(&mut self, handle: &RenderHandle) -> bool {
        let current = handle.draw_index();
        self.move_to(handle.id(), current)
    }

    /// Moves a tracked handle to `draw_index` without consulting the renderable.
    pub fn move_to(&mut self, id: RenderId, draw_index: i32) -> bool {
        match self.placements.get(&id) {
            None => false,
            Some(placement) if placement.draw_index == draw_index => false,
            Some(_) => match self.remove(id) {
                Some(handle) => {
                    self.insert_at(draw_index, handle);
                    true
                }
                None => false,
            },
        }
    }

    pub fn contains(&self, id: RenderId) -> bool {
        self.placements.contains_key(&id)
    }

    /// Draw index the handle is currently filed under.
    pub fn placed_draw_index(&self, id: RenderId) -> Option<i32> {
        self.placements.get(&id).map(|placement| placement.draw_index)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.placements.clear();
    }

    /// Handles in ascending draw-index order, without the renderability filter.
    pub fn handles(&self) -> impl Iterator<Item = &RenderHandle> + '_ {
        self.buckets.values().flat_map(|bucket| bucket.items.iter())
    }

    /// Visits renderable handles in ascending draw-index order. Returns the visit count.
    pub fn for_each<F>(&self, mut visitor: F) -> usize
    where
        F: FnMut(&mut RenderableObject),
    {
        let mut visited = 0;
        for handle in self.handles() {
            let mut target = handle.lock();
            if !target.can_render() {
                continue;
            }
            visitor(&mut *target);
            visited += 1;
        }
        visited
    }

    /// Like [`RenderIndex::for_each`], skipping handles outside the padded view rectangle.
    pub fn for_each_culled<F>(&self, view_center: Vec2, view_size: Vec2, mut visitor: F) -> usize
    where
        F: FnMut(&mut RenderableObject),
    {
        let mut visited = 0;
        for handle in self.handles() {
            let mut target = handle.lock();
            if !target.can_render() {
                continue;
            }
            if !cull_visible(target.bounding_box(), view_center, view_size) {
                continue;
            }
            visitor(&mut *target);
            visited += 1;
        }
        visited
    }

    fn insert_at(&mut self, draw_index: i32, handle: RenderHandle) {
        let bucket = self.buckets.entry(draw_index).or_default();
        let slot = bucket.items.len();
        self.placements
            .insert(handle.id(), Placement { draw_index, slot });
        bucket.items.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Marker {
        tag: u32,
        draw_index: i32,
        visible: bool,
        bounds: Rect,
        disposed: bool,
    }

    impl Marker {
        fn shared(tag: u32, draw_index: i32) -> Arc<Mutex<Marker>> {
            Arc::new(Mutex::new(Marker {
                tag,
                draw_index,
                visible: true,
                bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
                disposed: false,
            }))
        }
    }

    impl Renderable for Marker {
        fn draw_index(&self) -> i32 {
            self.draw_index
        }

        fn can_render(&self) -> bool {
            self.visible
        }

        fn bounding_box(&self) -> Rect {
            self.bounds
        }

        fn render(&mut self, batch: &mut dyn RenderBatch) {
            batch.draw(DrawCommand {
                sprite: "marker",
                bounds: self.bounds,
                rotation_radians: 0.0,
                draw_index: self.draw_index,
            });
        }

        fn is_graphics_disposed(&self) -> bool {
            self.disposed
        }

        fn dispose_graphics(&mut self) {
            self.disposed = true;
        }
    }

    fn tags_in_order(index: &RenderIndex) -> Vec<(i32, u32)> {
        let mut seen = Vec::new();
        index.for_each(|target| {
            seen.push((target.draw_index(), target.bounding_box().x as u32));
        });
        seen
    }

    fn marker_tag(marker: &Arc<Mutex<Marker>>) -> u32 {
        marker.lock().expect("marker").tag
    }

    #[test]
    fn iterates_in_ascending_draw_index_order() {
        let mut index = RenderIndex::new();
        for (tag, draw_index) in [(1, 5), (2, -3), (3, 5), (4, 0)] {
            let marker = Marker::shared(tag, draw_index);
            marker.lock().expect("marker").bounds.x = tag as f32;
            index.add(RenderHandle::new(marker));
        }

        let order = tags_in_order(&index);
        let indices: Vec<i32> = order.iter().map(|(draw_index, _)| *draw_index).collect();
        assert_eq!(indices, vec![-3, 0, 5, 5]);
        assert_eq!(index.bucket_count(), 3);
    }

    #[test]
    fn add_rejects_duplicate_handle() {
        let mut index = RenderIndex::new();
        let handle = RenderHandle::new(Marker::shared(1, 0));
        assert!(index.add(handle.clone()));
        assert!(!index.add(handle));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn removing_last_item_drops_bucket() {
        let mut index = RenderIndex::new();
        let handle = RenderHandle::new(Marker::shared(1, 7));
        index.add(handle.clone());
        assert!(index.remove(handle.id()).is_some());
        assert_eq!(index.bucket_count(), 0);
        assert!(index.is_empty());
        assert!(index.remove(handle.id()).is_none());
    }

    #[test]
    fn remove_uses_cached_index_after_draw_index_changed() {
        let mut index = RenderIndex::new();
        let marker = Marker::shared(1, 2);
        let handle = RenderHandle::new(marker.clone());
        index.add(handle.clone());

        marker.lock().expect("marker").draw_index = 9;
        assert_eq!(index.placed_draw_index(handle.id()), Some(2));
        assert!(index.remove(handle.id()).is_some());
        assert_eq!(index.bucket_count(), 0);
    }

    #[test]
    fn swap_remove_keeps_moved_slot_addressable() {
        let mut index = RenderIndex::new();
        let handles: Vec<RenderHandle> = (0..4)
            .map(|tag| RenderHandle::new(Marker::shared(tag, 1)))
            .collect();
        for handle in &handles {
            index.add(handle.clone());
        }

        index.remove(handles[0].id());
        // The last handle now occupies slot 0; removing it must still work.
        assert!(index.remove(handles[3].id()).is_some());
        assert!(index.remove(handles[1].id()).is_some());
        assert!(index.remove(handles[2].id()).is_some());
        assert!(index.is_empty());
    }

    #[test]
    fn reindex_moves_to_new_bucket_and_skips_unchanged() {
        let mut index = RenderIndex::new();
        let marker = Marker::shared(1, 0);
        let handle = RenderHandle::new(marker.clone());
        index.add(handle.clone());

        assert!(!index.reindex(&handle));
        marker.lock().expect("marker").draw_index = 4;
        assert!(index.reindex(&handle));
        assert_eq!(index.placed_draw_index(handle.id()), Some(4));
        assert_eq!(index.bucket_count(), 1);
    }

    #[test]
    fn reindex_of_untracked_handle_is_noop() {
        let mut index = RenderIndex::new();
        let handle = RenderHandle::new(Marker::shared(1, 0));
        assert!(!index.reindex(&handle));
        assert!(index.is_empty());
    }

    #[test]
    fn for_each_skips_non_renderable_handles() {
        let mut index = RenderIndex::new();
        let hidden = Marker::shared(1, 0);
        hidden.lock().expect("marker").visible = false;
        index.add(RenderHandle::new(hidden));
        index.add(RenderHandle::new(Marker::shared(2, 0)));

        let mut tags = Vec::new();
        let visited = index.for_each(|target| tags.push(target.draw_index()));
        assert_eq!(visited, 1);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn churn_preserves_membership_and_order() {
        let mut index = RenderIndex::new();
        let markers: Vec<Arc<Mutex<Marker>>> = (0..32)
            .map(|tag| Marker::shared(tag, (tag % 5) as i32 - 2))
            .collect();
        let handles: Vec<RenderHandle> = markers
            .iter()
            .map(|marker| RenderHandle::new(marker.clone()))
            .collect();
        for handle in &handles {
            index.add(handle.clone());
        }

        let mut expected: HashSet<RenderId> = handles.iter().map(RenderHandle::id).collect();
        for (i, handle) in handles.iter().enumerate() {
            match i % 3 {
                0 => {
                    index.remove(handle.id());
                    expected.remove(&handle.id());
                }
                1 => {
                    markers[i].lock().expect("marker").draw_index = 10 - i as i32;
                    index.reindex(handle);
                }
                _ => {}
            }
        }

        let listed: Vec<RenderId> = index.handles().map(RenderHandle::id).collect();
        let listed_set: HashSet<RenderId> = listed.iter().copied().collect();
        assert_eq!(listed.len(), listed_set.len());
        assert_eq!(listed_set, expected);

        let draw_indices: Vec<i32> = index
            .handles()
            .map(|handle| index.placed_draw_index(handle.id()).expect("placed"))
            .collect();
        assert!(draw_indices.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(markers.iter().all(|marker| marker_tag(marker) < 32));
    }

    #[test]
    fn culled_iteration_skips_far_objects() {
        let mut index = RenderIndex::new();
        let near = Marker::shared(1, 0);
        near.lock().expect("marker").bounds = Rect::new(1.0, 1.0, 1.0, 1.0);
        let far = Marker::shared(2, 0);
        far.lock().expect("marker").bounds = Rect::new(100.0, 0.0, 1.0, 1.0);
        index.add(RenderHandle::new(near));
        index.add(RenderHandle::new(far));

        let mut seen = Vec::new();
        let visited = index.for_each_culled(Vec2::ZERO, Vec2::new(20.0, 20.0), |target| {
            seen.push(target.bounding_box().x);
        });
        assert_eq!(visited, 1);
        assert_eq!(seen, vec![1.0]);
    }

    struct CountingBatch(usize);

    impl RenderBatch for CountingBatch {
        fn draw(&mut self, _command: DrawCommand) {
            self.0 += 1;
        }
    }

    #[test]
    fn visitor_can_render_into_batch() {
        let mut index = RenderIndex::new();
        index.add(RenderHandle::new(Marker::shared(1, 0)));
        index.add(RenderHandle::new(Marker::shared(2, 1)));
        let mut batch = CountingBatch(0);
        index.for_each(|target| target.render(&mut batch));
        assert_eq!(batch.0, 2);
    }
}
