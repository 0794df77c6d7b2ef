use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use simcore::{
    BodyDef, BodyId, BodyKind, Destroy, DrawCommand, GameObject, ObjectId, PoolError, Rect,
    RenderBatch, RenderHandle, Renderable, SimContext, SpawnParams, StepContext, TeardownState,
    Timer, Vec2,
};
use tracing::{debug, error};

use super::bullet::Bullet;

pub(crate) const TURRET_SPRITE: &str = "turret";
const TURRET_DRAW_INDEX: i32 = 5;
const TURRET_SIZE: f32 = 1.0;
const MUZZLE_OFFSET: f32 = 0.75;

/// Shot counters shared with whoever wants to report on the turrets.
#[derive(Debug, Default)]
pub(crate) struct FireStats {
    pub(crate) fired: AtomicU64,
    pub(crate) refused: AtomicU64,
}

#[derive(Debug)]
struct TurretVisual {
    bounds: Rect,
    rotation_radians: f32,
    disposed: bool,
}

impl Renderable for TurretVisual {
    fn draw_index(&self) -> i32 {
        TURRET_DRAW_INDEX
    }

    fn can_render(&self) -> bool {
        !self.disposed
    }

    fn bounding_box(&self) -> Rect {
        self.bounds
    }

    fn render(&mut self, batch: &mut dyn RenderBatch) {
        batch.draw(DrawCommand {
            sprite: TURRET_SPRITE,
            bounds: self.bounds,
            rotation_radians: self.rotation_radians,
            draw_index: TURRET_DRAW_INDEX,
        });
    }

    fn is_graphics_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose_graphics(&mut self) {
        self.disposed = true;
    }
}

/// Static emplacement that sweeps its aim and fires a pooled bullet every
/// time its cooldown elapses.
pub(crate) struct Turret {
    teardown: TeardownState,
    position: Vec2,
    aim_radians: f32,
    sweep_radians_per_second: f32,
    cooldown: Timer,
    body: Option<BodyId>,
    stats: Arc<FireStats>,
    visual: Arc<Mutex<TurretVisual>>,
    handle: RenderHandle,
    removal: bool,
}

impl Turret {
    pub(crate) fn new(
        position: Vec2,
        aim_radians: f32,
        fire_interval_seconds: f32,
        stats: Arc<FireStats>,
    ) -> Self {
        let visual = Arc::new(Mutex::new(TurretVisual {
            bounds: Rect::centered(position, Vec2::new(TURRET_SIZE, TURRET_SIZE)),
            rotation_radians: aim_radians,
            disposed: false,
        }));
        let handle = RenderHandle::new(visual.clone());
        Self {
            teardown: TeardownState::default(),
            position,
            aim_radians,
            sweep_radians_per_second: 0.5,
            cooldown: Timer::started(fire_interval_seconds),
            body: None,
            stats,
            visual,
            handle,
            removal: false,
        }
    }

    fn set_visual_rotation(&self) {
        let mut visual = match self.visual.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        visual.rotation_radians = self.aim_radians;
    }

    fn fire(&mut self, ctx: &mut StepContext<'_>) -> Result<(), PoolError> {
        let muzzle = self
            .position
            .add(Vec2::from_angle(self.aim_radians).scaled(MUZZLE_OFFSET));
        match ctx.spawn_projectile::<Bullet>(SpawnParams::at(muzzle, self.aim_radians))? {
            Some(_) => {
                self.stats.fired.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.stats.refused.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Destroy for Turret {
    fn teardown_state(&mut self) -> &mut TeardownState {
        &mut self.teardown
    }

    fn is_reset(&self) -> bool {
        self.body.is_none()
    }

    fn reset(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(body) = self.body.take() {
            ctx.physics.destroy_body(body);
        }
        self.cooldown.stop();
    }

    fn dispose(&mut self, _ctx: &mut SimContext<'_>) {
        let mut visual = match self.visual.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        visual.dispose_graphics();
    }
}

impl GameObject for Turret {
    fn on_added(&mut self, id: ObjectId, ctx: &mut StepContext<'_>) {
        self.body = Some(ctx.physics.create_body(BodyDef {
            kind: BodyKind::Static,
            position: self.position,
            rotation_radians: self.aim_radians,
            half_extents: Vec2::new(TURRET_SIZE * 0.5, TURRET_SIZE * 0.5),
            ..BodyDef::default()
        }));
        debug!(object_id = id.0, x = self.position.x, y = self.position.y, "turret_placed");
    }

    fn update(&mut self, dt_seconds: f32, ctx: &mut StepContext<'_>) {
        self.aim_radians += self.sweep_radians_per_second * dt_seconds;
        self.set_visual_rotation();

        self.cooldown.advance(dt_seconds);
        if !self.cooldown.is_finished() {
            return;
        }
        self.cooldown.reset();
        if let Err(err) = self.fire(ctx) {
            error!(error = %err, "turret_fire_failed");
            self.request_removal();
        }
    }

    fn is_pending_removal(&self) -> bool {
        self.removal
    }

    fn request_removal(&mut self) {
        self.removal = true;
    }

    fn render_handle(&self) -> Option<RenderHandle> {
        Some(self.handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use simcore::{CoreConfig, World};

    use super::*;
    use crate::app::bullet::BulletSpec;
    use crate::app::physics::KinematicPhysics;

    fn world() -> World {
        World::new(Box::new(KinematicPhysics::new()), &CoreConfig::default())
    }

    #[test]
    fn turret_fires_on_cooldown_and_respects_pool_cap() {
        let mut world = world();
        world.register_projectile_factory(2, || {
            Bullet::new(BulletSpec {
                speed: 5.0,
                lifetime_seconds: 100.0,
            })
        });
        let stats = Arc::new(FireStats::default());
        world.add_object(Box::new(Turret::new(Vec2::ZERO, 0.0, 0.5, stats.clone())));

        for _ in 0..8 {
            world.fixed_step(0.25);
        }

        assert_eq!(stats.fired.load(Ordering::Relaxed), 2);
        assert_eq!(stats.refused.load(Ordering::Relaxed), 2);
        assert_eq!(world.projectiles().active_count(), 2);
    }

    #[test]
    fn turret_without_bullet_factory_reports_and_removes_itself() {
        let mut world = world();
        let stats = Arc::new(FireStats::default());
        let id = world.add_object(Box::new(Turret::new(Vec2::ZERO, 0.0, 0.1, stats.clone())));

        world.fixed_step(0.1);
        assert!(world
            .objects()
            .get(id)
            .is_some_and(|turret| turret.is_pending_removal()));
        world.fixed_step(0.1);
        assert!(!world.objects().contains(id));
        assert_eq!(world.physics().body_count(), 0);
    }
}
