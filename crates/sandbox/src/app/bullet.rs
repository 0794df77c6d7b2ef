use std::sync::{Arc, Mutex};

use simcore::{
    BodyDef, BodyId, BodyKind, Destroy, DrawCommand, Poolable, Rect, RenderBatch, RenderHandle,
    Renderable, SimContext, SpawnParams, TeardownState, Timer, Vec2,
};

pub(crate) const BULLET_SPRITE: &str = "bullet";
pub(crate) const BULLET_DRAW_INDEX: i32 = 10;
const BULLET_SIZE: f32 = 0.25;

#[derive(Debug, Clone, Copy)]
pub(crate) struct BulletSpec {
    pub(crate) speed: f32,
    pub(crate) lifetime_seconds: f32,
}

#[derive(Debug)]
struct BulletVisual {
    bounds: Rect,
    rotation_radians: f32,
    visible: bool,
    disposed: bool,
}

impl Renderable for BulletVisual {
    fn draw_index(&self) -> i32 {
        BULLET_DRAW_INDEX
    }

    fn can_render(&self) -> bool {
        self.visible && !self.disposed
    }

    fn bounding_box(&self) -> Rect {
        self.bounds
    }

    fn render(&mut self, batch: &mut dyn RenderBatch) {
        batch.draw(DrawCommand {
            sprite: BULLET_SPRITE,
            bounds: self.bounds,
            rotation_radians: self.rotation_radians,
            draw_index: BULLET_DRAW_INDEX,
        });
    }

    fn is_graphics_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose_graphics(&mut self) {
        self.disposed = true;
    }
}

/// Pooled projectile: a kinematic sensor body that flies straight until its
/// lifetime runs out.
pub(crate) struct Bullet {
    spec: BulletSpec,
    teardown: TeardownState,
    body: Option<BodyId>,
    lifetime: Timer,
    active: bool,
    visual: Arc<Mutex<BulletVisual>>,
    handle: RenderHandle,
}

impl Bullet {
    pub(crate) fn new(spec: BulletSpec) -> Self {
        let visual = Arc::new(Mutex::new(BulletVisual {
            bounds: Rect::default(),
            rotation_radians: 0.0,
            visible: false,
            disposed: false,
        }));
        let handle = RenderHandle::new(visual.clone());
        Self {
            spec,
            teardown: TeardownState::default(),
            body: None,
            lifetime: Timer::new(spec.lifetime_seconds),
            active: false,
            visual,
            handle,
        }
    }

    fn with_visual(&self, apply: impl FnOnce(&mut BulletVisual)) {
        let mut visual = match self.visual.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut visual);
    }
}

impl Destroy for Bullet {
    fn teardown_state(&mut self) -> &mut TeardownState {
        &mut self.teardown
    }

    fn is_reset(&self) -> bool {
        !self.active && self.body.is_none()
    }

    fn reset(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(body) = self.body.take() {
            ctx.physics.destroy_body(body);
        }
        self.active = false;
        self.lifetime.stop();
        self.lifetime.reset();
        self.with_visual(|visual| visual.visible = false);
    }

    fn dispose(&mut self, _ctx: &mut SimContext<'_>) {
        self.with_visual(|visual| visual.dispose_graphics());
    }
}

impl Poolable for Bullet {
    fn activate(&mut self, params: SpawnParams, ctx: &mut SimContext<'_>) {
        let velocity = Vec2::from_angle(params.rotation_radians).scaled(self.spec.speed);
        self.body = Some(ctx.physics.create_body(BodyDef {
            kind: BodyKind::Kinematic,
            position: params.position,
            rotation_radians: params.rotation_radians,
            linear_velocity: velocity,
            half_extents: Vec2::new(BULLET_SIZE * 0.5, BULLET_SIZE * 0.5),
            is_sensor: true,
        }));
        self.active = true;
        self.lifetime.restart();
        self.with_visual(|visual| {
            visual.bounds = Rect::centered(params.position, Vec2::new(BULLET_SIZE, BULLET_SIZE));
            visual.rotation_radians = params.rotation_radians;
            visual.visible = true;
        });
    }

    fn update(&mut self, dt_seconds: f32, _ctx: &mut SimContext<'_>) {
        self.lifetime.advance(dt_seconds);
    }

    fn post_update(&mut self, _dt_seconds: f32, ctx: &mut SimContext<'_>) {
        let Some(state) = self.body.and_then(|body| ctx.physics.body_state(body)) else {
            return;
        };
        self.with_visual(|visual| {
            visual.bounds = Rect::centered(state.position, Vec2::new(BULLET_SIZE, BULLET_SIZE));
            visual.rotation_radians = state.rotation_radians;
        });
    }

    fn should_release(&self) -> bool {
        self.active && self.lifetime.is_finished()
    }

    fn render_handle(&self) -> Option<RenderHandle> {
        Some(self.handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use simcore::{PhysicsWorld, ProjectileRegistry, RenderIndex};

    use super::*;
    use crate::app::physics::KinematicPhysics;

    fn spec() -> BulletSpec {
        BulletSpec {
            speed: 10.0,
            lifetime_seconds: 0.5,
        }
    }

    #[test]
    fn bullet_flies_then_returns_to_pool_when_lifetime_ends() {
        let mut physics = KinematicPhysics::new();
        let mut render_index = RenderIndex::new();
        let mut projectiles = ProjectileRegistry::default();
        projectiles.register_factory(4, || Bullet::new(spec()));

        let id = {
            let mut ctx = SimContext::new(&mut physics, &mut render_index);
            projectiles
                .obtain::<Bullet>(SpawnParams::at(Vec2::ZERO, 0.0), &mut ctx)
                .expect("factory")
                .expect("capacity")
        };
        assert_eq!(physics.body_count(), 1);
        assert_eq!(render_index.len(), 1);

        let mut ctx = SimContext::new(&mut physics, &mut render_index);
        assert_eq!(projectiles.update(0.25, &mut ctx), Ok(0));
        assert!(projectiles.get::<Bullet>(id).is_some_and(|bullet| bullet.body.is_some()));
        assert_eq!(projectiles.update(0.25, &mut ctx), Ok(1));
        assert!(projectiles.get::<Bullet>(id).is_none());
        drop(ctx);

        assert_eq!(physics.body_count(), 0);
        assert!(render_index.is_empty());
    }

    #[test]
    fn reset_hides_visual_and_dispose_releases_graphics() {
        let mut physics = KinematicPhysics::new();
        let mut render_index = RenderIndex::new();
        let mut ctx = SimContext::new(&mut physics, &mut render_index);
        let mut bullet = Bullet::new(spec());

        bullet.activate(SpawnParams::at(Vec2::new(1.0, 1.0), 0.0), &mut ctx);
        assert!(bullet.handle.lock().can_render());
        assert!(!bullet.is_reset());

        assert!(simcore::destroy(&mut bullet, &mut ctx));
        assert!(bullet.is_reset());
        assert!(!bullet.handle.lock().can_render());
        assert!(bullet.handle.lock().is_graphics_disposed());
    }
}
