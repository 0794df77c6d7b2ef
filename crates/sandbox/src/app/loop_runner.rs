use std::f32::consts::PI;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use simcore::{
    AnyDriver, Camera2D, Contact, ContactListener, DrawCommand, FrameDriver, LoopMetricsSnapshot,
    MetricsHandle, PoolStats, RenderBatch, SchedulerError, Vec2, Viewport, World,
};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::bullet::{Bullet, BulletSpec, BULLET_SPRITE};
use super::config_file::SandboxConfig;
use super::physics::KinematicPhysics;
use super::turret::{FireStats, Turret};

const TURRET_RING_RADIUS: f32 = 4.0;

/// Headless stand-in for a sprite batch.
#[derive(Debug, Default)]
struct CountingBatch {
    draws: u64,
    bullets: u64,
}

impl RenderBatch for CountingBatch {
    fn draw(&mut self, command: DrawCommand) {
        self.draws += 1;
        if command.sprite == BULLET_SPRITE {
            self.bullets += 1;
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ContactCounter(Arc<AtomicUsize>);

impl ContactListener for ContactCounter {
    fn begin_contact(&mut self, _contact: &Contact) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub(crate) struct RunSummary {
    pub(crate) frames: u32,
    pub(crate) steps: u64,
    pub(crate) draws: u64,
    pub(crate) bullet_draws: u64,
    pub(crate) fired: u64,
    pub(crate) refused: u64,
    pub(crate) contacts: usize,
    pub(crate) pools: Vec<PoolStats>,
    pub(crate) metrics: LoopMetricsSnapshot,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_headless(&app.config) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                steps = summary.steps,
                draws = summary.draws,
                bullet_draws = summary.bullet_draws,
                fired = summary.fired,
                refused = summary.refused,
                contacts = summary.contacts,
                fps = summary.metrics.fps,
                tps = summary.metrics.tps,
                "sandbox_finished"
            );
            for pool in &summary.pools {
                info!(
                    type_name = pool.type_name,
                    free = pool.free,
                    active = pool.active,
                    cap = pool.cap,
                    created = pool.created,
                    destroyed = pool.destroyed,
                    "pool_stats"
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "sandbox_failed");
            ExitCode::FAILURE
        }
    }
}

fn build_world(config: &SandboxConfig, stats: &Arc<FireStats>, contacts: &ContactCounter) -> World {
    let scenario = &config.scenario;
    let mut world = World::new(Box::new(KinematicPhysics::new()), &config.core());

    let spec = BulletSpec {
        speed: scenario.bullet_speed,
        lifetime_seconds: scenario.bullet_lifetime_seconds,
    };
    world.register_projectile_factory(scenario.bullet_cap, move || Bullet::new(spec));
    world.register_projectile_cleanup::<Bullet, _>(|| info!("bullet_assets_released"));
    world.register_object_cleanup::<Turret, _>(|| info!("turret_assets_released"));
    world.register_contact_listener("hits", Box::new(contacts.clone()));

    let turrets = scenario.turrets.max(1);
    for index in 0..turrets {
        let angle = index as f32 / turrets as f32 * 2.0 * PI;
        let position = Vec2::from_angle(angle).scaled(TURRET_RING_RADIUS);
        world.add_object(Box::new(Turret::new(
            position,
            angle + PI,
            scenario.fire_interval_seconds,
            Arc::clone(stats),
        )));
    }
    world
}

/// Drives the world for the configured number of frames, rendering after each.
pub(crate) fn run_headless(config: &SandboxConfig) -> Result<RunSummary, SchedulerError> {
    let stats = Arc::new(FireStats::default());
    let contacts = ContactCounter::default();
    let world = build_world(config, &stats, &contacts);

    let metrics = MetricsHandle::default();
    let mut driver = AnyDriver::new(world, &config.loop_config, metrics.clone())?;
    let frame = Duration::from_millis(config.scenario.frame_ms);
    let camera = Camera2D::default();
    let viewport = Viewport {
        width: config.scenario.viewport_width,
        height: config.scenario.viewport_height,
    };
    let mut batch = CountingBatch::default();

    let mut outcome = Ok(());
    for _ in 0..config.scenario.frames {
        if let Err(err) = driver.advance(frame) {
            outcome = Err(err);
            break;
        }
        driver.post_advance();
        driver.with_sim(|world| {
            world.render(&camera, viewport, &mut batch, frame.as_secs_f32());
        });
    }

    let steps = driver.step_count();
    let pools = driver.with_sim(|world| world.projectile_stats());
    driver.shutdown();
    driver.with_sim(|world| world.dispose());
    outcome?;

    Ok(RunSummary {
        frames: config.scenario.frames,
        steps,
        draws: batch.draws,
        bullet_draws: batch.bullets,
        fired: stats.fired.load(Ordering::Relaxed),
        refused: stats.refused.load(Ordering::Relaxed),
        contacts: contacts.0.load(Ordering::Relaxed),
        pools,
        metrics: metrics.snapshot(),
    })
}
