//! Headless walkthrough of a level: an observer walks away from the spawn
//! point while the spawn queue and LOD scheduler run every step.

use std::collections::BTreeMap;
use std::time::Duration;

use glam::Vec3;
use proxim_common::{EntityPlacement, GroupId, PlacementGroup, PlacementId, PlacementKind, Tier};
use proxim_kernel::World;
use proxim_level::LevelPlacements;
use proxim_stream::{
    DeferredSpawnQueue, LodScheduler, ObserverSource, SchedulerStats, SpawnRecord, SpawnStats,
    StreamConfig,
};

/// Observer moving in a straight line at constant speed, stopping at its
/// target.
#[derive(Debug, Clone, Copy)]
pub struct Walker {
    position: Vec3,
    target: Vec3,
    speed: f32,
}

impl Walker {
    pub fn new(start: Vec3, target: Vec3, speed: f32) -> Self {
        Self {
            position: start,
            target,
            speed,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn arrived(&self) -> bool {
        self.position == self.target
    }

    pub fn advance(&mut self, dt: Duration) {
        let step = self.speed * dt.as_secs_f32();
        let remaining = self.target - self.position;
        if remaining.length() <= step {
            self.position = self.target;
        } else {
            self.position += remaining.normalize_or_zero() * step;
        }
    }
}

impl ObserverSource for Walker {
    fn observer_position(&self) -> Option<Vec3> {
        Some(self.position)
    }
}

/// `grid` x `grid` placements `spacing` apart starting at the origin, with
/// a three-member group in every fourth cell along both axes.
pub fn synthetic_level(grid: u32, spacing: f32) -> LevelPlacements {
    let mut individuals = Vec::new();
    let mut next = 0u64;
    for x in 0..grid {
        for z in 0..grid {
            let position = Vec3::new(x as f32 * spacing, 0.0, z as f32 * spacing);
            let (kind, tag) = if (x + z) % 3 == 0 {
                (PlacementKind::Prop, "barrel")
            } else {
                (PlacementKind::Enemy, "skeleton")
            };
            individuals.push(EntityPlacement::new(PlacementId(next), kind, tag, position));
            next += 1;
        }
    }

    let mut groups = Vec::new();
    for x in (0..grid).step_by(4) {
        for z in (0..grid).step_by(4) {
            let anchor = Vec3::new((x as f32 + 0.5) * spacing, 0.0, (z as f32 + 0.5) * spacing);
            let members = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)]
                .into_iter()
                .map(|offset| {
                    let id = PlacementId(next);
                    next += 1;
                    EntityPlacement::new(id, PlacementKind::Enemy, "wolf", anchor + offset)
                })
                .collect();
            groups.push(PlacementGroup {
                id: GroupId(groups.len() as u64),
                anchor,
                members,
            });
        }
    }

    LevelPlacements {
        name: format!("synthetic {grid}x{grid}"),
        spawn_point: Vec3::ZERO,
        individuals,
        groups,
    }
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub steps: u32,
    pub dt: Duration,
    pub speed: f32,
    /// Log diagnostics every this many steps; zero disables.
    pub report_every: u32,
}

#[derive(Debug, Clone)]
pub struct SimReport {
    pub level: String,
    pub placements: usize,
    pub primed: usize,
    pub steps: u32,
    pub observer: Vec3,
    /// Whether the observer reached the end of its walk.
    pub arrived: bool,
    pub live_entities: usize,
    pub lod: SchedulerStats,
    pub spawn: SpawnStats,
    pub tiers: BTreeMap<Tier, usize>,
}

/// Farthest placement from the spawn point, so the walk crosses the level.
fn walk_target(level: &LevelPlacements) -> Vec3 {
    level
        .individuals
        .iter()
        .map(|p| p.position)
        .chain(level.groups.iter().map(|g| g.anchor))
        .max_by(|a, b| {
            a.distance_squared(level.spawn_point)
                .total_cmp(&b.distance_squared(level.spawn_point))
        })
        .unwrap_or(level.spawn_point)
}

fn register_all(world: &World, lod: &mut LodScheduler, records: &[SpawnRecord]) {
    for record in records {
        if let Some(entity) = world.get(record.entity) {
            lod.register(entity);
        }
    }
}

pub fn run(level: LevelPlacements, config: &StreamConfig, options: &SimOptions) -> anyhow::Result<SimReport> {
    let mut world = World::new();
    let mut queue = DeferredSpawnQueue::new(&config.spawn)?;
    let mut lod = LodScheduler::new(&config.lod)?;

    let placements = level.total();
    let target = walk_target(&level);
    queue.extend(level.individuals);
    for group in level.groups {
        queue.enqueue_group(group);
    }

    let primed = queue.prime(level.spawn_point, &mut world);
    register_all(&world, &mut lod, &primed);
    lod.force_evaluate();

    let mut walker = Walker::new(level.spawn_point, target, options.speed);
    for step in 1..=options.steps {
        walker.advance(options.dt);
        world.step();
        world.drain_events();

        let outcome = queue.tick(options.dt, &walker, &mut world);
        register_all(&world, &mut lod, outcome.spawned());
        lod.update(options.dt, &walker);

        if options.report_every > 0 && step % options.report_every == 0 {
            tracing::info!(step, observer = ?walker.position(), "{}", lod.stats());
            tracing::info!(step, "{}", queue.stats());
        }
    }

    Ok(SimReport {
        level: level.name,
        placements,
        primed: primed.len(),
        steps: options.steps,
        observer: walker.position(),
        arrived: walker.arrived(),
        live_entities: world.entity_count(),
        lod: lod.stats(),
        spawn: queue.stats(),
        tiers: world.tier_histogram(),
    })
}
