//! Deferred spawning: placements are materialized progressively as the
//! observer comes within range, never more than a fixed number per tick.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use glam::Vec3;
use proxim_common::{EntityId, EntityPlacement, GroupId, PlacementGroup, PlacementId};
use proxim_kernel::World;

use crate::config::{ConfigError, SpawnConfig, SpawnSettings};
use crate::diagnostics::SpawnStats;
use crate::observer::{self, ObserverSource};

/// A materializer refused a placement. The placement is consumed either way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpawnError {
    #[error("placement {id} rejected: {reason}")]
    Rejected { id: PlacementId, reason: String },
}

/// Turns a static placement into a live entity.
pub trait Materializer {
    fn materialize(&mut self, placement: &EntityPlacement) -> Result<EntityId, SpawnError>;
}

impl Materializer for World {
    fn materialize(&mut self, placement: &EntityPlacement) -> Result<EntityId, SpawnError> {
        Ok(self.spawn_placement(placement))
    }
}

/// One successful materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRecord {
    pub placement: EntityPlacement,
    pub entity: EntityId,
    /// Group the placement was materialized with, if any.
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The spawn interval has not elapsed.
    Waiting,
    /// No usable observer position; the scan is retried on the next tick.
    NoObserver,
    /// Nothing is pending. Further ticks are free but unnecessary.
    Drained,
    Scanned(Vec<SpawnRecord>),
}

impl TickOutcome {
    /// Records materialized by this tick; empty unless it scanned.
    pub fn spawned(&self) -> &[SpawnRecord] {
        match self {
            TickOutcome::Scanned(records) => records,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Placements are being queued; the load-time pass has not run.
    Loading,
    Streaming,
    Drained,
}

/// Pending placements plus the record of everything already processed.
#[derive(Debug)]
pub struct DeferredSpawnQueue {
    settings: SpawnSettings,
    individuals: Vec<EntityPlacement>,
    groups: Vec<PlacementGroup>,
    /// Every pending id, individual or group member.
    pending: HashSet<PlacementId>,
    spawned: HashMap<PlacementId, EntityId>,
    failed: HashSet<PlacementId>,
    elapsed: Duration,
    state: QueueState,
    stats: SpawnStats,
}

impl DeferredSpawnQueue {
    pub fn new(config: &SpawnConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_settings(config.validate()?))
    }

    pub fn with_settings(settings: SpawnSettings) -> Self {
        Self {
            settings,
            individuals: Vec::new(),
            groups: Vec::new(),
            pending: HashSet::new(),
            spawned: HashMap::new(),
            failed: HashSet::new(),
            elapsed: Duration::ZERO,
            state: QueueState::Loading,
            stats: SpawnStats::default(),
        }
    }

    pub fn settings(&self) -> &SpawnSettings {
        &self.settings
    }

    fn is_known(&self, id: PlacementId) -> bool {
        self.pending.contains(&id) || self.spawned.contains_key(&id) || self.failed.contains(&id)
    }

    /// Queue one placement. Returns `false` if its id is already pending or
    /// was already processed.
    pub fn enqueue(&mut self, placement: EntityPlacement) -> bool {
        if self.is_known(placement.id) {
            tracing::trace!(placement = %placement.id, "duplicate placement ignored");
            return false;
        }
        if !placement.position.is_finite() {
            tracing::trace!(placement = %placement.id, position = ?placement.position, "non-finite placement ignored");
            return false;
        }
        self.pending.insert(placement.id);
        self.individuals.push(placement);
        self.reopen();
        true
    }

    /// Queue a group. Rejected as a whole if it is empty, repeats an id,
    /// shares an id with anything already known, or has a non-finite
    /// anchor or member position.
    pub fn enqueue_group(&mut self, group: PlacementGroup) -> bool {
        let mut ids = HashSet::with_capacity(group.len());
        let clean = !group.is_empty() && group.ids().all(|id| !self.is_known(id) && ids.insert(id));
        if !clean {
            tracing::trace!(group = %group.id, "group rejected");
            return false;
        }
        if !group.anchor.is_finite() || group.members.iter().any(|m| !m.position.is_finite()) {
            tracing::trace!(group = %group.id, anchor = ?group.anchor, "non-finite group rejected");
            return false;
        }
        self.pending.extend(ids);
        self.groups.push(group);
        self.reopen();
        true
    }

    /// Queue many placements; returns how many were accepted.
    pub fn extend(&mut self, placements: impl IntoIterator<Item = EntityPlacement>) -> usize {
        placements.into_iter().map(|p| self.enqueue(p)).filter(|accepted| *accepted).count()
    }

    fn reopen(&mut self) {
        if self.state == QueueState::Drained {
            self.state = QueueState::Streaming;
        }
    }

    /// Load-time pass: materialize everything within the near radius of
    /// `spawn_point`, ignoring the per-tick cap.
    pub fn prime(&mut self, spawn_point: Vec3, materializer: &mut impl Materializer) -> Vec<SpawnRecord> {
        let _span = tracing::info_span!("spawn_prime", pending = self.pending.len()).entered();
        let records = if spawn_point.is_finite() {
            self.scan(spawn_point, self.settings.near_radius, usize::MAX, materializer)
        } else {
            tracing::warn!(?spawn_point, "spawn point is not finite, nothing primed");
            Vec::new()
        };
        tracing::info!(spawned = records.len(), pending = self.pending.len(), "primed spawn queue");
        self.state = QueueState::Streaming;
        self.settle();
        records
    }

    /// Steady-state pass, gated by the spawn interval.
    pub fn tick(
        &mut self,
        dt: Duration,
        observer: &impl ObserverSource,
        materializer: &mut impl Materializer,
    ) -> TickOutcome {
        if self.pending.is_empty() {
            self.settle();
            return TickOutcome::Drained;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < self.settings.interval {
            return TickOutcome::Waiting;
        }
        let Some(observer) = observer::sample(observer) else {
            tracing::trace!("observer unavailable, spawn scan deferred");
            return TickOutcome::NoObserver;
        };
        self.elapsed = Duration::ZERO;
        if self.state == QueueState::Loading {
            self.state = QueueState::Streaming;
        }

        let _span = tracing::debug_span!("spawn_tick", pending = self.pending.len()).entered();
        let started = Instant::now();
        let records = self.scan(
            observer,
            self.settings.activation_radius,
            self.settings.per_tick_cap,
            materializer,
        );
        let duration = started.elapsed();
        self.stats.ticks += 1;
        self.stats.spawned_last_tick = records.len();
        self.stats.last_tick_duration = duration;
        tracing::debug!(
            spawned = records.len(),
            pending = self.pending.len(),
            duration = ?duration,
            "spawn tick complete"
        );
        self.settle();
        TickOutcome::Scanned(records)
    }

    /// Materialize a specific placement now, or the whole group holding it.
    /// No-op for ids that were already processed or never queued.
    pub fn request(&mut self, id: PlacementId, materializer: &mut impl Materializer) -> Vec<SpawnRecord> {
        let mut records = Vec::new();
        if !self.pending.contains(&id) {
            tracing::trace!(placement = %id, "spawn request ignored");
            return records;
        }
        if let Some(i) = self.individuals.iter().position(|p| p.id == id) {
            let placement = self.individuals.swap_remove(i);
            self.pending.remove(&placement.id);
            records.extend(self.materialize(placement, None, materializer));
        } else if let Some(g) = self.groups.iter().position(|g| g.ids().any(|m| m == id)) {
            let group = self.groups.swap_remove(g);
            self.materialize_group(group, &mut records, materializer);
        }
        self.settle();
        records
    }

    /// Individuals first, then groups, until `cap` materializations have
    /// been attempted. A group is taken only whole: when it fits in what is
    /// left of the cap, or when nothing else was attempted this scan.
    fn scan(
        &mut self,
        center: Vec3,
        radius: f32,
        cap: usize,
        materializer: &mut impl Materializer,
    ) -> Vec<SpawnRecord> {
        let mut records = Vec::new();
        let mut attempts = 0usize;

        let mut i = 0;
        while i < self.individuals.len() && attempts < cap {
            if !within(self.individuals[i].position, center, radius) {
                i += 1;
                continue;
            }
            let placement = self.individuals.swap_remove(i);
            self.pending.remove(&placement.id);
            if self.spawned.contains_key(&placement.id) || self.failed.contains(&placement.id) {
                continue;
            }
            attempts += 1;
            records.extend(self.materialize(placement, None, materializer));
        }

        let mut g = 0;
        while g < self.groups.len() && attempts < cap {
            let group = &self.groups[g];
            let in_range = within(group.anchor, center, radius);
            let fits = attempts == 0 || attempts.saturating_add(group.len()) <= cap;
            if !(in_range && fits) {
                g += 1;
                continue;
            }
            let group = self.groups.swap_remove(g);
            attempts += self.materialize_group(group, &mut records, materializer);
        }
        records
    }

    /// Returns the number of members attempted.
    fn materialize_group(
        &mut self,
        group: PlacementGroup,
        records: &mut Vec<SpawnRecord>,
        materializer: &mut impl Materializer,
    ) -> usize {
        tracing::trace!(group = %group.id, members = group.len(), "materializing group");
        let mut attempts = 0;
        for member in group.members {
            self.pending.remove(&member.id);
            if self.spawned.contains_key(&member.id) || self.failed.contains(&member.id) {
                continue;
            }
            attempts += 1;
            records.extend(self.materialize(member, Some(group.id), materializer));
        }
        attempts
    }

    fn materialize(
        &mut self,
        placement: EntityPlacement,
        group: Option<GroupId>,
        materializer: &mut impl Materializer,
    ) -> Option<SpawnRecord> {
        match materializer.materialize(&placement) {
            Ok(entity) => {
                self.spawned.insert(placement.id, entity);
                self.stats.spawned_total += 1;
                Some(SpawnRecord {
                    placement,
                    entity,
                    group,
                })
            }
            Err(err) => {
                tracing::warn!(placement = %placement.id, error = %err, "materialization failed");
                self.failed.insert(placement.id);
                self.stats.failed_total += 1;
                None
            }
        }
    }

    fn settle(&mut self) {
        if self.pending.is_empty() && self.state != QueueState::Drained {
            self.state = QueueState::Drained;
            tracing::info!(
                spawned = self.spawned.len(),
                failed = self.failed.len(),
                "spawn queue drained"
            );
        }
    }

    pub fn is_spawned(&self, id: PlacementId) -> bool {
        self.spawned.contains_key(&id)
    }

    /// Entity created for a placement, if it was materialized.
    pub fn entity_for(&self, id: PlacementId) -> Option<EntityId> {
        self.spawned.get(&id).copied()
    }

    /// Pending placements, counting every group member.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn is_drained(&self) -> bool {
        self.state == QueueState::Drained
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn stats(&self) -> SpawnStats {
        SpawnStats {
            pending_individuals: self.individuals.len(),
            pending_groups: self.groups.len(),
            ..self.stats.clone()
        }
    }
}

/// Inclusive 3D range test. False for NaN distances.
fn within(position: Vec3, center: Vec3, radius: f32) -> bool {
    position.distance(center) <= radius
}
