use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use proxim_common::{
    EntityId, EntityPlacement, ManagedObject, PlacementId, PlacementKind, PlacementMeta, Tier, Transform,
};

/// Live entities are shared with the systems that observe them (the LOD
/// scheduler keeps a weak reference).
pub type SharedEntity = Rc<RefCell<LiveEntity>>;

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// A placement was turned into a live entity.
    Materialized {
        id: EntityId,
        placement: PlacementId,
        type_tag: String,
    },
    /// Entity was removed from the world.
    Despawned { id: EntityId, placement: PlacementId },
    /// Simulation advanced one tick.
    Stepped { tick: u64 },
}

/// A materialized entity.
#[derive(Debug, Clone)]
pub struct LiveEntity {
    id: EntityId,
    placement: PlacementId,
    kind: PlacementKind,
    type_tag: String,
    transform: Transform,
    meta: PlacementMeta,
    tier: Tier,
    alive: bool,
    tier_changes: u32,
}

impl LiveEntity {
    /// Build the live counterpart of a placement. Starts at full detail.
    pub fn from_placement(id: EntityId, placement: &EntityPlacement) -> Self {
        Self {
            id,
            placement: placement.id,
            kind: placement.kind,
            type_tag: placement.type_tag.clone(),
            transform: placement.transform(),
            meta: placement.meta,
            tier: Tier::FULL,
            alive: true,
            tier_changes: 0,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn placement(&self) -> PlacementId {
        self.placement
    }

    pub fn kind(&self) -> PlacementKind {
        self.kind
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn meta(&self) -> &PlacementMeta {
        &self.meta
    }

    /// Number of tier notifications received so far.
    pub fn tier_changes(&self) -> u32 {
        self.tier_changes
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn move_to(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Mark the entity destroyed. Schedulers drop it on their next pass.
    pub fn invalidate(&mut self) {
        self.alive = false;
    }
}

impl ManagedObject for LiveEntity {
    fn position(&self) -> Vec3 {
        self.transform.position
    }

    fn tier(&self) -> Tier {
        self.tier
    }

    fn set_tier(&mut self, tier: Tier) {
        tracing::trace!(placement = %self.placement, from = %self.tier, to = %tier, "tier change");
        self.tier = tier;
        self.tier_changes += 1;
    }

    fn is_valid(&self) -> bool {
        self.alive
    }
}

/// The live world.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Default)]
pub struct World {
    entities: BTreeMap<EntityId, SharedEntity>,
    tick: u64,
    /// Append-only event log of all mutations.
    event_log: Vec<WorldEvent>,
}

impl World {
    /// Create an empty world at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Read-only access to all entities in id order.
    pub fn entities(&self) -> &BTreeMap<EntityId, SharedEntity> {
        &self.entities
    }

    pub fn get(&self, id: EntityId) -> Option<&SharedEntity> {
        self.entities.get(&id)
    }

    /// Turn a placement into a live entity. Returns its id.
    ///
    /// The world does not deduplicate placements; at-most-once
    /// materialization is the spawn queue's job.
    pub fn spawn_placement(&mut self, placement: &EntityPlacement) -> EntityId {
        let id = EntityId::new();
        let entity = LiveEntity::from_placement(id, placement);
        self.entities.insert(id, Rc::new(RefCell::new(entity)));
        self.event_log.push(WorldEvent::Materialized {
            id,
            placement: placement.id,
            type_tag: placement.type_tag.clone(),
        });
        tracing::debug!(placement = %placement.id, kind = %placement.type_tag, "materialized");
        id
    }

    /// Remove an entity and invalidate it. Returns it if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<SharedEntity> {
        let entity = self.entities.remove(&id)?;
        let placement = {
            let mut inner = entity.borrow_mut();
            inner.invalidate();
            inner.placement()
        };
        self.event_log.push(WorldEvent::Despawned { id, placement });
        Some(entity)
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.event_log.push(WorldEvent::Stepped { tick: self.tick });
    }

    /// Count live entities of a kind.
    pub fn count_kind(&self, kind: PlacementKind) -> usize {
        self.entities.values().filter(|e| e.borrow().kind() == kind).count()
    }

    /// Number of entities currently at each tier, sorted by tier.
    pub fn tier_histogram(&self) -> BTreeMap<Tier, usize> {
        let mut histogram = BTreeMap::new();
        for entity in self.entities.values() {
            *histogram.entry(entity.borrow().tier()).or_insert(0) += 1;
        }
        histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(id: u64, kind: PlacementKind, x: f32) -> EntityPlacement {
        EntityPlacement::new(PlacementId(id), kind, "skeleton", Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn spawn_placement_copies_metadata() {
        let mut w = World::new();
        let p = placement(3, PlacementKind::Enemy, 12.0).with_meta(PlacementMeta {
            level: 4,
            is_boss: true,
            region: Some(2),
            ..PlacementMeta::default()
        });
        let id = w.spawn_placement(&p);

        let entity = w.get(id).unwrap().borrow();
        assert_eq!(entity.placement(), PlacementId(3));
        assert_eq!(entity.type_tag(), "skeleton");
        assert_eq!(entity.meta().level, 4);
        assert!(entity.meta().is_boss);
        assert_eq!(entity.position(), Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(entity.tier(), Tier::FULL);
        assert!(entity.is_valid());
    }

    #[test]
    fn despawn_invalidates_shared_handles() {
        let mut w = World::new();
        let id = w.spawn_placement(&placement(0, PlacementKind::Prop, 0.0));
        let held = Rc::clone(w.get(id).unwrap());

        let removed = w.despawn(id);
        assert!(removed.is_some());
        assert_eq!(w.entity_count(), 0);
        assert!(!held.borrow().is_valid());
        assert!(w.despawn(id).is_none());
    }

    #[test]
    fn set_tier_counts_changes() {
        let mut w = World::new();
        let id = w.spawn_placement(&placement(0, PlacementKind::Enemy, 0.0));
        let entity = w.get(id).unwrap();
        entity.borrow_mut().set_tier(Tier::Detail(2));
        entity.borrow_mut().set_tier(Tier::Culled);
        assert_eq!(entity.borrow().tier(), Tier::Culled);
        assert_eq!(entity.borrow().tier_changes(), 2);
    }

    #[test]
    fn events_are_recorded() {
        let mut w = World::new();
        let id = w.spawn_placement(&placement(9, PlacementKind::Enemy, 0.0));
        w.step();
        w.despawn(id);
        assert_eq!(w.events().len(), 3);
        assert_eq!(
            w.events()[2],
            WorldEvent::Despawned {
                id,
                placement: PlacementId(9)
            }
        );
    }

    #[test]
    fn drain_events_clears_log() {
        let mut w = World::new();
        w.spawn_placement(&placement(0, PlacementKind::Prop, 0.0));
        let events = w.drain_events();
        assert_eq!(events.len(), 1);
        assert!(w.events().is_empty());
    }

    #[test]
    fn histogram_and_kind_counts() {
        let mut w = World::new();
        let a = w.spawn_placement(&placement(0, PlacementKind::Enemy, 0.0));
        w.spawn_placement(&placement(1, PlacementKind::Enemy, 0.0));
        w.spawn_placement(&placement(2, PlacementKind::Prop, 0.0));
        w.get(a).unwrap().borrow_mut().set_tier(Tier::Culled);

        assert_eq!(w.count_kind(PlacementKind::Enemy), 2);
        assert_eq!(w.count_kind(PlacementKind::Prop), 1);
        let histogram = w.tier_histogram();
        assert_eq!(histogram.get(&Tier::FULL), Some(&2));
        assert_eq!(histogram.get(&Tier::Culled), Some(&1));
    }

    #[test]
    fn btreemap_gives_deterministic_iteration() {
        let mut w = World::new();
        for i in 0..50 {
            w.spawn_placement(&placement(i, PlacementKind::Prop, 0.0));
        }
        let keys: Vec<EntityId> = w.entities().keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
