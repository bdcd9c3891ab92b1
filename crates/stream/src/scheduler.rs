use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use glam::Vec3;
use proxim_common::ManagedObject;

use crate::config::{ConfigError, DiscontinuityPolicy, LodConfig, LodSettings};
use crate::diagnostics::{PassTimer, SchedulerStats};
use crate::grid::SpatialIndex;
use crate::observer::{self, ObserverSource};

/// A registered object as handed back to callers.
pub type SharedObject = Rc<RefCell<dyn ManagedObject>>;

type WeakObject = Weak<RefCell<dyn ManagedObject>>;

/// Stable reference to a registered object.
///
/// Slots are reused after unregistration; the generation makes stale handles
/// resolve to nothing instead of to the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Entry {
    object: WeakObject,
    /// Address of the shared allocation. The weak reference keeps the
    /// allocation alive, so the address cannot be reused while registered.
    identity: usize,
    /// Position in `order`.
    order: usize,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Evaluating,
}

/// Gate state, mutated only inside [`LodScheduler::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerState {
    /// Observer position at the last evaluation pass.
    pub last_observer: Option<Vec3>,
    /// Time accumulated since the last evaluation pass.
    pub elapsed: Duration,
    pub movement_threshold: f32,
    pub phase: Phase,
    /// Set by [`LodScheduler::force_evaluate`]; cleared by the next pass.
    pub force_pending: bool,
}

/// What a call to [`LodScheduler::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The interval has not elapsed since the last pass.
    Waiting,
    /// The interval elapsed but the observer has not moved far enough.
    Stationary,
    /// No usable observer position; nothing was evaluated.
    NoObserver,
    Evaluated { updated: usize, pruned: usize },
}

/// Periodically reclassifies registered objects relative to an observer.
///
/// Owns the registered set and the spatial index; both are mutated only
/// through these methods. Objects are held weakly: dropping the last strong
/// reference elsewhere counts as destruction.
#[derive(Debug)]
pub struct LodScheduler {
    settings: LodSettings,
    index: SpatialIndex<ObjectHandle>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Registered handles in pass iteration order.
    order: Vec<ObjectHandle>,
    identities: HashMap<usize, ObjectHandle>,
    state: SchedulerState,
    stats: SchedulerStats,
    timer: PassTimer,
}

impl LodScheduler {
    pub fn new(config: &LodConfig) -> Result<Self, ConfigError> {
        Self::with_settings(config.validate()?)
    }

    pub fn with_settings(settings: LodSettings) -> Result<Self, ConfigError> {
        let index = SpatialIndex::new(settings.cell_size)?;
        let state = SchedulerState {
            last_observer: None,
            elapsed: Duration::ZERO,
            movement_threshold: settings.movement_threshold,
            phase: Phase::Idle,
            force_pending: false,
        };
        Ok(Self {
            settings,
            index,
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            identities: HashMap::new(),
            state,
            stats: SchedulerStats::default(),
            timer: PassTimer::default(),
        })
    }

    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Number of registered objects, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Register a shared object. Registering the same allocation again
    /// returns the existing handle.
    pub fn register<T: ManagedObject + 'static>(&mut self, object: &Rc<RefCell<T>>) -> ObjectHandle {
        let weak: Weak<RefCell<T>> = Rc::downgrade(object);
        self.register_weak(identity_of(object), weak)
    }

    /// [`register`](Self::register) for already type-erased objects.
    pub fn register_shared(&mut self, object: &SharedObject) -> ObjectHandle {
        self.register_weak(identity_of(object), Rc::downgrade(object))
    }

    fn register_weak(&mut self, identity: usize, object: WeakObject) -> ObjectHandle {
        if let Some(&handle) = self.identities.get(&identity) {
            return handle;
        }
        let position = object
            .upgrade()
            .and_then(|o| o.try_borrow().ok().map(|o| o.position()))
            .filter(|p| p.is_finite());

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = ObjectHandle {
            index,
            generation: slot.generation,
        };
        slot.entry = Some(Entry {
            object,
            identity,
            order: self.order.len(),
        });
        self.order.push(handle);
        self.identities.insert(identity, handle);
        if let Some(position) = position {
            self.index.insert(handle, position);
        }
        tracing::trace!(?handle, "registered");
        handle
    }

    /// Unregister by object. Safe for objects that were never registered.
    pub fn unregister<T: ManagedObject + ?Sized>(&mut self, object: &Rc<RefCell<T>>) -> bool {
        match self.identities.get(&identity_of(object)).copied() {
            Some(handle) => self.unregister_handle(handle),
            None => false,
        }
    }

    /// Unregister by handle. Stale handles are ignored.
    pub fn unregister_handle(&mut self, handle: ObjectHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(entry) = slot.entry.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.identities.remove(&entry.identity);
        self.index.remove(handle);

        self.order.swap_remove(entry.order);
        if let Some(&moved) = self.order.get(entry.order) {
            if let Some(moved_entry) = self.slots[moved.index as usize].entry.as_mut() {
                moved_entry.order = entry.order;
            }
        }
        true
    }

    pub fn is_registered<T: ManagedObject + ?Sized>(&self, object: &Rc<RefCell<T>>) -> bool {
        self.identities.contains_key(&identity_of(object))
    }

    fn entry(&self, handle: ObjectHandle) -> Option<&Entry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Upgrade a handle to its object, if it is registered and still alive.
    pub fn resolve(&self, handle: ObjectHandle) -> Option<SharedObject> {
        self.entry(handle)?.object.upgrade()
    }

    /// Handles in the cells within `cell_radius` of `position`'s cell.
    ///
    /// Unfiltered: results can lie farther than `cell_radius * cell_size`,
    /// and positions are as of the last pass or registration.
    pub fn query_near(&self, position: Vec3, cell_radius: u32) -> Vec<ObjectHandle> {
        self.index.query_near(position, cell_radius)
    }

    /// [`query_near`](Self::query_near), resolved to live objects.
    pub fn neighbors(&self, position: Vec3, cell_radius: u32) -> Vec<SharedObject> {
        self.query_near(position, cell_radius)
            .into_iter()
            .filter_map(|handle| self.resolve(handle))
            .collect()
    }

    /// Run a pass on the next [`update`](Self::update) regardless of the
    /// interval and movement gate. Used after teleports and level loads.
    pub fn force_evaluate(&mut self) {
        self.state.force_pending = true;
    }

    /// Advance the gate by `dt` and evaluate if it opens.
    pub fn update(&mut self, dt: Duration, observer: &impl ObserverSource) -> PassOutcome {
        self.state.elapsed = self.state.elapsed.saturating_add(dt);
        let Some(observer) = observer::sample(observer) else {
            tracing::trace!("observer unavailable, skipping lod pass");
            return PassOutcome::NoObserver;
        };
        if !self.state.force_pending {
            if let Some(closed) = self.gate(observer) {
                return closed;
            }
        }
        self.evaluate(observer)
    }

    /// `None` when a pass should run, otherwise the reason it should not.
    fn gate(&self, observer: Vec3) -> Option<PassOutcome> {
        let moved = self.state.last_observer.map(|last| last.distance(observer));
        if let (Some(limit), Some(moved)) = (self.settings.teleport_distance, moved) {
            if moved > limit {
                tracing::debug!(moved, limit, "observer discontinuity, evaluating early");
                return None;
            }
        }
        if self.state.elapsed < self.settings.interval {
            return Some(PassOutcome::Waiting);
        }
        match moved {
            Some(moved) if moved <= self.state.movement_threshold => Some(PassOutcome::Stationary),
            _ => None,
        }
    }

    fn evaluate(&mut self, observer: Vec3) -> PassOutcome {
        let _span = tracing::debug_span!("lod_pass", registered = self.order.len()).entered();
        let started = Instant::now();
        self.state.phase = Phase::Evaluating;

        let pruned = self.prune();
        let mut updated = 0;
        for i in 0..self.order.len() {
            let handle = self.order[i];
            let Some(object) = self.resolve(handle) else {
                continue;
            };
            let Ok(mut object) = object.try_borrow_mut() else {
                tracing::trace!(?handle, "object busy, skipped this pass");
                continue;
            };
            let position = object.position();
            if !position.is_finite() {
                continue;
            }
            self.index.relocate(handle, position);

            let current = object.tier();
            let tier = self.settings.thresholds.classify(position.distance(observer));
            if tier == current {
                continue;
            }
            match self.settings.discontinuity {
                DiscontinuityPolicy::Jump => object.set_tier(tier),
                DiscontinuityPolicy::Traverse => {
                    let steps = self.settings.thresholds.path(current, tier);
                    if steps.last() != Some(&tier) {
                        object.set_tier(tier);
                    } else {
                        for step in steps {
                            object.set_tier(step);
                        }
                    }
                }
            }
            updated += 1;
        }

        let elapsed = started.elapsed();
        self.timer.record(elapsed);
        self.state.last_observer = Some(observer);
        self.state.elapsed = Duration::ZERO;
        self.state.force_pending = false;
        self.state.phase = Phase::Idle;
        self.stats = SchedulerStats {
            registered: self.order.len(),
            updated_last_pass: updated,
            pruned_last_pass: pruned,
            last_pass_duration: elapsed,
            live_cells: self.index.cell_count(),
            passes: self.stats.passes + 1,
        };
        tracing::debug!(updated, pruned, duration = ?elapsed, "lod pass complete");
        PassOutcome::Evaluated { updated, pruned }
    }

    /// Drop objects that were destroyed or report themselves invalid.
    /// Objects borrowed elsewhere are left for the next pass.
    fn prune(&mut self) -> usize {
        let dead: Vec<ObjectHandle> = self
            .order
            .iter()
            .copied()
            .filter(|&handle| match self.resolve(handle) {
                None => true,
                Some(object) => object.try_borrow().map(|o| !o.is_valid()).unwrap_or(false),
            })
            .collect();
        for &handle in &dead {
            self.unregister_handle(handle);
        }
        dead.len()
    }

    /// Current diagnostics. `registered` and `live_cells` are live values;
    /// the rest describe the last pass.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            registered: self.order.len(),
            live_cells: self.index.cell_count(),
            ..self.stats.clone()
        }
    }

    pub fn pass_timer(&self) -> &PassTimer {
        &self.timer
    }
}

fn identity_of<T: ?Sized>(object: &Rc<RefCell<T>>) -> usize {
    Rc::as_ptr(object).cast::<()>() as usize
}
