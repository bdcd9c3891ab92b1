//! Counters exposed for external tuning. Nothing in this crate reads them
//! back to make decisions.

use std::fmt;
use std::time::Duration;

/// LOD scheduler statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub registered: usize,
    pub updated_last_pass: usize,
    pub pruned_last_pass: usize,
    pub last_pass_duration: Duration,
    pub live_cells: usize,
    pub passes: u64,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LOD: registered={} updated={} pruned={} cells={} passes={} last_pass={:?}",
            self.registered,
            self.updated_last_pass,
            self.pruned_last_pass,
            self.live_cells,
            self.passes,
            self.last_pass_duration
        )
    }
}

/// Deferred spawn queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnStats {
    pub pending_individuals: usize,
    pub pending_groups: usize,
    pub spawned_total: usize,
    pub spawned_last_tick: usize,
    pub failed_total: usize,
    pub last_tick_duration: Duration,
    pub ticks: u64,
}

impl fmt::Display for SpawnStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Spawn: pending={}+{} groups spawned={} (last tick {}) failed={} ticks={} last_tick={:?}",
            self.pending_individuals,
            self.pending_groups,
            self.spawned_total,
            self.spawned_last_tick,
            self.failed_total,
            self.ticks,
            self.last_tick_duration
        )
    }
}

/// Rolling window of pass durations.
#[derive(Debug, Clone)]
pub struct PassTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl PassTimer {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn samples(&self) -> &[Duration] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> Duration {
        let samples = self.samples();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.samples().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        if self.filled { self.capacity } else { self.index }
    }
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::new(64)
    }
}
