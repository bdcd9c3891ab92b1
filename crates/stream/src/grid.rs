use std::collections::HashMap;
use std::hash::Hash;

use glam::Vec3;

use crate::config::{ConfigError, positive};

/// A 2D cell coordinate in the world grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub x: i32,
    pub z: i32,
}

impl GridCell {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Max of the per-axis differences.
    pub fn chebyshev(self, other: GridCell) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }
}

/// Uniform grid over the XZ plane mapping cells to the handles inside them.
///
/// Each handle lives in exactly one bucket: the cell computed at its last
/// `insert`/`relocate`. Buckets are removed when their last handle leaves.
#[derive(Debug, Clone)]
pub struct SpatialIndex<H> {
    cell_size: f32,
    cells: HashMap<GridCell, Vec<H>>,
    locations: HashMap<H, GridCell>,
}

impl<H: Copy + Eq + Hash> SpatialIndex<H> {
    /// Create an empty index. `cell_size` must be positive and finite.
    pub fn new(cell_size: f32) -> Result<Self, ConfigError> {
        Ok(Self {
            cell_size: positive("cell_size", cell_size)?,
            cells: HashMap::new(),
            locations: HashMap::new(),
        })
    }

    /// Cell size used for this index.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn cell_of(&self, pos: Vec3) -> GridCell {
        GridCell {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    /// Add `handle` at `pos`. An already indexed handle is moved instead.
    pub fn insert(&mut self, handle: H, pos: Vec3) -> GridCell {
        let cell = self.cell_of(pos);
        match self.locations.insert(handle, cell) {
            Some(previous) if previous == cell => {}
            Some(previous) => {
                self.detach(handle, previous);
                self.cells.entry(cell).or_default().push(handle);
            }
            None => self.cells.entry(cell).or_default().push(handle),
        }
        cell
    }

    /// Remove `handle`. Returns the cell it was recorded in, if any.
    pub fn remove(&mut self, handle: H) -> Option<GridCell> {
        let cell = self.locations.remove(&handle)?;
        self.detach(handle, cell);
        Some(cell)
    }

    /// Recompute the cell for `handle`. Buckets are only touched when the
    /// cell changed; returns whether it did.
    pub fn relocate(&mut self, handle: H, pos: Vec3) -> bool {
        if self.locations.get(&handle) == Some(&self.cell_of(pos)) {
            return false;
        }
        self.insert(handle, pos);
        true
    }

    fn detach(&mut self, handle: H, cell: GridCell) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(i) = bucket.iter().position(|h| *h == handle) {
                bucket.swap_remove(i);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Union of the buckets within Chebyshev distance `cell_radius` of the
    /// cell containing `pos`.
    ///
    /// This is a superset of the handles within `cell_radius * cell_size`
    /// world units; callers needing exact distances must filter.
    pub fn query_near(&self, pos: Vec3, cell_radius: u32) -> Vec<H> {
        let center = self.cell_of(pos);
        let mut result = Vec::new();

        let span = 2 * u64::from(cell_radius) + 1;
        if span.saturating_mul(span) > self.cells.len() as u64 {
            // Fewer live cells than cells in the window: walk the buckets.
            for (cell, bucket) in &self.cells {
                if cell.chebyshev(center) <= cell_radius {
                    result.extend_from_slice(bucket);
                }
            }
            return result;
        }

        // span^2 <= cells.len(), so the radius fits comfortably in i32.
        let radius = cell_radius as i32;
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let (Some(x), Some(z)) = (center.x.checked_add(dx), center.z.checked_add(dz)) else {
                    continue;
                };
                if let Some(bucket) = self.cells.get(&GridCell::new(x, z)) {
                    result.extend_from_slice(bucket);
                }
            }
        }
        result
    }

    /// Handles recorded in a single cell.
    pub fn bucket(&self, cell: GridCell) -> &[H] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cell recorded for `handle` at its last update.
    pub fn cell_for(&self, handle: H) -> Option<GridCell> {
        self.locations.get(&handle).copied()
    }

    pub fn contains(&self, handle: H) -> bool {
        self.locations.contains_key(&handle)
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of indexed handles.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
