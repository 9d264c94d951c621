//! Uniform-grid spatial index for puzzle pieces on the table.
//!
//! World space is divided into square cells of a fixed size. Every item lives
//! in exactly one cell (the cell its last registered position maps to), which
//! gives O(1) amortized insert/update/remove and radius queries whose cost is
//! proportional to the number of cells they touch.
//!
//! The index is generic over the id type so it does not depend on the piece
//! model; `jigsaw-core` instantiates it as `UniformGrid<PieceId>`.
//!
//! # Cell math
//!
//! Cells are computed with `floor`, never truncation, so negative coordinates
//! land in negative cells:
//!
//! ```
//! use jigsaw_spatial::{CellCoord, UniformGrid};
//!
//! let grid: UniformGrid<u32> = UniformGrid::new(100.0);
//! assert_eq!(grid.cell_for(-1.0, 250.0), CellCoord::new(-1, 2));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Multiplier applied to the average piece size to get the cell size.
pub const CELL_SIZE_FACTOR: f32 = 2.5;

/// Smallest cell size the index will use, in world units.
pub const MIN_CELL_SIZE: f32 = 80.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell of the uniform grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub col: i32,
    pub row: i32,
}

impl CellCoord {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Chebyshev (chessboard) distance to another cell.
    pub fn chebyshev_distance(&self, other: &CellCoord) -> u32 {
        (self.col - other.col)
            .unsigned_abs()
            .max((self.row - other.row).unsigned_abs())
    }
}

/// Errors from spatial index construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("cell size must be finite and positive, got {0}")]
    InvalidCellSize(f32),
}

/// Cell size for a given average piece size: `round(avg * 2.5)`, never below
/// [`MIN_CELL_SIZE`].
pub fn cell_size_for(avg_piece_size: f32) -> f32 {
    scaled_cell_size(avg_piece_size, CELL_SIZE_FACTOR, MIN_CELL_SIZE)
}

/// `round(avg_piece_size * factor)`, never below `min_cell_size`.
pub fn scaled_cell_size(avg_piece_size: f32, factor: f32, min_cell_size: f32) -> f32 {
    let size = (avg_piece_size * factor).round();
    if size.is_finite() {
        size.max(min_cell_size)
    } else {
        min_cell_size
    }
}

// ---------------------------------------------------------------------------
// UniformGrid
// ---------------------------------------------------------------------------

/// A uniform grid mapping world positions to item ids.
///
/// Maintains a bidirectional mapping:
/// - `entries`: id -> cell it currently occupies
/// - `cells`: cell -> ids occupying it (never empty; empty cells are dropped)
#[derive(Debug, Clone)]
pub struct UniformGrid<K> {
    cell_size: f32,
    entries: HashMap<K, CellCoord>,
    cells: HashMap<CellCoord, HashSet<K>>,
}

impl<K> UniformGrid<K>
where
    K: Copy + Eq + Hash + Ord,
{
    /// Create an empty grid. A non-finite or non-positive cell size falls
    /// back to [`MIN_CELL_SIZE`].
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            MIN_CELL_SIZE
        };
        Self {
            cell_size,
            entries: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    /// Create an empty grid, rejecting unusable cell sizes.
    pub fn try_new(cell_size: f32) -> Result<Self, SpatialError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SpatialError::InvalidCellSize(cell_size));
        }
        Ok(Self::new(cell_size))
    }

    /// Create an empty grid sized for pieces of the given average size.
    pub fn for_piece_size(avg_piece_size: f32) -> Self {
        Self::new(cell_size_for(avg_piece_size))
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// The cell containing a world position.
    pub fn cell_for(&self, x: f32, y: f32) -> CellCoord {
        CellCoord::new(
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    // -- Mutation --

    /// Register an item at a position. Inserting an id that is already
    /// present behaves like [`UniformGrid::update`].
    pub fn insert(&mut self, id: K, position: (f32, f32)) -> CellCoord {
        self.update(id, position);
        self.entries[&id]
    }

    /// Move an item to a new position. Returns `true` if it changed cell
    /// (or was not registered before).
    pub fn update(&mut self, id: K, position: (f32, f32)) -> bool {
        let cell = self.cell_for(position.0, position.1);
        match self.entries.get(&id).copied() {
            Some(old) if old == cell => false,
            Some(old) => {
                self.detach_from_cell(id, old);
                self.attach(id, cell);
                true
            }
            None => {
                self.attach(id, cell);
                true
            }
        }
    }

    /// Remove an item. Removing an unknown id is a no-op returning `None`.
    pub fn remove(&mut self, id: K) -> Option<CellCoord> {
        let cell = self.entries.remove(&id)?;
        self.detach_from_cell(id, cell);
        Some(cell)
    }

    /// Clear all state and register every item in one pass.
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = (K, (f32, f32))>) {
        self.clear();
        for (id, position) in items {
            self.update(id, position);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cells.clear();
    }

    fn attach(&mut self, id: K, cell: CellCoord) {
        self.entries.insert(id, cell);
        self.cells.entry(cell).or_default().insert(id);
    }

    fn detach_from_cell(&mut self, id: K, cell: CellCoord) {
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.remove(&id);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    // -- Queries --

    /// All items in the cells overlapping the square of half-size `radius`
    /// around `center`. The cell containing `center` is always included.
    ///
    /// This is a coarse filter: callers do their own exact distance checks.
    /// The result is deduplicated and sorted.
    pub fn query_radius(&self, center: (f32, f32), radius: f32) -> Vec<K> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let min = self.cell_for(center.0 - radius, center.1 - radius);
        let max = self.cell_for(center.0 + radius, center.1 + radius);

        let mut found = BTreeSet::new();
        let span_cols = i64::from(max.col) - i64::from(min.col) + 1;
        let span_rows = i64::from(max.row) - i64::from(min.row) + 1;
        if span_cols.saturating_mul(span_rows) > self.cells.len() as i64 {
            // Fewer occupied cells than cells in range: scan the occupied ones.
            for (cell, ids) in &self.cells {
                if (min.col..=max.col).contains(&cell.col)
                    && (min.row..=max.row).contains(&cell.row)
                {
                    found.extend(ids.iter().copied());
                }
            }
        } else {
            for row in min.row..=max.row {
                for col in min.col..=max.col {
                    if let Some(ids) = self.cells.get(&CellCoord::new(col, row)) {
                        found.extend(ids.iter().copied());
                    }
                }
            }
        }
        found.into_iter().collect()
    }

    /// Items registered in a single cell, sorted.
    pub fn items_in_cell(&self, cell: CellCoord) -> Vec<K> {
        let mut ids: Vec<K> = self
            .cells
            .get(&cell)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// The cell an item is currently registered in.
    pub fn cell_of(&self, id: K) -> Option<CellCoord> {
        self.entries.get(&id).copied()
    }

    pub fn contains(&self, id: K) -> bool {
        self.entries.contains_key(&id)
    }

    // -- Stats --

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
