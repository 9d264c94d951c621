//! Authoritative piece positions.
//!
//! The table owns the piece arena together with the two structures derived
//! from piece transforms: the spatial index and the world-geometry cache.
//! Every mutation refreshes both for the pieces it touched, so they agree with
//! committed positions before control returns to the caller.

use crate::config::SpatialConfig;
use crate::geometry::{Point, Size};
use crate::id::PieceId;
use crate::piece::{Piece, WorldGeometry};
use crate::rng::PuzzleRng;
use jigsaw_spatial::{UniformGrid, scaled_cell_size};
use std::cell::OnceCell;

// ---------------------------------------------------------------------------
// Geometry cache
// ---------------------------------------------------------------------------

/// Lazily computed world geometry, one slot per piece.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    slots: Vec<OnceCell<WorldGeometry>>,
}

impl GeometryCache {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn invalidate(&mut self, id: PieceId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.take();
        }
    }

    pub fn invalidate_all(&mut self) {
        for slot in &mut self.slots {
            slot.take();
        }
    }

    /// Cached geometry for `id`, computing it on first use.
    pub fn get(&self, pieces: &[Piece], id: PieceId) -> Option<WorldGeometry> {
        let piece = pieces.get(id.index())?;
        let slot = self.slots.get(id.index())?;
        Some(*slot.get_or_init(|| piece.world_geometry()))
    }

    pub fn is_cached(&self, id: PieceId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.get().is_some())
    }

    pub fn cached_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Table {
    pieces: Vec<Piece>,
    cols: u32,
    rows: u32,
    index: UniformGrid<PieceId>,
    geometry: GeometryCache,
    next_z: u32,
}

impl Table {
    /// Wrap pieces as they are. The spatial index is sized from the average
    /// scaled frame and filled from current positions; new z values start
    /// above the highest existing one.
    pub fn new(pieces: Vec<Piece>, cols: u32, rows: u32, spatial: &SpatialConfig) -> Self {
        let avg = if pieces.is_empty() {
            0.0
        } else {
            let total: f32 = pieces
                .iter()
                .map(|p| {
                    let frame = p.scaled_frame();
                    (frame.width + frame.height) / 2.0
                })
                .sum();
            total / pieces.len() as f32
        };
        let cell = scaled_cell_size(avg, spatial.cell_size_factor, spatial.min_cell_size);
        let next_z = pieces.iter().map(|p| p.z().saturating_add(1)).max().unwrap_or(0);
        let mut table = Self {
            geometry: GeometryCache::new(pieces.len()),
            index: UniformGrid::new(cell),
            pieces,
            cols,
            rows,
            next_z,
        };
        table.rebuild_index();
        table
    }

    // -- Queries --

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub(crate) fn pieces_mut(&mut self) -> &mut [Piece] {
        &mut self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id.index())
    }

    pub fn contains(&self, id: PieceId) -> bool {
        id.index() < self.pieces.len()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn index(&self) -> &UniformGrid<PieceId> {
        &self.index
    }

    pub fn geometry_cache(&self) -> &GeometryCache {
        &self.geometry
    }

    /// World corners and side waypoints, from the cache.
    pub fn world_geometry(&self, id: PieceId) -> Option<WorldGeometry> {
        self.geometry.get(&self.pieces, id)
    }

    /// On-screen size of a piece's element: its frame times the scale.
    pub fn element_bounds(&self, id: PieceId) -> Option<Size> {
        self.piece(id).map(Piece::scaled_frame)
    }

    /// The z value the next [`Table::bring_to_front`] will assign.
    pub fn next_z(&self) -> u32 {
        self.next_z
    }

    // -- Mutations --

    fn refresh(&mut self, id: PieceId) {
        self.geometry.invalidate(id);
        let position = self.pieces[id.index()].position().as_tuple();
        self.index.update(id, position);
    }

    /// Clear and refill the spatial index and drop all cached geometry.
    pub fn rebuild_index(&mut self) {
        self.geometry.invalidate_all();
        self.index
            .rebuild(self.pieces.iter().map(|p| (p.id(), p.position().as_tuple())));
    }

    pub fn move_piece(&mut self, id: PieceId, delta: Point) -> bool {
        let Some(piece) = self.pieces.get_mut(id.index()) else {
            return false;
        };
        let position = piece.position() + delta;
        piece.set_position(position);
        self.refresh(id);
        true
    }

    /// Translate every member by `delta`. Nothing moves unless every id is known.
    pub fn move_group(&mut self, members: &[PieceId], delta: Point) -> bool {
        if !members.iter().all(|&id| self.contains(id)) {
            return false;
        }
        for &id in members {
            self.move_piece(id, delta);
        }
        true
    }

    /// Turn a piece in place about its own center.
    pub fn rotate_piece(&mut self, id: PieceId, angle: f32) -> bool {
        let Some(piece) = self.pieces.get_mut(id.index()) else {
            return false;
        };
        let rotation = piece.rotation() + angle;
        piece.set_rotation(rotation);
        self.refresh(id);
        true
    }

    /// Rigidly rotate members about the center of `pivot`: each member turns
    /// by `angle` and its position revolves around the pivot by the same angle.
    pub fn rotate_group(&mut self, members: &[PieceId], angle: f32, pivot: PieceId) -> bool {
        let Some(center) = self.piece(pivot).map(Piece::position) else {
            return false;
        };
        if !members.iter().all(|&id| self.contains(id)) {
            return false;
        }
        for &id in members {
            let piece = &mut self.pieces[id.index()];
            let position = piece.position().rotated_about(center, angle);
            let rotation = piece.rotation() + angle;
            piece.set_position(position);
            piece.set_rotation(rotation);
            self.refresh(id);
        }
        true
    }

    pub fn set_transform(&mut self, id: PieceId, position: Point, rotation: f32) -> bool {
        let Some(piece) = self.pieces.get_mut(id.index()) else {
            return false;
        };
        piece.set_position(position);
        piece.set_rotation(rotation);
        self.refresh(id);
        true
    }

    /// Put members above everything else, sharing one new z value.
    /// Returns the assigned z, or `None` if any id is unknown.
    pub fn bring_to_front(&mut self, members: &[PieceId]) -> Option<u32> {
        if members.is_empty() || !members.iter().all(|&id| self.contains(id)) {
            return None;
        }
        let z = self.next_z;
        self.next_z = self.next_z.saturating_add(1);
        for &id in members {
            self.pieces[id.index()].set_z(z);
        }
        Some(z)
    }

    /// Place every piece at a random spot inside `area`, keeping each frame
    /// fully inside when the area allows it, and stack them in id order.
    pub fn scatter(&mut self, rng: &mut PuzzleRng, area: Size) {
        for (z, piece) in self.pieces.iter_mut().enumerate() {
            let half = piece.scaled_frame().center();
            let x = spread(rng, half.x, area.width - half.x);
            let y = spread(rng, half.y, area.height - half.y);
            piece.set_position(Point::new(x, y));
            piece.set_z(z as u32);
        }
        self.next_z = self.pieces.len() as u32;
        self.rebuild_index();
        log::debug!(
            "scattered {} pieces over {}x{}",
            self.pieces.len(),
            area.width,
            area.height
        );
    }

    /// Pieces in painter's order: lowest z first, ties by id.
    pub fn paint_order(&self) -> Vec<PieceId> {
        let mut order: Vec<&Piece> = self.pieces.iter().collect();
        order.sort_by_key(|p| (p.z(), p.id()));
        order.into_iter().map(Piece::id).collect()
    }
}

fn spread(rng: &mut PuzzleRng, min: f32, max: f32) -> f32 {
    if max > min { rng.range(min, max) } else { (min + max) / 2.0 }
}
