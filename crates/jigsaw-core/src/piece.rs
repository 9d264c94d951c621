//! The piece record and its local/world geometry.
//!
//! Each piece stores its four corners and up to four side waypoints in
//! piece-local coordinates, measured from the top-left of its padded bitmap
//! frame. World coordinates are derived from the piece's position (the world
//! location of the frame center), rotation and scale.

use crate::geometry::{Point, Size, normalize_angle};
use crate::id::{GroupId, PieceId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sides, corners and edges
// ---------------------------------------------------------------------------

/// One of the four sides of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    /// Grid offset `(dcol, drow)` of the neighbor across this side.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Side::North => (0, -1),
            Side::East => (1, 0),
            Side::South => (0, 1),
            Side::West => (-1, 0),
        }
    }

    /// The corners bounding this side, in clockwise order.
    pub fn corners(self) -> (Corner, Corner) {
        match self {
            Side::North => (Corner::Nw, Corner::Ne),
            Side::East => (Corner::Ne, Corner::Se),
            Side::South => (Corner::Se, Corner::Sw),
            Side::West => (Corner::Sw, Corner::Nw),
        }
    }

    /// For a neighbor across this side, the pairs of corners that coincide
    /// when the two pieces are joined: `(own corner, neighbor corner)`.
    pub fn touching_corners(self) -> [(Corner, Corner); 2] {
        let (a, b) = self.corners();
        let across = |corner: Corner| match self {
            Side::North | Side::South => corner.flipped_vertical(),
            Side::East | Side::West => corner.flipped_horizontal(),
        };
        [(a, across(a)), (b, across(b))]
    }
}

/// One of the four corners of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Corner {
    Nw,
    Ne,
    Se,
    Sw,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::Nw, Corner::Ne, Corner::Se, Corner::Sw];

    pub fn index(self) -> usize {
        self as usize
    }

    fn flipped_vertical(self) -> Corner {
        match self {
            Corner::Nw => Corner::Sw,
            Corner::Ne => Corner::Se,
            Corner::Se => Corner::Ne,
            Corner::Sw => Corner::Nw,
        }
    }

    fn flipped_horizontal(self) -> Corner {
        match self {
            Corner::Nw => Corner::Ne,
            Corner::Ne => Corner::Nw,
            Corner::Se => Corner::Sw,
            Corner::Sw => Corner::Se,
        }
    }
}

/// What a piece edge looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Straight edge on the outside of the puzzle.
    Border,
    /// The waypoint protrudes away from the piece.
    Bump,
    /// The waypoint recedes into the piece.
    Dent,
}

impl EdgeKind {
    pub fn is_interior(self) -> bool {
        !matches!(self, EdgeKind::Border)
    }

    /// A bump fits a dent and vice versa.
    pub fn complements(self, other: EdgeKind) -> bool {
        matches!(
            (self, other),
            (EdgeKind::Bump, EdgeKind::Dent) | (EdgeKind::Dent, EdgeKind::Bump)
        )
    }
}

/// Column/row of a piece in the solved puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub col: u32,
    pub row: u32,
}

impl GridCoord {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// If `other` is exactly one step away along a single axis, the side of
    /// `self` that faces it.
    pub fn side_towards(&self, other: &GridCoord) -> Option<Side> {
        let dc = i64::from(other.col) - i64::from(self.col);
        let dr = i64::from(other.row) - i64::from(self.row);
        Side::ALL.into_iter().find(|side| side.offset() == (dc, dr))
    }

    pub fn is_adjacent(&self, other: &GridCoord) -> bool {
        self.side_towards(other).is_some()
    }

    /// The grid coordinate across `side`, if it is inside a `cols x rows` grid.
    pub fn neighbor(&self, side: Side, cols: u32, rows: u32) -> Option<GridCoord> {
        let (dc, dr) = side.offset();
        let col = i64::from(self.col) + dc;
        let row = i64::from(self.row) + dr;
        if col < 0 || row < 0 || col >= i64::from(cols) || row >= i64::from(rows) {
            return None;
        }
        Some(GridCoord::new(col as u32, row as u32))
    }
}

// ---------------------------------------------------------------------------
// World geometry
// ---------------------------------------------------------------------------

/// A piece's corners and side waypoints in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldGeometry {
    pub center: Point,
    pub corners: [Point; 4],
    pub sides: [Option<Point>; 4],
}

impl WorldGeometry {
    pub fn corner(&self, corner: Corner) -> Point {
        self.corners[corner.index()]
    }

    /// `[start corner, waypoint, end corner]` for an interior side.
    pub fn side_waypoints(&self, side: Side) -> Option<[Point; 3]> {
        let waypoint = self.sides[side.index()]?;
        let (start, end) = side.corners();
        Some([self.corner(start), waypoint, self.corner(end)])
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A puzzle piece. Structural fields are fixed at generation; transform,
/// z-order and group membership change during play.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    id: PieceId,
    grid: GridCoord,
    corners: [Point; 4],
    sides: [Option<Point>; 4],
    edges: [EdgeKind; 4],
    frame: Size,
    path: Vec<Point>,
    rotation: f32,
    position: Point,
    scale: f32,
    z: u32,
    group: GroupId,
}

impl Piece {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: PieceId,
        grid: GridCoord,
        corners: [Point; 4],
        sides: [Option<Point>; 4],
        edges: [EdgeKind; 4],
        frame: Size,
        path: Vec<Point>,
        rotation: f32,
        scale: f32,
    ) -> Self {
        Self {
            id,
            grid,
            corners,
            sides,
            edges,
            frame,
            path,
            rotation: normalize_angle(rotation),
            position: Point::ZERO,
            scale,
            z: 0,
            group: GroupId(id.0),
        }
    }

    // -- Structure --

    pub fn id(&self) -> PieceId {
        self.id
    }

    pub fn grid(&self) -> GridCoord {
        self.grid
    }

    pub fn local_corner(&self, corner: Corner) -> Point {
        self.corners[corner.index()]
    }

    /// Local side waypoint, `None` on the puzzle's outer border.
    pub fn local_side(&self, side: Side) -> Option<Point> {
        self.sides[side.index()]
    }

    pub fn edge(&self, side: Side) -> EdgeKind {
        self.edges[side.index()]
    }

    /// Size of the padded bitmap frame, unscaled.
    pub fn frame(&self) -> Size {
        self.frame
    }

    /// Frame size after applying the session scale.
    pub fn scaled_frame(&self) -> Size {
        self.frame.scaled(self.scale)
    }

    /// Closed boundary polyline in local coordinates.
    pub fn path(&self) -> &[Point] {
        &self.path
    }

    // -- State --

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// World position of the frame center.
    pub fn position(&self) -> Point {
        self.position
    }

    /// World position of the unrotated frame's top-left, for renderers that
    /// place elements by their corner.
    pub fn top_left(&self) -> Point {
        self.position - self.scaled_frame().center()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn z(&self) -> u32 {
        self.z
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub(crate) fn set_rotation(&mut self, rotation: f32) {
        self.rotation = normalize_angle(rotation);
    }

    pub(crate) fn set_z(&mut self, z: u32) {
        self.z = z;
    }

    /// Only the group manager writes this.
    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = group;
    }

    // -- World transform --

    /// Map a local point into world space.
    pub fn world_point(&self, local: Point) -> Point {
        self.position + ((local - self.frame.center()) * self.scale).rotated(self.rotation)
    }

    pub fn world_geometry(&self) -> WorldGeometry {
        WorldGeometry {
            center: self.position,
            corners: self.corners.map(|c| self.world_point(c)),
            sides: self.sides.map(|s| s.map(|p| self.world_point(p))),
        }
    }
}
