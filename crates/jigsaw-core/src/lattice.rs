//! Puzzle generation: grid sizing, the shared corner/waypoint lattice, and
//! per-piece geometry.
//!
//! Every interior edge of the grid gets one displaced waypoint. The waypoint
//! is shared by the two pieces on either side of the edge, so their
//! silhouettes interlock exactly: the piece the waypoint bulges away from
//! sees a bump, the other one a dent.
//!
//! All randomness comes from a seeded [`PuzzleRng`], so a [`PuzzleSpec`] is
//! enough to regenerate identical geometry after a restore.

use crate::geometry::{Point, Size};
use crate::id::PieceId;
use crate::piece::{EdgeKind, GridCoord, Piece, Side};
use crate::rng::PuzzleRng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_GRID_DIM: u32 = 2;
pub const MAX_PIECE_COUNT: u32 = 10_000;

/// Max shift of a waypoint along its edge, as a fraction of the edge length.
pub const WAYPOINT_SHIFT_RATIO: f32 = 0.25;
/// Displacement depth range, as fractions of the shorter piece dimension.
pub const MIN_DEPTH_RATIO: f32 = 0.10;
pub const MAX_DEPTH_RATIO: f32 = 0.18;
/// Dent depth caps.
pub const DENT_DEPTH_CAP_RATIO: f32 = 0.25;
pub const DENT_EDGE_CAP_RATIO: f32 = 0.5;
/// How far the polarity coin is tilted toward the under-represented sign.
pub const POLARITY_BIAS: f32 = 0.25;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Structural description of a puzzle. Everything needed to regenerate its
/// geometry; persisted alongside piece states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleSpec {
    /// Source image size in world units.
    pub image: Size,
    pub target_count: u32,
    pub seed: u64,
    pub rotation_enabled: bool,
    /// Rendering multiplier applied to every piece.
    pub scale: f32,
}

impl PuzzleSpec {
    pub fn new(width: f32, height: f32, target_count: u32, seed: u64) -> Self {
        Self {
            image: Size::new(width, height),
            target_count,
            seed,
            rotation_enabled: true,
            scale: 1.0,
        }
    }
}

/// Grid dimensions chosen for a target count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub cols: u32,
    pub rows: u32,
    pub actual_count: u32,
}

/// Result of [`generate`].
#[derive(Debug, Clone)]
pub struct GeneratedPuzzle {
    pub pieces: Vec<Piece>,
    pub cols: u32,
    pub rows: u32,
    pub actual_count: u32,
    /// Size of one grid cell (unpadded, unscaled).
    pub piece_size: Size,
    /// Frame padding on each side of a piece.
    pub padding: f32,
    /// Interior edges whose waypoint bulges toward +x/+y, and the rest.
    pub positive_edges: u32,
    pub negative_edges: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("image size must be finite and positive, got {width}x{height}")]
    InvalidImageSize { width: f32, height: f32 },
    #[error("target piece count must be at least 1")]
    ZeroPieceCount,
    #[error("target piece count {0} exceeds the maximum of {MAX_PIECE_COUNT}")]
    TooManyPieces(u32),
    #[error("piece scale must be finite and positive, got {0}")]
    InvalidScale(f32),
    #[error("a {cols}x{rows} grid exceeds the maximum of {MAX_PIECE_COUNT} pieces")]
    GridTooLarge { cols: u32, rows: u32 },
}

// ---------------------------------------------------------------------------
// Grid sizing
// ---------------------------------------------------------------------------

/// Pick `cols x rows` close to `target` pieces with roughly square cells.
///
/// The result can exceed `target`; it is never smaller, and both dimensions
/// are at least [`MIN_GRID_DIM`]. Extreme aspect ratios cannot push either
/// dimension past `target`.
pub fn choose_grid(width: f32, height: f32, target: u32) -> GridShape {
    let aspect = if width > 0.0 && height > 0.0 {
        width / height
    } else {
        1.0
    };
    let target_f = target as f32;
    let limit = target.max(MIN_GRID_DIM);
    let mut cols = ((target_f * aspect).sqrt().round() as u32).clamp(MIN_GRID_DIM, limit);
    let rows = ((target_f / cols as f32).round() as u32).clamp(MIN_GRID_DIM, limit);
    while u64::from(rows) * u64::from(cols) < u64::from(target) {
        cols += 1;
    }
    GridShape {
        cols,
        rows,
        actual_count: rows.saturating_mul(cols),
    }
}

// ---------------------------------------------------------------------------
// Lattice
// ---------------------------------------------------------------------------

/// A displaced waypoint on one interior edge, in image coordinates.
#[derive(Debug, Clone, Copy)]
struct EdgeWaypoint {
    point: Point,
    /// Bulges toward +x (vertical edges) or +y (horizontal edges).
    positive: bool,
}

/// Running bump/dent balance across all interior edges.
#[derive(Debug, Default)]
struct PolarityBalance {
    positive: u32,
    negative: u32,
}

impl PolarityBalance {
    fn draw(&mut self, rng: &mut PuzzleRng) -> bool {
        let p_positive = if self.positive > self.negative {
            0.5 - POLARITY_BIAS
        } else if self.negative > self.positive {
            0.5 + POLARITY_BIAS
        } else {
            0.5
        };
        let positive = rng.chance(p_positive);
        if positive {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
        positive
    }
}

struct Lattice {
    cols: u32,
    rows: u32,
    piece: Size,
    /// `horizontal[(r - 1) * cols + c]`: edge between rows `r - 1` and `r`.
    horizontal: Vec<EdgeWaypoint>,
    /// `vertical[r * (cols - 1) + (c - 1)]`: edge between cols `c - 1` and `c`.
    vertical: Vec<EdgeWaypoint>,
    balance: PolarityBalance,
}

impl Lattice {
    fn build(shape: GridShape, piece: Size, rng: &mut PuzzleRng) -> Self {
        let cols = shape.cols;
        let rows = shape.rows;
        let min_dim = piece.shortest();
        let min_depth = MIN_DEPTH_RATIO * min_dim;
        let max_depth = MAX_DEPTH_RATIO * min_dim;
        let mut balance = PolarityBalance::default();

        let depth_for = |rng: &mut PuzzleRng, edge_len: f32| {
            rng.range(min_depth, max_depth)
                .min(DENT_DEPTH_CAP_RATIO * min_dim)
                .min(DENT_EDGE_CAP_RATIO * edge_len)
        };

        let mut horizontal = Vec::with_capacity(((rows - 1) * cols) as usize);
        for r in 1..rows {
            for c in 0..cols {
                let shift = rng.range(-WAYPOINT_SHIFT_RATIO, WAYPOINT_SHIFT_RATIO) * piece.width;
                let depth = depth_for(rng, piece.width);
                let positive = balance.draw(rng);
                let sign = if positive { 1.0 } else { -1.0 };
                horizontal.push(EdgeWaypoint {
                    point: Point::new(
                        (c as f32 + 0.5) * piece.width + shift,
                        r as f32 * piece.height + sign * depth,
                    ),
                    positive,
                });
            }
        }

        let mut vertical = Vec::with_capacity((rows * (cols - 1)) as usize);
        for r in 0..rows {
            for c in 1..cols {
                let shift = rng.range(-WAYPOINT_SHIFT_RATIO, WAYPOINT_SHIFT_RATIO) * piece.height;
                let depth = depth_for(rng, piece.height);
                let positive = balance.draw(rng);
                let sign = if positive { 1.0 } else { -1.0 };
                vertical.push(EdgeWaypoint {
                    point: Point::new(
                        c as f32 * piece.width + sign * depth,
                        (r as f32 + 0.5) * piece.height + shift,
                    ),
                    positive,
                });
            }
        }

        Self {
            cols,
            rows,
            piece,
            horizontal,
            vertical,
            balance,
        }
    }

    fn corner(&self, col: u32, row: u32) -> Point {
        Point::new(col as f32 * self.piece.width, row as f32 * self.piece.height)
    }

    /// Waypoint on the edge between rows `row - 1` and `row`.
    fn horizontal_edge(&self, col: u32, row: u32) -> Option<EdgeWaypoint> {
        if row == 0 || row >= self.rows {
            return None;
        }
        self.horizontal
            .get(((row - 1) * self.cols + col) as usize)
            .copied()
    }

    /// Waypoint on the edge between cols `col - 1` and `col`.
    fn vertical_edge(&self, col: u32, row: u32) -> Option<EdgeWaypoint> {
        if col == 0 || col >= self.cols {
            return None;
        }
        self.vertical
            .get((row * (self.cols - 1) + (col - 1)) as usize)
            .copied()
    }

    /// Image-space waypoint and edge kind for one side of the piece at
    /// `(col, row)`.
    fn side(&self, col: u32, row: u32, side: Side) -> (Option<Point>, EdgeKind) {
        // For the north and west sides the piece sits on the positive side of
        // the edge, so a positive bulge is a dent for it.
        let (edge, piece_is_positive_side) = match side {
            Side::North => (self.horizontal_edge(col, row), true),
            Side::South => (self.horizontal_edge(col, row + 1), false),
            Side::West => (self.vertical_edge(col, row), true),
            Side::East => (self.vertical_edge(col + 1, row), false),
        };
        match edge {
            None => (None, EdgeKind::Border),
            Some(edge) => {
                let kind = if edge.positive == piece_is_positive_side {
                    EdgeKind::Dent
                } else {
                    EdgeKind::Bump
                };
                (Some(edge.point), kind)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate every piece of a puzzle.
///
/// Pieces come back at the origin with a placeholder group; the session
/// scatters them and registers a singleton group for each.
pub fn generate(spec: &PuzzleSpec) -> Result<GeneratedPuzzle, GenerateError> {
    let Size { width, height } = spec.image;
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(GenerateError::InvalidImageSize { width, height });
    }
    if spec.target_count == 0 {
        return Err(GenerateError::ZeroPieceCount);
    }
    if spec.target_count > MAX_PIECE_COUNT {
        return Err(GenerateError::TooManyPieces(spec.target_count));
    }
    if !(spec.scale.is_finite() && spec.scale > 0.0) {
        return Err(GenerateError::InvalidScale(spec.scale));
    }

    let shape = choose_grid(width, height, spec.target_count);
    if shape.actual_count > MAX_PIECE_COUNT {
        return Err(GenerateError::GridTooLarge {
            cols: shape.cols,
            rows: shape.rows,
        });
    }
    let piece_size = Size::new(width / shape.cols as f32, height / shape.rows as f32);
    let mut rng = PuzzleRng::new(spec.seed);
    let lattice = Lattice::build(shape, piece_size, &mut rng);

    let padding = (MAX_DEPTH_RATIO * piece_size.shortest()).ceil();
    let frame = Size::new(
        piece_size.width + 2.0 * padding,
        piece_size.height + 2.0 * padding,
    );

    let mut pieces = Vec::with_capacity(shape.actual_count as usize);
    for row in 0..shape.rows {
        for col in 0..shape.cols {
            let id = PieceId(row * shape.cols + col);
            let origin = lattice.corner(col, row) - Point::new(padding, padding);
            let to_local = |p: Point| p - origin;

            let corners = [
                lattice.corner(col, row),
                lattice.corner(col + 1, row),
                lattice.corner(col + 1, row + 1),
                lattice.corner(col, row + 1),
            ]
            .map(to_local);

            let mut sides = [None; 4];
            let mut edges = [EdgeKind::Border; 4];
            for side in Side::ALL {
                let (waypoint, kind) = lattice.side(col, row, side);
                sides[side.index()] = waypoint.map(to_local);
                edges[side.index()] = kind;
            }

            let path = boundary_path(&corners, &sides);
            let rotation = if spec.rotation_enabled {
                rng.index(4) as f32 * 90.0
            } else {
                0.0
            };

            pieces.push(Piece::new(
                id,
                GridCoord::new(col, row),
                corners,
                sides,
                edges,
                frame,
                path,
                rotation,
                spec.scale,
            ));
        }
    }

    log::debug!(
        "generated {}x{} puzzle ({} pieces, {} positive / {} negative edges)",
        shape.cols,
        shape.rows,
        shape.actual_count,
        lattice.balance.positive,
        lattice.balance.negative
    );

    Ok(GeneratedPuzzle {
        pieces,
        cols: shape.cols,
        rows: shape.rows,
        actual_count: shape.actual_count,
        piece_size,
        padding,
        positive_edges: lattice.balance.positive,
        negative_edges: lattice.balance.negative,
    })
}

/// Corner, side waypoint (if any), next corner, for all four sides, closed
/// by repeating the first corner.
fn boundary_path(corners: &[Point; 4], sides: &[Option<Point>; 4]) -> Vec<Point> {
    let mut path = Vec::with_capacity(9);
    for side in Side::ALL {
        let (start, _) = side.corners();
        path.push(corners[start.index()]);
        if let Some(waypoint) = sides[side.index()] {
            path.push(waypoint);
        }
    }
    path.push(corners[0]);
    path
}
