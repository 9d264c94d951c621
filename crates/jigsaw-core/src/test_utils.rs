//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::command::Command;
use crate::geometry::{Point, Size};
use crate::id::PieceId;
use crate::lattice::PuzzleSpec;
use crate::piece::{Corner, EdgeKind, GridCoord, Piece, Side};
use crate::session::Session;

// ===========================================================================
// Hand-built lattices
// ===========================================================================

/// Cell size of the hand-built lattice.
pub const CELL: f32 = 100.0;
/// Frame padding of the hand-built lattice.
pub const PADDING: f32 = 18.0;
/// Waypoint displacement of every interior edge.
pub const DEPTH: f32 = 15.0;
/// Spacing between piece centers before [`assemble`].
pub const SPREAD: f32 = 300.0;

/// Interior edge waypoint in solved world space, and whether it bulges
/// toward +x/+y.
fn edge_waypoint(col: u32, row: u32, side: Side, cols: u32, rows: u32) -> Option<(Point, bool)> {
    let here = GridCoord::new(col, row);
    here.neighbor(side, cols, rows)?;
    // Each interior edge is owned by the piece on its top/left.
    let (owner_col, owner_row, vertical) = match side {
        Side::North => (col, row - 1, false),
        Side::South => (col, row, false),
        Side::West => (col - 1, row, true),
        Side::East => (col, row, true),
    };
    let positive = (owner_col + owner_row) % 2 == 0;
    let depth = if positive { DEPTH } else { -DEPTH };
    let (c, r) = (owner_col as f32, owner_row as f32);
    let point = if vertical {
        Point::new((c + 1.0) * CELL + depth, (r + 0.5) * CELL)
    } else {
        Point::new((c + 0.5) * CELL, (r + 1.0) * CELL + depth)
    };
    Some((point, positive))
}

/// One piece of a `cols x rows` lattice of square cells with alternating
/// bumps and dents, placed away from its neighbors.
pub fn square_piece(col: u32, row: u32, cols: u32, rows: u32) -> Piece {
    let origin = Point::new(col as f32 * CELL - PADDING, row as f32 * CELL - PADDING);
    let local = |p: Point| p - origin;
    let (x0, y0) = (col as f32 * CELL, row as f32 * CELL);
    let corners = [
        Point::new(x0, y0),
        Point::new(x0 + CELL, y0),
        Point::new(x0 + CELL, y0 + CELL),
        Point::new(x0, y0 + CELL),
    ]
    .map(local);

    let mut sides = [None; 4];
    let mut edges = [EdgeKind::Border; 4];
    for side in Side::ALL {
        if let Some((point, positive)) = edge_waypoint(col, row, side, cols, rows) {
            sides[side.index()] = Some(local(point));
            let bulges_out = matches!(side, Side::South | Side::East) == positive;
            edges[side.index()] = if bulges_out { EdgeKind::Bump } else { EdgeKind::Dent };
        }
    }

    let frame = Size::new(CELL + 2.0 * PADDING, CELL + 2.0 * PADDING);
    let mut path: Vec<Point> = Vec::new();
    for side in Side::ALL {
        path.push(corners[side.corners().0.index()]);
        path.extend(sides[side.index()]);
    }
    path.push(corners[0]);

    let mut piece = Piece::new(
        PieceId(row * cols + col),
        GridCoord::new(col, row),
        corners,
        sides,
        edges,
        frame,
        path,
        0.0,
        1.0,
    );
    piece.set_position(Point::new(
        col as f32 * SPREAD + CELL,
        row as f32 * SPREAD + CELL,
    ));
    piece
}

/// Every piece of a `cols x rows` hand-built lattice, spread apart.
pub fn grid_pieces(cols: u32, rows: u32) -> Vec<Piece> {
    (0..rows)
        .flat_map(|row| (0..cols).map(move |col| square_piece(col, row, cols, rows)))
        .collect()
}

/// A single row of `n` pieces, spread apart.
pub fn line_pieces(n: u32) -> Vec<Piece> {
    grid_pieces(n, 1)
}

/// A `cols x rows` hand-built lattice in its solved arrangement.
pub fn solved_pieces(cols: u32, rows: u32) -> Vec<Piece> {
    let mut pieces = grid_pieces(cols, rows);
    assemble(&mut pieces);
    pieces
}

/// Where `piece` sits in the solved puzzle (cell at the world origin).
pub fn solved_position(piece: &Piece) -> Point {
    let w = piece.local_corner(Corner::Ne).x - piece.local_corner(Corner::Nw).x;
    let h = piece.local_corner(Corner::Sw).y - piece.local_corner(Corner::Nw).y;
    let grid = piece.grid();
    Point::new(
        (grid.col as f32 + 0.5) * w * piece.scale(),
        (grid.row as f32 + 0.5) * h * piece.scale(),
    )
}

/// Move every piece to its solved position with no rotation.
pub fn assemble(pieces: &mut [Piece]) {
    for piece in pieces {
        let position = solved_position(piece);
        piece.set_position(position);
        piece.set_rotation(0.0);
    }
}

// ===========================================================================
// Sessions
// ===========================================================================

/// An 800x600 image cut into 20 pieces (5x4) with rotation off.
pub fn flat_spec(seed: u64) -> PuzzleSpec {
    PuzzleSpec {
        rotation_enabled: false,
        ..PuzzleSpec::new(800.0, 600.0, 20, seed)
    }
}

/// A generated session with rotation off and default config.
pub fn flat_session(seed: u64) -> Session {
    Session::generate(flat_spec(seed)).expect("flat spec is valid")
}

/// Command that drags `piece`'s group so `piece` lands `offset` away from
/// its solved position.
pub fn drag_to_solved(session: &Session, piece: PieceId, offset: Point) -> Command {
    let current = session.table().piece(piece).expect("piece exists");
    Command::DragMove {
        piece,
        delta: solved_position(current) + offset - current.position(),
    }
}

/// Drop `piece` next to its solved position: begin, move, end.
pub fn snap_into_place(session: &mut Session, piece: PieceId, offset: Point) {
    session.apply(Command::BeginDrag { piece, detach: false });
    let drag = drag_to_solved(session, piece, offset);
    session.apply(drag);
    session.apply(Command::DragEnd { piece });
}

/// Snap every piece onto piece 0's solved frame, in id order.
pub fn assemble_session(session: &mut Session) {
    let first = PieceId(0);
    let anchor = session.table().piece(first).expect("piece 0 exists");
    let shift = anchor.position() - solved_position(anchor);
    for id in 1..session.table().len() as u32 {
        snap_into_place(session, PieceId(id), shift);
    }
}
