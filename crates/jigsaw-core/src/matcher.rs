//! Side matching between a moving piece and its neighbors on the table.
//!
//! A connection is tested on world-space waypoint triples
//! `[start corner, side waypoint, end corner]`. Two sides fit when every
//! paired point is within the position tolerance and the three pair
//! distances agree to within the profile tolerance, i.e. the edges are
//! parallel rather than merely close at one point. Both tolerances are given
//! in screen pixels and divided by the zoom level.

use crate::config::MatchConfig;
use crate::geometry::Point;
use crate::groups::GroupManager;
use crate::id::{GroupId, PieceId};
use crate::piece::{Corner, Side};
use crate::table::Table;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything a candidate search reads.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub table: &'a Table,
    pub config: &'a MatchConfig,
    pub zoom: f32,
}

impl<'a> MatchContext<'a> {
    pub fn new(table: &'a Table, config: &'a MatchConfig, zoom: f32) -> Self {
        Self { table, config, zoom }
    }
}

/// A side of `moving` that fits a side of `stationary`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub moving: PieceId,
    pub stationary: PieceId,
    pub moving_side: Side,
    pub stationary_side: Side,
    /// `moving_corner` must land on `stationary_corner`.
    pub moving_corner: Corner,
    pub stationary_corner: Corner,
    /// Sum of the three squared pair distances. Lower is better.
    pub score: f32,
}

impl Match {
    /// Whether the matched sides are the edge the two pieces share in the
    /// solved puzzle.
    pub fn is_lattice_neighbor(&self, table: &Table) -> bool {
        let (Some(m), Some(s)) = (table.piece(self.moving), table.piece(self.stationary)) else {
            return false;
        };
        m.grid().side_towards(&s.grid()) == Some(self.moving_side)
            && self.stationary_side == self.moving_side.opposite()
    }
}

/// How a pair of waypoint triples lines up.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pairing {
    score: f32,
    reversed: bool,
}

// ---------------------------------------------------------------------------
// Pair test
// ---------------------------------------------------------------------------

/// Test `a` against `b` in direct order and with `b` reversed; keep the
/// better passing pairing.
fn pair_sides(a: &[Point; 3], b: &[Point; 3], tol_sq: f32, profile_tol: f32) -> Option<Pairing> {
    let direct = score_pairs([(a[0], b[0]), (a[1], b[1]), (a[2], b[2])], tol_sq, profile_tol);
    let reversed = score_pairs([(a[0], b[2]), (a[1], b[1]), (a[2], b[0])], tol_sq, profile_tol);
    match (direct, reversed) {
        (Some(d), Some(r)) if r < d => Some(Pairing { score: r, reversed: true }),
        (Some(d), _) => Some(Pairing { score: d, reversed: false }),
        (None, Some(r)) => Some(Pairing { score: r, reversed: true }),
        (None, None) => None,
    }
}

fn score_pairs(pairs: [(Point, Point); 3], tol_sq: f32, profile_tol: f32) -> Option<f32> {
    let d_sq = pairs.map(|(p, q)| p.distance_sq(q));
    if d_sq.iter().any(|&d| d > tol_sq) {
        return None;
    }
    let d = d_sq.map(f32::sqrt);
    let max = d.iter().copied().fold(f32::MIN, f32::max);
    let min = d.iter().copied().fold(f32::MAX, f32::min);
    if max - min >= profile_tol {
        return None;
    }
    Some(d_sq.iter().sum())
}

// ---------------------------------------------------------------------------
// Searches
// ---------------------------------------------------------------------------

/// Best fitting side pair against every nearby piece outside the moving
/// piece's group, one entry per stationary piece, in ascending id order.
/// With [`MatchConfig::neighbors_only`] only grid neighbors are considered,
/// across the edge they share in the solved puzzle.
pub fn candidate_matches(ctx: &MatchContext<'_>, moving: PieceId) -> Vec<Match> {
    let table = ctx.table;
    let (Some(piece), Some(geo)) = (table.piece(moving), table.world_geometry(moving)) else {
        return Vec::new();
    };
    let tol_sq = ctx.config.position_tolerance_sq(ctx.zoom);
    let profile_tol = ctx.config.profile_tolerance(ctx.zoom);
    let radius = ctx.config.search_radius_factor * piece.scaled_frame().longest();

    let mut matches = Vec::new();
    for id in table.index().query_radius(piece.position().as_tuple(), radius) {
        let Some(other) = table.piece(id) else {
            continue;
        };
        if id == moving || other.group() == piece.group() {
            continue;
        }
        let shared = piece.grid().side_towards(&other.grid());
        if ctx.config.neighbors_only && shared.is_none() {
            continue;
        }
        let Some(other_geo) = table.world_geometry(id) else {
            continue;
        };

        let mut best: Option<Match> = None;
        for moving_side in Side::ALL {
            if ctx.config.neighbors_only && shared != Some(moving_side) {
                continue;
            }
            let Some(a) = geo.side_waypoints(moving_side) else {
                continue;
            };
            for stationary_side in Side::ALL {
                if ctx.config.neighbors_only && stationary_side != moving_side.opposite() {
                    continue;
                }
                let Some(b) = other_geo.side_waypoints(stationary_side) else {
                    continue;
                };
                if ctx.config.require_complementary
                    && !piece.edge(moving_side).complements(other.edge(stationary_side))
                {
                    continue;
                }
                let Some(pairing) = pair_sides(&a, &b, tol_sq, profile_tol) else {
                    continue;
                };
                if best.is_some_and(|m| m.score <= pairing.score) {
                    continue;
                }
                let (moving_corner, _) = moving_side.corners();
                let (start, end) = stationary_side.corners();
                best = Some(Match {
                    moving,
                    stationary: id,
                    moving_side,
                    stationary_side,
                    moving_corner,
                    stationary_corner: if pairing.reversed { end } else { start },
                    score: pairing.score,
                });
            }
        }
        matches.extend(best);
    }
    log::trace!("{moving}: {} candidates within {radius}", matches.len());
    matches
}

fn best_of(matches: impl IntoIterator<Item = Match>) -> Option<Match> {
    matches.into_iter().fold(None, |best, m| match best {
        Some(b) if b.score <= m.score => Some(b),
        _ => Some(m),
    })
}

/// Best single connection for `moving`, or `None`. Ties keep the lowest
/// stationary id.
pub fn find_candidate(ctx: &MatchContext<'_>, moving: PieceId) -> Option<Match> {
    best_of(candidate_matches(ctx, moving))
}

/// Best connection for any border piece of `group`.
pub fn find_group_candidate(
    ctx: &MatchContext<'_>,
    groups: &GroupManager,
    group: GroupId,
) -> Option<Match> {
    let border = groups.border_pieces(ctx.table.pieces(), group);
    best_of(border.into_iter().filter_map(|id| find_candidate(ctx, id)))
}

/// Every stationary piece a border piece of `group` currently fits, sorted
/// and deduplicated.
pub fn highlight_candidates(
    ctx: &MatchContext<'_>,
    groups: &GroupManager,
    group: GroupId,
) -> Vec<PieceId> {
    let ids: BTreeSet<PieceId> = groups
        .border_pieces(ctx.table.pieces(), group)
        .into_iter()
        .flat_map(|id| candidate_matches(ctx, id))
        .map(|m| m.stationary)
        .collect();
    ids.into_iter().collect()
}

/// Translation that puts the match's moving corner exactly on its
/// stationary corner.
pub fn alignment_delta(table: &Table, m: &Match) -> Option<Point> {
    let moving = table.world_geometry(m.moving)?;
    let stationary = table.world_geometry(m.stationary)?;
    Some(stationary.corner(m.stationary_corner) - moving.corner(m.moving_corner))
}
