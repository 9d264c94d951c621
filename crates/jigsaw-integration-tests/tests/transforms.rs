//! Zoom-dependent snapping, rigid group rotation and stacking order.

use jigsaw_core::command::{Command, CommandOutcome};
use jigsaw_core::config::GameConfig;
use jigsaw_core::geometry::Point;
use jigsaw_core::id::PieceId;
use jigsaw_core::piece::Corner;
use jigsaw_core::session::Session;
use jigsaw_core::test_utils::*;
use jigsaw_core::validation::is_valid;

fn anchor_shift(session: &Session) -> Point {
    let anchor = session.table().piece(PieceId(0)).unwrap();
    anchor.position() - solved_position(anchor)
}

/// Drop piece 1 `gap` pixels right of its fit against piece 0.
fn drop_with_gap(session: &mut Session, gap: f32) -> CommandOutcome {
    let shift = anchor_shift(session);
    session.apply(Command::BeginDrag { piece: PieceId(1), detach: false });
    let drag = drag_to_solved(session, PieceId(1), shift + Point::new(gap, 0.0));
    session.apply(drag);
    session.apply(Command::DragEnd { piece: PieceId(1) })
}

// ===========================================================================
// Zoom
// ===========================================================================

#[test]
fn small_gap_snaps_at_normal_zoom() {
    let mut session = flat_session(61);
    let outcome = drop_with_gap(&mut session, 8.0);
    assert!(matches!(outcome, CommandOutcome::Connected { .. }));

    // The snap closed the gap.
    let placed = session.table().piece(PieceId(1)).unwrap();
    let shift = anchor_shift(&session);
    assert!(placed.position().distance(solved_position(placed) + shift) < 1e-2);
}

#[test]
fn same_gap_is_too_wide_when_zoomed_in() {
    let mut session = flat_session(61);
    assert_eq!(session.apply(Command::SetZoom { zoom: 2.0 }), CommandOutcome::Applied);
    let outcome = drop_with_gap(&mut session, 8.0);
    assert_eq!(outcome, CommandOutcome::Applied);
    assert_ne!(session.group_of(PieceId(0)), session.group_of(PieceId(1)));
}

#[test]
fn zooming_out_widens_the_tolerance() {
    let mut session = flat_session(62);
    session.apply(Command::SetZoom { zoom: 0.5 });
    let outcome = drop_with_gap(&mut session, 20.0);
    assert!(matches!(outcome, CommandOutcome::Connected { .. }));
}

#[test]
fn custom_tolerance_applies() {
    let mut config = GameConfig::default();
    config.matching.position_tolerance_px = 4.0;
    let mut session = Session::new(flat_spec(63), config).unwrap();
    assert_eq!(drop_with_gap(&mut session, 8.0), CommandOutcome::Applied);
    assert!(matches!(drop_with_gap(&mut session, 2.0), CommandOutcome::Connected { .. }));
}

// ===========================================================================
// Rotation
// ===========================================================================

/// Session with pieces 0 and 1 joined and rotation turned on.
fn rotatable_pair(seed: u64) -> Session {
    let mut session = flat_session(seed);
    let shift = anchor_shift(&session);
    snap_into_place(&mut session, PieceId(1), shift);
    let mut snapshot = session.snapshot();
    snapshot.spec.rotation_enabled = true;
    Session::restore(&snapshot, GameConfig::default()).unwrap()
}

#[test]
fn group_rotates_rigidly_about_the_grabbed_piece() {
    let mut session = rotatable_pair(64);
    assert!(is_valid(&session));
    let p0 = session.table().piece(PieceId(0)).unwrap().position();
    let p1 = session.table().piece(PieceId(1)).unwrap().position();

    let outcome = session.apply(Command::Rotate { piece: PieceId(1), angle: 90.0 });
    assert_eq!(outcome, CommandOutcome::Applied);

    let r0 = session.table().piece(PieceId(0)).unwrap();
    let r1 = session.table().piece(PieceId(1)).unwrap();
    assert_eq!(r0.rotation(), 90.0);
    assert_eq!(r1.rotation(), 90.0);
    assert!(r1.position().distance(p1) < 1e-3);
    assert!(r0.position().distance(p0.rotated_about(p1, 90.0)) < 1e-3);
    assert!((r0.position().distance(r1.position()) - p0.distance(p1)).abs() < 1e-3);

    // Still joined and indexed where the pieces now are.
    assert!(is_valid(&session));
}

#[test]
fn four_quarter_turns_come_back_around() {
    let mut session = rotatable_pair(65);
    let start = session.table().piece(PieceId(0)).unwrap().position();
    for _ in 0..4 {
        session.apply(Command::Rotate { piece: PieceId(1), angle: 90.0 });
    }
    let piece = session.table().piece(PieceId(0)).unwrap();
    assert_eq!(piece.rotation(), 0.0);
    assert!(piece.position().distance(start) < 1e-2);
}

#[test]
fn rotation_rejects_bad_angles() {
    let mut session = rotatable_pair(66);
    assert!(session.apply(Command::Rotate { piece: PieceId(1), angle: f32::INFINITY }).is_ignored());
    assert!(session.apply(Command::Rotate { piece: PieceId(999), angle: 90.0 }).is_ignored());
    assert_eq!(session.table().piece(PieceId(1)).unwrap().rotation(), 0.0);
}

#[test]
fn rotated_neighbor_does_not_snap() {
    let mut session = rotatable_pair(67);
    // A quarter turn puts piece 5's border side where its top edge was.
    session.apply(Command::Rotate { piece: PieceId(5), angle: 90.0 });
    let shift = anchor_shift(&session);
    session.apply(Command::BeginDrag { piece: PieceId(5), detach: false });
    let drag = drag_to_solved(&session, PieceId(5), shift);
    session.apply(drag);
    let outcome = session.apply(Command::DragEnd { piece: PieceId(5) });
    assert_eq!(outcome, CommandOutcome::Applied);
    assert_eq!(session.groups().group_count(), 19);
}

#[test]
fn tilted_drop_at_low_zoom_is_not_merged() {
    let mut snapshot = flat_session(11).snapshot();
    snapshot.spec.rotation_enabled = true;
    let mut session = Session::restore(&snapshot, GameConfig::default()).unwrap();
    session.apply(Command::SetZoom { zoom: 0.25 });
    session.apply(Command::Rotate { piece: PieceId(1), angle: 10.0 });

    // Drop piece 1 in its solved spot, swung 10 degrees about the midpoint
    // of the edge it shares with piece 0. At this zoom the sides still pass
    // the matcher, but only one pair of corners can be made to meet.
    let shift = anchor_shift(&session);
    let edge = session.table().world_geometry(PieceId(0)).unwrap();
    let pivot = (edge.corner(Corner::Ne) + edge.corner(Corner::Se)) * 0.5;
    let moving = session.table().piece(PieceId(1)).unwrap();
    let target = (solved_position(moving) + shift).rotated_about(pivot, 10.0);
    let delta = target - moving.position();
    session.apply(Command::BeginDrag { piece: PieceId(1), detach: false });
    session.apply(Command::DragMove { piece: PieceId(1), delta });
    let outcome = session.apply(Command::DragEnd { piece: PieceId(1) });

    assert_eq!(outcome, CommandOutcome::Applied);
    assert_ne!(session.group_of(PieceId(0)), session.group_of(PieceId(1)));
    let dropped = session.table().piece(PieceId(1)).unwrap().position();
    assert!(dropped.distance(target) < 1e-2);
    assert!(is_valid(&session));
}

// ===========================================================================
// Stacking
// ===========================================================================

#[test]
fn bring_to_front_raises_the_whole_group() {
    let mut session = flat_session(68);
    let shift = anchor_shift(&session);
    snap_into_place(&mut session, PieceId(1), shift);
    session.apply(Command::BringToFront { piece: PieceId(9) });

    session.apply(Command::BringToFront { piece: PieceId(0) });
    let z0 = session.table().piece(PieceId(0)).unwrap().z();
    let z1 = session.table().piece(PieceId(1)).unwrap().z();
    assert_eq!(z0, z1);
    assert_eq!(z0 + 1, session.table().next_z());

    let order = session.table().paint_order();
    assert_eq!(&order[order.len() - 2..], &[PieceId(0), PieceId(1)]);
    assert_eq!(order[order.len() - 3], PieceId(9));
}

#[test]
fn begin_drag_raises_the_dragged_group() {
    let mut session = flat_session(69);
    session.apply(Command::BeginDrag { piece: PieceId(12), detach: false });
    assert_eq!(session.table().paint_order().last(), Some(&PieceId(12)));
    assert_eq!(session.dragging(), Some(PieceId(12)));
}
