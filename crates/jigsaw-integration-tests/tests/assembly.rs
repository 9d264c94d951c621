//! End-to-end assembly of generated puzzles through the command interface.
//!
//! Every test drives a [`Session`] the way a host UI would: begin a drag,
//! move the group, drop it. Integrity is checked after every command.

use jigsaw_core::command::{Command, CommandOutcome};
use jigsaw_core::event::{Event, EventKind};
use jigsaw_core::geometry::Point;
use jigsaw_core::id::PieceId;
use jigsaw_core::lattice::PuzzleSpec;
use jigsaw_core::session::Session;
use jigsaw_core::test_utils::*;
use jigsaw_core::validation::{check_integrity, is_valid};
use std::cell::RefCell;
use std::rc::Rc;

// ===========================================================================
// Helpers
// ===========================================================================

/// Offset from solved space to piece 0's current frame.
fn anchor_shift(session: &Session) -> Point {
    let anchor = session.table().piece(PieceId(0)).unwrap();
    anchor.position() - solved_position(anchor)
}

/// Apply a command and fail loudly if the session falls out of sync.
fn apply_checked(session: &mut Session, command: Command) -> CommandOutcome {
    let outcome = session.apply(command.clone());
    let issues = check_integrity(session);
    assert!(issues.is_empty(), "after {command:?}: {issues:?}");
    outcome
}

fn snap_checked(session: &mut Session, piece: PieceId, offset: Point) -> CommandOutcome {
    apply_checked(session, Command::BeginDrag { piece, detach: false });
    let drag = drag_to_solved(session, piece, offset);
    apply_checked(session, drag);
    apply_checked(session, Command::DragEnd { piece })
}

// ===========================================================================
// Full assembly
// ===========================================================================

#[test]
fn assembling_every_piece_completes_the_puzzle() {
    let mut session = flat_session(21);
    let completions = Rc::new(RefCell::new(0u32));
    let counter = completions.clone();
    session.on_event(
        EventKind::PuzzleCompleted,
        Box::new(move |_| *counter.borrow_mut() += 1),
    );

    let shift = anchor_shift(&session);
    let n = session.table().len() as u32;
    for id in 1..n {
        let outcome = snap_checked(&mut session, PieceId(id), shift);
        assert!(
            matches!(outcome, CommandOutcome::Connected { moving, .. } if moving == PieceId(id)),
            "piece {id} did not connect: {outcome:?}"
        );
        assert_eq!(session.groups().group_count(), (n - id) as usize);
    }

    let stats = session.stats();
    assert!(session.is_completed());
    assert_eq!(stats.group_count, 1);
    assert_eq!(stats.score, n as usize);
    assert_eq!(stats.largest_group, n as usize);
    assert_eq!(stats.percent_complete, 100.0);
    assert_eq!(*completions.borrow(), 1);
}

#[test]
fn completion_fires_once_across_extra_commands() {
    let mut session = flat_session(22);
    assemble_session(&mut session);
    assert!(session.is_completed());

    session.apply(Command::BringToFront { piece: PieceId(4) });
    session.apply(Command::DragMove {
        piece: PieceId(7),
        delta: Point::new(25.0, -40.0),
    });
    session.apply(Command::DragEnd { piece: PieceId(7) });

    let completions = session.events().history_of(EventKind::PuzzleCompleted).count();
    assert_eq!(completions, 1);
    assert_eq!(session.groups().group_count(), 1);
}

#[test]
fn detach_after_completion_reopens_the_puzzle() {
    let mut session = flat_session(23);
    assemble_session(&mut session);

    let outcome = apply_checked(&mut session, Command::Detach { piece: PieceId(0) });
    assert!(matches!(outcome, CommandOutcome::Detached { .. }));
    assert!(!session.is_completed());
    assert_eq!(session.groups().group_count(), 2);

    // Dropping the corner back where it was rejoins the puzzle.
    let shift = {
        let one = session.table().piece(PieceId(1)).unwrap();
        one.position() - solved_position(one)
    };
    snap_checked(&mut session, PieceId(0), shift);
    assert!(session.is_completed());
    assert_eq!(session.events().history_of(EventKind::PuzzleCompleted).count(), 2);
}

#[test]
fn out_of_order_assembly_joins_islands() {
    let mut session = flat_session(24);
    let shift = anchor_shift(&session);

    // Build the bottom-right corner as its own island first: 18 and 19 sit on
    // the last row of the 5x4 lattice.
    snap_checked(&mut session, PieceId(18), shift + Point::new(600.0, 0.0));
    snap_checked(&mut session, PieceId(19), shift + Point::new(600.0, 0.0));
    assert_eq!(session.group_of(PieceId(18)), session.group_of(PieceId(19)));
    assert_ne!(session.group_of(PieceId(0)), session.group_of(PieceId(18)));

    for id in 1..18 {
        snap_checked(&mut session, PieceId(id), shift);
    }
    assert_eq!(session.groups().group_count(), 2);

    // Drop the island next to the rest: both of its top sides fit at once.
    let outcome = snap_checked(&mut session, PieceId(19), shift);
    assert!(matches!(outcome, CommandOutcome::Connected { .. }));
    assert!(session.is_completed());
    assert!(is_valid(&session));
}

#[test]
fn larger_puzzles_assemble_too() {
    let spec = PuzzleSpec {
        rotation_enabled: false,
        ..PuzzleSpec::new(1600.0, 900.0, 60, 99)
    };
    let mut session = Session::generate(spec).unwrap();
    let n = session.table().len();
    assert!(n >= 50);

    assemble_session(&mut session);
    assert_eq!(session.stats().score, n);
    assert!(is_valid(&session));
}

// ===========================================================================
// Event ordering
// ===========================================================================

#[test]
fn snap_emits_events_in_order() {
    let mut session = flat_session(25);
    let shift = anchor_shift(&session);
    snap_checked(&mut session, PieceId(1), shift);

    let kinds: Vec<EventKind> = session.events().history().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::HighlightChanged,
            EventKind::GroupsMerged,
            EventKind::PiecesConnected,
            EventKind::HighlightChanged,
        ]
    );

    let history: Vec<&Event> = session.events().history().collect();
    assert_eq!(
        history[0],
        &Event::HighlightChanged {
            stationary: Some(vec![PieceId(0)])
        }
    );
    assert_eq!(history[3], &Event::HighlightChanged { stationary: None });
}

#[test]
fn suppressed_highlights_are_not_recorded() {
    let mut session = flat_session(26);
    session.events_mut().suppress(EventKind::HighlightChanged);
    let shift = anchor_shift(&session);
    snap_checked(&mut session, PieceId(1), shift);

    assert_eq!(session.events().history_of(EventKind::HighlightChanged).count(), 0);
    assert_eq!(session.events().history_of(EventKind::PiecesConnected).count(), 1);
    // The session still tracks the highlight even when nobody hears about it.
    assert!(session.highlight().is_none());
}
