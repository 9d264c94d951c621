//! Input commands for a puzzle session.
//!
//! The host UI turns pointer and keyboard input into [`Command`]s and hands
//! them to [`crate::session::Session::apply`], which processes each one
//! synchronously. [`CommandLog`] keeps a bounded history of applied commands
//! for replay and debugging.

use crate::geometry::Point;
use crate::id::{GroupId, PieceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Pick up `piece`. With `detach`, the piece is first pulled out of its
    /// group and dragged alone.
    BeginDrag { piece: PieceId, detach: bool },
    /// Move the dragged piece's group by `delta` world units.
    DragMove { piece: PieceId, delta: Point },
    /// Drop the group, snapping to the best fitting neighbor if any.
    DragEnd { piece: PieceId },
    /// Rotate `piece`'s group by `angle` degrees about `piece`.
    Rotate { piece: PieceId, angle: f32 },
    /// Pull `piece` out of its group without dragging.
    Detach { piece: PieceId },
    BringToFront { piece: PieceId },
    /// Current view zoom; tolerances are divided by it.
    SetZoom { zoom: f32 },
}

impl Command {
    /// The piece the command targets, if any.
    pub fn piece(&self) -> Option<PieceId> {
        match self {
            Command::BeginDrag { piece, .. }
            | Command::DragMove { piece, .. }
            | Command::DragEnd { piece }
            | Command::Rotate { piece, .. }
            | Command::Detach { piece }
            | Command::BringToFront { piece } => Some(*piece),
            Command::SetZoom { .. } => None,
        }
    }
}

/// What a command did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// Unknown id, invalid argument or disabled feature; nothing changed.
    Ignored,
    /// A drop snapped `moving` onto `stationary`; both are now in `group`.
    Connected {
        moving: PieceId,
        stationary: PieceId,
        group: GroupId,
    },
    /// The piece now sits alone in `group`.
    Detached { group: GroupId },
}

impl CommandOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, CommandOutcome::Ignored)
    }
}

// ---------------------------------------------------------------------------
// CommandLog
// ---------------------------------------------------------------------------

/// One applied command with its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCommand {
    pub sequence: u64,
    pub command: Command,
    pub outcome: CommandOutcome,
}

/// Bounded history of applied commands.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: VecDeque<LoggedCommand>,
    /// Maximum entries to retain. 0 = no history.
    max_history: usize,
    next_sequence: u64,
}

impl CommandLog {
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_history,
            next_sequence: 0,
        }
    }

    /// Record a command. Every call consumes a sequence number, even when
    /// history is disabled.
    pub fn record(&mut self, command: Command, outcome: CommandOutcome) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.max_history == 0 {
            return;
        }
        if self.entries.len() == self.max_history {
            self.entries.pop_front();
        }
        self.entries.push_back(LoggedCommand {
            sequence,
            command,
            outcome,
        });
    }

    /// Retained entries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &LoggedCommand> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commands recorded since creation, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.next_sequence
    }

    pub fn clear_history(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag_end(i: u32) -> Command {
        Command::DragEnd { piece: PieceId(i) }
    }

    #[test]
    fn command_piece() {
        assert_eq!(drag_end(3).piece(), Some(PieceId(3)));
        assert_eq!(Command::SetZoom { zoom: 2.0 }.piece(), None);
    }

    #[test]
    fn new_log_is_empty() {
        let log = CommandLog::with_max_history(4);
        assert!(log.is_empty());
        assert_eq!(log.total_recorded(), 0);
    }

    #[test]
    fn history_trims_oldest() {
        let mut log = CommandLog::with_max_history(2);
        for i in 0..3 {
            log.record(drag_end(i), CommandOutcome::Applied);
        }
        let kept: Vec<u64> = log.history().map(|e| e.sequence).collect();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(log.history().next().unwrap().command, drag_end(1));
        assert_eq!(log.total_recorded(), 3);
    }

    #[test]
    fn zero_history_still_counts() {
        let mut log = CommandLog::default();
        log.record(drag_end(0), CommandOutcome::Ignored);
        assert!(log.is_empty());
        assert_eq!(log.total_recorded(), 1);
    }

    #[test]
    fn clear_history_keeps_sequence() {
        let mut log = CommandLog::with_max_history(8);
        log.record(drag_end(0), CommandOutcome::Applied);
        log.clear_history();
        log.record(drag_end(1), CommandOutcome::Applied);
        assert_eq!(log.history().next().unwrap().sequence, 1);
    }

    #[test]
    fn outcome_ignored() {
        assert!(CommandOutcome::Ignored.is_ignored());
        assert!(!CommandOutcome::Detached { group: GroupId(1) }.is_ignored());
    }
}
