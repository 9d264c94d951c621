//! Session events and the bus that delivers them.
//!
//! Events emitted while a command runs are buffered and delivered in one
//! batch when [`crate::session::Session::apply`] returns, in emission order.
//! Listeners are passive: they observe events but cannot mutate the session.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed
//! events are never buffered, delivered or recorded.

use crate::id::{GroupId, PieceId};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Group topology --
    /// `from` was absorbed into `into` and no longer exists.
    GroupsMerged { from: GroupId, into: GroupId },
    /// `piece` left its group and now sits alone in `new_group`. The rest of
    /// the old group may have split; `fragments` lists the groups created
    /// for the pieces that lost contact with the largest remainder.
    PieceDetached {
        piece: PieceId,
        new_group: GroupId,
        fragments: Vec<GroupId>,
    },

    // -- Drag feedback --
    /// The set of stationary pieces the dragged group would snap to changed.
    /// `None` clears the highlight.
    HighlightChanged { stationary: Option<Vec<PieceId>> },

    // -- Progress --
    /// A drop snapped `moving` onto `stationary`; both now belong to `group`.
    PiecesConnected {
        moving: PieceId,
        stationary: PieceId,
        group: GroupId,
    },
    /// Every piece is in a single group.
    PuzzleCompleted { group: GroupId },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GroupsMerged,
    PieceDetached,
    HighlightChanged,
    PiecesConnected,
    PuzzleCompleted,
}

const EVENT_KIND_COUNT: usize = 5;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GroupsMerged { .. } => EventKind::GroupsMerged,
            Event::PieceDetached { .. } => EventKind::PieceDetached,
            Event::HighlightChanged { .. } => EventKind::HighlightChanged,
            Event::PiecesConnected { .. } => EventKind::PiecesConnected,
            Event::PuzzleCompleted { .. } => EventKind::PuzzleCompleted,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Buffers events during a command and hands them to listeners afterwards.
pub struct EventBus {
    /// Events emitted since the last delivery, oldest first.
    pending: Vec<Event>,
    /// Listeners indexed by event kind, in registration order.
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    /// Recently delivered events, bounded by `max_history`.
    history: VecDeque<Event>,
    max_history: usize,
    /// Total events ever delivered (including those evicted from history).
    total_delivered: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending)
            .field("suppressed", &self.suppressed)
            .field("history_len", &self.history.len())
            .field("total_delivered", &self.total_delivered)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus that remembers up to `max_history` delivered events.
    pub fn new(max_history: usize) -> Self {
        Self {
            pending: Vec::new(),
            listeners: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            history: VecDeque::new(),
            max_history,
            total_delivered: 0,
        }
    }

    /// Suppress an event kind. Already buffered events of that kind are dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.pending.retain(|e| e.kind() != kind);
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for the next delivery. No-ops if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.pending.push(event);
    }

    /// Register a passive listener for an event kind. Listeners run in
    /// registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Hand every buffered event to its listeners, oldest first, and move it
    /// into the history. Returns the number of events delivered.
    pub fn deliver(&mut self) -> usize {
        let events = std::mem::take(&mut self.pending);
        let delivered = events.len();
        for event in events {
            for listener in &mut self.listeners[event.kind().index()] {
                listener(&event);
            }
            self.record(event);
        }
        self.total_delivered += delivered as u64;
        delivered
    }

    fn record(&mut self, event: Event) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Events waiting for delivery.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Delivered events still in the history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Event> {
        self.history.iter()
    }

    /// Delivered events of one kind still in the history.
    pub fn history_of(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.history.iter().filter(move |e| e.kind() == kind)
    }

    pub fn total_delivered(&self) -> u64 {
        self.total_delivered
    }

    /// Drop buffered events and history. Listeners and suppression stay.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::EVENT_HISTORY)
    }
}
