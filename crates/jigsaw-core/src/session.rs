//! One puzzle being played.
//!
//! [`Session`] owns the table, the group registry, the event bus and the
//! drag state, and processes [`Command`]s one at a time. When
//! [`Session::apply`] returns, piece positions, the spatial index and the
//! group registry agree with each other, and every event the command
//! produced has been delivered.

use crate::command::{Command, CommandLog, CommandOutcome};
use crate::config::{ConfigError, GameConfig};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::geometry::Point;
use crate::groups::{GroupChange, GroupManager, pieces_joined};
use crate::id::{GroupId, PieceId};
use crate::lattice::{GenerateError, PuzzleSpec, generate};
use crate::matcher::{
    Match, MatchContext, alignment_delta, find_group_candidate, highlight_candidates,
};
use crate::piece::Side;
use crate::rng::PuzzleRng;
use crate::serialize::{PieceState, RestoreError, SerializeError, SessionSnapshot};
use crate::stats::PuzzleStats;
use crate::table::Table;

/// Mixed into the puzzle seed for the initial scatter, so piece placement
/// does not replay the lattice draws.
const SCATTER_SALT: u64 = 0x5CA7_7E12_D15C_0001;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    spec: PuzzleSpec,
    table: Table,
    groups: GroupManager,
    events: EventBus,
    commands: CommandLog,
    zoom: f32,
    /// Piece being dragged, if any.
    drag: Option<PieceId>,
    /// Stationary pieces currently highlighted as snap targets.
    highlight: Option<Vec<PieceId>>,
    completed: bool,
}

impl Session {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Generate a fresh puzzle: every piece alone in its own group, scattered
    /// over the table.
    pub fn new(spec: PuzzleSpec, config: GameConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let generated = generate(&spec)?;
        let mut pieces = generated.pieces;
        let groups = GroupManager::with_singletons(&mut pieces, config.connectivity.clone());
        let mut table = Table::new(pieces, generated.cols, generated.rows, &config.spatial);

        let area = spec.image.scaled(spec.scale * config.table.scatter_spread);
        table.scatter(&mut PuzzleRng::new(spec.seed ^ SCATTER_SALT), area);

        log::debug!(
            "new session: {}x{} pieces, seed {:#x}",
            generated.cols,
            generated.rows,
            spec.seed
        );
        Ok(Self::assemble(config, spec, table, groups))
    }

    /// [`Session::new`] with the default configuration.
    pub fn generate(spec: PuzzleSpec) -> Result<Self, SessionError> {
        Self::new(spec, GameConfig::default())
    }

    /// Rebuild a session from a snapshot. Geometry is regenerated from the
    /// stored spec; transforms, z values and groups come from the piece
    /// records, and the group registry is derived from them alone.
    pub fn restore(snapshot: &SessionSnapshot, config: GameConfig) -> Result<Self, RestoreError> {
        snapshot.check_header()?;
        config.validate()?;
        let generated = generate(&snapshot.spec)?;
        let mut pieces = generated.pieces;
        let expected = pieces.len();
        if snapshot.pieces.len() != expected {
            return Err(RestoreError::PieceCountMismatch {
                expected,
                found: snapshot.pieces.len(),
            });
        }

        let mut seen = vec![false; expected];
        for state in &snapshot.pieces {
            state.validate(expected)?;
            let slot = &mut seen[state.id.index()];
            if *slot {
                return Err(RestoreError::DuplicatePiece(state.id));
            }
            *slot = true;
            let piece = &mut pieces[state.id.index()];
            piece.set_position(state.position);
            piece.set_rotation(state.rotation);
            piece.set_z(state.z);
            piece.set_group(state.group);
        }

        let mut groups = GroupManager::new(config.connectivity.clone());
        groups.rebuild_from_pieces(&pieces);
        if !groups.validate(&pieces) {
            log::warn!("restored groups are not all connected");
        }
        let table = Table::new(pieces, generated.cols, generated.rows, &config.spatial);

        log::debug!(
            "restored session: {} pieces in {} groups",
            expected,
            groups.group_count()
        );
        let mut session = Self::assemble(config, snapshot.spec.clone(), table, groups);
        session.completed = session.groups.group_count() == 1;
        Ok(session)
    }

    /// Decode snapshot bytes and restore them.
    pub fn from_bytes(data: &[u8], config: GameConfig) -> Result<Self, RestoreError> {
        let snapshot = SessionSnapshot::from_bytes(data)?;
        Self::restore(&snapshot, config)
    }

    fn assemble(config: GameConfig, spec: PuzzleSpec, table: Table, groups: GroupManager) -> Self {
        Self {
            events: EventBus::new(config.event_history),
            commands: CommandLog::with_max_history(config.command_history),
            config,
            spec,
            table,
            groups,
            zoom: 1.0,
            drag: None,
            highlight: None,
            completed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn spec(&self) -> &PuzzleSpec {
        &self.spec
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Mutable bus access, for suppression settings.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Register a passive listener for one event kind.
    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    pub fn commands(&self) -> &CommandLog {
        &self.commands
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn dragging(&self) -> Option<PieceId> {
        self.drag
    }

    pub fn highlight(&self) -> Option<&[PieceId]> {
        self.highlight.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn group_of(&self, piece: PieceId) -> Option<GroupId> {
        self.table.piece(piece).map(|p| p.group())
    }

    pub fn stats(&self) -> PuzzleStats {
        PuzzleStats::compute(self.table.len(), &self.groups)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let pieces = self.table.pieces().iter().map(PieceState::from).collect();
        SessionSnapshot::new(self.spec.clone(), pieces)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        self.snapshot().to_bytes()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Process one command, record it, then deliver the events it produced.
    pub fn apply(&mut self, command: Command) -> CommandOutcome {
        let outcome = match command {
            Command::BeginDrag { piece, detach } => self.begin_drag(piece, detach),
            Command::DragMove { piece, delta } => self.drag_move(piece, delta),
            Command::DragEnd { piece } => self.drag_end(piece),
            Command::Rotate { piece, angle } => self.rotate(piece, angle),
            Command::Detach { piece } => self.detach(piece),
            Command::BringToFront { piece } => self.bring_to_front(piece),
            Command::SetZoom { zoom } => self.set_zoom(zoom),
        };
        if outcome.is_ignored() {
            log::trace!("ignored {command:?}");
        }
        self.commands.record(command, outcome);
        self.events.deliver();
        outcome
    }

    /// Apply several commands in order, returning each outcome.
    pub fn apply_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Vec<CommandOutcome> {
        commands.into_iter().map(|c| self.apply(c)).collect()
    }

    fn begin_drag(&mut self, piece: PieceId, detach: bool) -> CommandOutcome {
        if !self.table.contains(piece) {
            return CommandOutcome::Ignored;
        }
        if detach {
            // A refused detach leaves the piece in its group; the drag goes on.
            self.groups.detach_piece(self.table.pieces_mut(), piece);
            self.flush_group_changes();
            self.check_completion();
        }
        if let Some((_, members)) = self.members_of(piece) {
            self.table.bring_to_front(&members);
        }
        self.drag = Some(piece);
        CommandOutcome::Applied
    }

    fn drag_move(&mut self, piece: PieceId, delta: Point) -> CommandOutcome {
        if !delta.is_finite() {
            return CommandOutcome::Ignored;
        }
        let Some((group, members)) = self.members_of(piece) else {
            return CommandOutcome::Ignored;
        };
        self.table.move_group(&members, delta);
        self.drag = Some(piece);

        let ctx = MatchContext::new(&self.table, &self.config.matching, self.zoom);
        let targets = highlight_candidates(&ctx, &self.groups, group);
        self.set_highlight((!targets.is_empty()).then_some(targets));
        CommandOutcome::Applied
    }

    fn drag_end(&mut self, piece: PieceId) -> CommandOutcome {
        let Some((group, members)) = self.members_of(piece) else {
            return CommandOutcome::Ignored;
        };
        self.drag = None;

        let ctx = MatchContext::new(&self.table, &self.config.matching, self.zoom);
        let best = find_group_candidate(&ctx, &self.groups, group).filter(|m| {
            let neighbors = m.is_lattice_neighbor(&self.table);
            if !neighbors {
                log::debug!("{} fits {} but they are not neighbors", m.moving, m.stationary);
            }
            neighbors
        });
        let mut outcome = CommandOutcome::Applied;

        if let Some(m) = best {
            let delta = alignment_delta(&self.table, &m).unwrap_or(Point::ZERO);
            self.table.move_group(&members, delta);
            if self.snapped_pair_touches(&m) {
                self.groups
                    .merge_groups(self.table.pieces_mut(), m.moving, m.stationary);
                self.flush_group_changes();

                self.chain_merge(piece);
                let group = self.group_of(piece).unwrap_or(group);
                self.events.emit(Event::PiecesConnected {
                    moving: m.moving,
                    stationary: m.stationary,
                    group,
                });
                outcome = CommandOutcome::Connected {
                    moving: m.moving,
                    stationary: m.stationary,
                    group,
                };
            } else {
                // Aligned one corner only; the pieces are turned against each
                // other. Put the group back where it was dropped.
                self.table.move_group(&members, -delta);
                log::debug!(
                    "{} fits {} but their corners do not meet; not snapping",
                    m.moving,
                    m.stationary
                );
            }
        }

        self.set_highlight(None);
        self.check_completion();
        outcome
    }

    /// Whether both shared corners of a matched pair meet within the
    /// connectivity tolerance.
    fn snapped_pair_touches(&self, m: &Match) -> bool {
        match (self.table.piece(m.moving), self.table.piece(m.stationary)) {
            (Some(a), Some(b)) => pieces_joined(a, b, self.groups.connectivity()),
            _ => false,
        }
    }

    /// After a snap, merge every loose neighbor that already touches the
    /// grown group. Nothing moves.
    fn chain_merge(&mut self, piece: PieceId) {
        loop {
            let Some(group) = self.group_of(piece) else {
                return;
            };
            let pieces = self.table.pieces();
            let (cols, rows) = (self.table.cols(), self.table.rows());
            let connectivity = self.groups.connectivity();
            let mut joins = Vec::new();
            for member in self.groups.border_pieces(pieces, group) {
                let here = &pieces[member.index()];
                for side in Side::ALL {
                    let Some(coord) = here.grid().neighbor(side, cols, rows) else {
                        continue;
                    };
                    let other = PieceId(coord.row * cols + coord.col);
                    let Some(there) = pieces.get(other.index()) else {
                        continue;
                    };
                    if there.group() != group && pieces_joined(here, there, connectivity) {
                        joins.push((member, other));
                    }
                }
            }
            if joins.is_empty() {
                return;
            }
            let before = self.groups.group_count();
            for (member, other) in joins {
                self.groups
                    .merge_groups(self.table.pieces_mut(), member, other);
            }
            self.flush_group_changes();
            if self.groups.group_count() == before {
                return;
            }
        }
    }

    fn rotate(&mut self, piece: PieceId, angle: f32) -> CommandOutcome {
        if !self.spec.rotation_enabled || !angle.is_finite() {
            return CommandOutcome::Ignored;
        }
        let Some((_, members)) = self.members_of(piece) else {
            return CommandOutcome::Ignored;
        };
        self.table.rotate_group(&members, angle, piece);
        CommandOutcome::Applied
    }

    fn detach(&mut self, piece: PieceId) -> CommandOutcome {
        if !self.table.contains(piece) {
            return CommandOutcome::Ignored;
        }
        let Some(group) = self.groups.detach_piece(self.table.pieces_mut(), piece) else {
            return CommandOutcome::Ignored;
        };
        self.flush_group_changes();
        self.check_completion();
        CommandOutcome::Detached { group }
    }

    fn bring_to_front(&mut self, piece: PieceId) -> CommandOutcome {
        let Some((_, members)) = self.members_of(piece) else {
            return CommandOutcome::Ignored;
        };
        match self.table.bring_to_front(&members) {
            Some(_) => CommandOutcome::Applied,
            None => CommandOutcome::Ignored,
        }
    }

    fn set_zoom(&mut self, zoom: f32) -> CommandOutcome {
        if !(zoom.is_finite() && zoom > 0.0) {
            return CommandOutcome::Ignored;
        }
        self.zoom = zoom;
        CommandOutcome::Applied
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The group of `piece` and its members in id order.
    fn members_of(&self, piece: PieceId) -> Option<(GroupId, Vec<PieceId>)> {
        let group = self.groups.group_for_piece(self.table.pieces(), piece)?;
        Some((group.id(), group.members().iter().copied().collect()))
    }

    fn flush_group_changes(&mut self) {
        for change in self.groups.take_changes() {
            let event = match change {
                GroupChange::Merged { from, into } => Event::GroupsMerged { from, into },
                GroupChange::Detached {
                    piece,
                    new_group,
                    fragments,
                } => Event::PieceDetached {
                    piece,
                    new_group,
                    fragments,
                },
            };
            self.events.emit(event);
        }
    }

    fn set_highlight(&mut self, highlight: Option<Vec<PieceId>>) {
        if self.highlight == highlight {
            return;
        }
        self.highlight = highlight.clone();
        self.events
            .emit(Event::HighlightChanged { stationary: highlight });
    }

    fn check_completion(&mut self) {
        let solved = self.groups.group_count() == 1;
        if solved && !self.completed {
            if let Some(group) = self.groups.groups().next() {
                log::debug!("puzzle completed as {}", group.id());
                self.events.emit(Event::PuzzleCompleted { group: group.id() });
            }
        }
        self.completed = solved;
    }
}
