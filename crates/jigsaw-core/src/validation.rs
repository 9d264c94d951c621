//! Consistency checks across pieces, groups and the spatial index, plus a
//! piece-level diff between two sessions for determinism testing.

use crate::groups::GroupManager;
use crate::id::{GroupId, PieceId};
use crate::serialize::PieceState;
use crate::session::Session;
use crate::table::Table;
use jigsaw_spatial::CellCoord;

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityIssue {
    /// The piece points at a group that is not registered.
    MissingGroup { piece: PieceId, group: GroupId },
    /// The piece points at a group that does not list it.
    NotAMember { piece: PieceId, group: GroupId },
    /// The group lists a piece that is unknown or points elsewhere.
    StrayMember { group: GroupId, piece: PieceId },
    EmptyGroup(GroupId),
    /// The group's members split into `components` connected pieces.
    Disconnected { group: GroupId, components: usize },
    NonFinitePosition(PieceId),
    /// The piece has no spatial index entry.
    Unindexed(PieceId),
    /// The index files the piece under a cell its position does not map to.
    StaleIndex {
        piece: PieceId,
        indexed: CellCoord,
        actual: CellCoord,
    },
    /// The index holds more entries than there are pieces.
    ExtraIndexEntries { indexed: usize, pieces: usize },
    /// Cached world geometry disagrees with the piece's transform.
    StaleGeometry(PieceId),
}

/// Registry problems: pieces against groups, groups against pieces, and
/// group connectivity.
pub fn check_groups(table: &Table, groups: &GroupManager) -> Vec<IntegrityIssue> {
    let pieces = table.pieces();
    let mut issues = Vec::new();

    for piece in pieces {
        match groups.group(piece.group()) {
            None => issues.push(IntegrityIssue::MissingGroup {
                piece: piece.id(),
                group: piece.group(),
            }),
            Some(group) if !group.contains(piece.id()) => {
                issues.push(IntegrityIssue::NotAMember {
                    piece: piece.id(),
                    group: piece.group(),
                })
            }
            Some(_) => {}
        }
    }

    for group in groups.groups() {
        if group.is_empty() {
            issues.push(IntegrityIssue::EmptyGroup(group.id()));
            continue;
        }
        for &member in group.members() {
            if table.piece(member).is_none_or(|p| p.group() != group.id()) {
                issues.push(IntegrityIssue::StrayMember {
                    group: group.id(),
                    piece: member,
                });
            }
        }
        let components = groups.components(pieces, group.members()).len();
        if components > 1 {
            issues.push(IntegrityIssue::Disconnected {
                group: group.id(),
                components,
            });
        }
    }
    issues
}

/// Spatial index and geometry cache against piece transforms.
pub fn check_table(table: &Table) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();
    let index = table.index();

    for piece in table.pieces() {
        let id = piece.id();
        let position = piece.position();
        if !position.is_finite() {
            issues.push(IntegrityIssue::NonFinitePosition(id));
            continue;
        }
        let actual = index.cell_for(position.x, position.y);
        match index.cell_of(id) {
            None => issues.push(IntegrityIssue::Unindexed(id)),
            Some(indexed) if indexed != actual => issues.push(IntegrityIssue::StaleIndex {
                piece: id,
                indexed,
                actual,
            }),
            Some(_) => {}
        }
        if table.geometry_cache().is_cached(id)
            && table.world_geometry(id) != Some(piece.world_geometry())
        {
            issues.push(IntegrityIssue::StaleGeometry(id));
        }
    }

    if index.len() > table.len() {
        issues.push(IntegrityIssue::ExtraIndexEntries {
            indexed: index.len(),
            pieces: table.len(),
        });
    }
    issues
}

/// Every problem found in a session.
pub fn check_integrity(session: &Session) -> Vec<IntegrityIssue> {
    let mut issues = check_groups(session.table(), session.groups());
    issues.extend(check_table(session.table()));
    for issue in &issues {
        log::warn!("integrity: {issue:?}");
    }
    issues
}

pub fn is_valid(session: &Session) -> bool {
    check_integrity(session).is_empty()
}

// ---------------------------------------------------------------------------
// Session diff
// ---------------------------------------------------------------------------

/// A piece whose state differs between two sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceDiff {
    pub piece: PieceId,
    pub a: Option<PieceState>,
    pub b: Option<PieceState>,
}

/// Pieces whose position, rotation, group or z differ. Pieces present in
/// only one session are reported with the other side `None`.
pub fn diff_sessions(a: &Session, b: &Session) -> Vec<PieceDiff> {
    let len = a.table().len().max(b.table().len());
    (0..len as u32)
        .map(PieceId)
        .filter_map(|id| {
            let sa = a.table().piece(id).map(PieceState::from);
            let sb = b.table().piece(id).map(PieceState::from);
            (sa != sb).then_some(PieceDiff {
                piece: id,
                a: sa,
                b: sb,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::config::{ConnectivityConfig, SpatialConfig};
    use crate::geometry::Point;
    use crate::test_utils::{flat_session, grid_pieces, solved_pieces};

    #[test]
    fn fresh_session_is_valid() {
        let session = flat_session(11);
        assert!(check_integrity(&session).is_empty());
        assert!(is_valid(&session));
    }

    #[test]
    fn registry_mismatch_reported() {
        let mut pieces = solved_pieces(3, 1);
        let mut groups = GroupManager::with_singletons(&mut pieces, ConnectivityConfig::default());
        groups.merge_groups(&mut pieces, PieceId(0), PieceId(1));
        pieces[2].set_group(GroupId(0));
        let table = Table::new(pieces, 3, 1, &SpatialConfig::default());

        let issues = check_groups(&table, &groups);
        assert!(issues.contains(&IntegrityIssue::NotAMember {
            piece: PieceId(2),
            group: GroupId(0),
        }));
        assert!(issues.contains(&IntegrityIssue::StrayMember {
            group: GroupId(2),
            piece: PieceId(2),
        }));
    }

    #[test]
    fn disconnected_group_reported() {
        let mut pieces = grid_pieces(3, 1);
        let mut groups = GroupManager::with_singletons(&mut pieces, ConnectivityConfig::default());
        // Spread apart, so the merged pieces do not touch.
        groups.merge_groups(&mut pieces, PieceId(0), PieceId(2));
        let table = Table::new(pieces, 3, 1, &SpatialConfig::default());
        assert_eq!(
            check_groups(&table, &groups),
            vec![IntegrityIssue::Disconnected {
                group: GroupId(0),
                components: 2,
            }]
        );
    }

    #[test]
    fn table_checks_pass_after_moves() {
        let mut table = Table::new(grid_pieces(2, 2), 2, 2, &SpatialConfig::default());
        table.world_geometry(PieceId(3));
        table.move_group(&[PieceId(0), PieceId(3)], Point::new(-750.0, 320.0));
        table.world_geometry(PieceId(3));
        assert!(check_table(&table).is_empty());
    }

    #[test]
    fn diff_finds_moved_pieces() {
        let a = flat_session(12);
        let mut b = flat_session(12);
        assert!(diff_sessions(&a, &b).is_empty());

        b.apply(Command::DragMove {
            piece: PieceId(5),
            delta: Point::new(3.0, 0.0),
        });
        let diffs = diff_sessions(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].piece, PieceId(5));
    }
}
