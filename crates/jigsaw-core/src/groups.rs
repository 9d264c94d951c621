//! Partition of pieces into connected groups.
//!
//! Every piece belongs to exactly one group. A group's members always form a
//! single connected component, where two pieces are connected when they are
//! neighbors in the solved grid *and* their shared corners coincide in world
//! space (within [`ConnectivityConfig::tolerance`]).
//!
//! The manager does not emit events directly. Topology changes are buffered
//! as [`GroupChange`]s and drained by the session with
//! [`GroupManager::take_changes`].

use crate::config::ConnectivityConfig;
use crate::id::{GroupId, PieceId};
use crate::piece::{GridCoord, Piece, Side};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Range;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    members: BTreeSet<PieceId>,
}

impl Group {
    fn new(id: GroupId, members: BTreeSet<PieceId>) -> Self {
        Self { id, members }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn members(&self) -> &BTreeSet<PieceId> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, piece: PieceId) -> bool {
        self.members.contains(&piece)
    }
}

/// A topology change, recorded in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    Merged {
        from: GroupId,
        into: GroupId,
    },
    Detached {
        piece: PieceId,
        new_group: GroupId,
        fragments: Vec<GroupId>,
    },
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Whether two pieces are grid neighbors whose shared corners touch.
pub fn pieces_joined(a: &Piece, b: &Piece, config: &ConnectivityConfig) -> bool {
    let Some(side) = a.grid().side_towards(&b.grid()) else {
        return false;
    };
    let tolerance = config.tolerance((a.scale() + b.scale()) / 2.0);
    let tol_sq = tolerance * tolerance;
    let ga = a.world_geometry();
    let gb = b.world_geometry();
    side.touching_corners()
        .into_iter()
        .all(|(own, theirs)| ga.corner(own).distance_sq(gb.corner(theirs)) <= tol_sq)
}

/// Split `members` into connected components. Components come back ordered
/// by their smallest piece id; ids without a piece are skipped.
pub fn connected_components(
    pieces: &[Piece],
    members: &BTreeSet<PieceId>,
    config: &ConnectivityConfig,
) -> Vec<BTreeSet<PieceId>> {
    let by_grid: HashMap<GridCoord, PieceId> = members
        .iter()
        .filter_map(|&id| pieces.get(id.index()).map(|p| (p.grid(), id)))
        .collect();

    let mut seen: BTreeSet<PieceId> = BTreeSet::new();
    let mut components = Vec::new();
    for &start in members {
        if seen.contains(&start) || pieces.get(start.index()).is_none() {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(id) = queue.pop_front() {
            component.insert(id);
            let piece = &pieces[id.index()];
            for side in Side::ALL {
                let (dc, dr) = side.offset();
                let col = i64::from(piece.grid().col) + dc;
                let row = i64::from(piece.grid().row) + dr;
                if col < 0 || row < 0 {
                    continue;
                }
                let coord = GridCoord::new(col as u32, row as u32);
                let Some(&next) = by_grid.get(&coord) else {
                    continue;
                };
                if seen.contains(&next) {
                    continue;
                }
                if pieces_joined(piece, &pieces[next.index()], config) {
                    seen.insert(next);
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }
    components
}

// ---------------------------------------------------------------------------
// GroupManager
// ---------------------------------------------------------------------------

/// Owns the group registry. Piece group fields are written only from here.
#[derive(Debug, Clone)]
pub struct GroupManager {
    groups: BTreeMap<GroupId, Group>,
    next_group_id: u32,
    connectivity: ConnectivityConfig,
    changes: Vec<GroupChange>,
}

impl GroupManager {
    pub fn new(connectivity: ConnectivityConfig) -> Self {
        Self {
            groups: BTreeMap::new(),
            next_group_id: 0,
            connectivity,
            changes: Vec::new(),
        }
    }

    /// Register one singleton group per piece, in id order.
    pub fn with_singletons(pieces: &mut [Piece], connectivity: ConnectivityConfig) -> Self {
        let mut manager = Self::new(connectivity);
        for piece in pieces.iter_mut() {
            let Some(id) = manager.allocate_id() else {
                log::warn!("group ids exhausted at {}", piece.id());
                break;
            };
            manager.register(piece, id);
        }
        manager
    }

    /// Claim `count` consecutive ids, or `None` if the id space would run out.
    fn reserve_ids(&mut self, count: u32) -> Option<Range<u32>> {
        let start = self.next_group_id;
        let end = start.checked_add(count)?;
        self.next_group_id = end;
        Some(start..end)
    }

    fn allocate_id(&mut self) -> Option<GroupId> {
        self.reserve_ids(1).map(|ids| GroupId(ids.start))
    }

    fn register(&mut self, piece: &mut Piece, id: GroupId) {
        piece.set_group(id);
        self.groups
            .insert(id, Group::new(id, BTreeSet::from([piece.id()])));
    }

    // -- Queries --

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// The group a piece belongs to, if the piece and its group exist.
    pub fn group_for_piece(&self, pieces: &[Piece], piece: PieceId) -> Option<&Group> {
        let piece = pieces.get(piece.index())?;
        self.groups.get(&piece.group())
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn largest_group_size(&self) -> usize {
        self.groups.values().map(Group::len).max().unwrap_or(0)
    }

    /// The id the next created group will get.
    pub fn next_group_id(&self) -> GroupId {
        GroupId(self.next_group_id)
    }

    pub fn connectivity(&self) -> &ConnectivityConfig {
        &self.connectivity
    }

    /// Members of `group` with fewer than four joined neighbors inside it.
    /// These are the only members that can gain a connection.
    pub fn border_pieces(&self, pieces: &[Piece], group: GroupId) -> Vec<PieceId> {
        let Some(group) = self.groups.get(&group) else {
            return Vec::new();
        };
        let by_grid: HashMap<GridCoord, PieceId> = group
            .members
            .iter()
            .filter_map(|&id| pieces.get(id.index()).map(|p| (p.grid(), id)))
            .collect();

        group
            .members
            .iter()
            .copied()
            .filter(|&id| {
                let Some(piece) = pieces.get(id.index()) else {
                    return false;
                };
                let joined = Side::ALL
                    .into_iter()
                    .filter_map(|side| {
                        let (dc, dr) = side.offset();
                        let col = u32::try_from(i64::from(piece.grid().col) + dc).ok()?;
                        let row = u32::try_from(i64::from(piece.grid().row) + dr).ok()?;
                        by_grid.get(&GridCoord::new(col, row))
                    })
                    .filter(|&&other| {
                        pieces_joined(piece, &pieces[other.index()], &self.connectivity)
                    })
                    .count();
                joined < 4
            })
            .collect()
    }

    /// Whether the given pieces form one connected component. Empty and
    /// singleton sets are connected.
    pub fn is_connected(&self, pieces: &[Piece], members: &BTreeSet<PieceId>) -> bool {
        connected_components(pieces, members, &self.connectivity).len() <= 1
    }

    /// Connected components of `members`, ordered by smallest piece id.
    pub fn components(&self, pieces: &[Piece], members: &BTreeSet<PieceId>) -> Vec<BTreeSet<PieceId>> {
        connected_components(pieces, members, &self.connectivity)
    }

    // -- Mutations --

    /// Put `piece` in a fresh singleton group.
    ///
    /// A piece that already sits alone keeps its group. A piece that shares a
    /// registered group is detached, so the group it leaves stays connected.
    pub fn create_single_piece_group(&mut self, pieces: &mut [Piece], piece: PieceId) -> Option<GroupId> {
        let current = pieces.get(piece.index())?.group();
        match self.groups.get(&current) {
            Some(group) if group.contains(piece) => self.detach_piece(pieces, piece),
            _ => {
                let id = self.allocate_id()?;
                self.register(&mut pieces[piece.index()], id);
                Some(id)
            }
        }
    }

    /// Merge the groups of `a` and `b`.
    ///
    /// Returns `true` if they already share a group, `false` if either piece
    /// or its group is unknown. The smaller group is absorbed into the larger;
    /// on a tie `a`'s group survives.
    pub fn merge_groups(&mut self, pieces: &mut [Piece], a: PieceId, b: PieceId) -> bool {
        let (Some(pa), Some(pb)) = (pieces.get(a.index()), pieces.get(b.index())) else {
            return false;
        };
        let (ga, gb) = (pa.group(), pb.group());
        if ga == gb {
            return self.groups.contains_key(&ga);
        }
        let (Some(size_a), Some(size_b)) = (
            self.groups.get(&ga).map(Group::len),
            self.groups.get(&gb).map(Group::len),
        ) else {
            log::warn!("merge of {a} and {b} refused: group registry out of sync");
            return false;
        };

        let (into, from) = if size_b > size_a { (gb, ga) } else { (ga, gb) };
        let Some(absorbed) = self.groups.remove(&from) else {
            return false;
        };
        for &member in &absorbed.members {
            if let Some(piece) = pieces.get_mut(member.index()) {
                piece.set_group(into);
            }
        }
        if let Some(target) = self.groups.get_mut(&into) {
            target.members.extend(absorbed.members);
        }
        log::debug!("merged {from} into {into}");
        self.changes.push(GroupChange::Merged { from, into });
        true
    }

    /// Take `piece` out of its group into a new singleton.
    ///
    /// A piece already alone keeps its group and nothing is recorded. If the
    /// remainder falls apart, the largest component keeps the old id (ties go
    /// to the component holding the smallest piece id) and every other
    /// component gets a new group. Returns `None` without mutating anything
    /// when the piece is unknown, the registry disagrees with it, or the
    /// group id space is used up.
    pub fn detach_piece(&mut self, pieces: &mut [Piece], piece: PieceId) -> Option<GroupId> {
        let old = pieces.get(piece.index())?.group();
        let Some(group) = self.groups.get(&old) else {
            log::warn!("cannot detach {piece}: {old} is not registered");
            return None;
        };
        if !group.contains(piece) {
            log::warn!("cannot detach {piece}: not a member of {old}");
            return None;
        }
        if group.len() == 1 {
            return Some(old);
        }

        let mut remainder = group.members.clone();
        remainder.remove(&piece);
        let mut components = connected_components(pieces, &remainder, &self.connectivity);
        if components.is_empty() {
            log::warn!("cannot detach {piece}: {old} lists no other live pieces");
            return None;
        }

        // One id per split-off component plus one for the detached piece.
        let Some(ids) = u32::try_from(components.len())
            .ok()
            .and_then(|count| self.reserve_ids(count))
        else {
            log::warn!("cannot detach {piece}: group ids exhausted");
            return None;
        };

        let mut keep = 0;
        for (i, component) in components.iter().enumerate() {
            if component.len() > components[keep].len() {
                keep = i;
            }
        }
        let kept = components.swap_remove(keep);
        // swap_remove moved the last component into `keep`; restore id order.
        components.sort_by_key(|c| c.first().copied());

        let new_group = GroupId(ids.end - 1);
        let mut fragments = Vec::with_capacity(components.len());
        for (component, raw) in components.into_iter().zip(ids) {
            let id = GroupId(raw);
            for &member in &component {
                pieces[member.index()].set_group(id);
            }
            self.groups.insert(id, Group::new(id, component));
            fragments.push(id);
        }
        if let Some(group) = self.groups.get_mut(&old) {
            group.members = kept;
        }

        self.register(&mut pieces[piece.index()], new_group);

        log::debug!(
            "detached {piece} from {old} into {new_group} ({} fragments)",
            fragments.len()
        );
        self.changes.push(GroupChange::Detached {
            piece,
            new_group,
            fragments,
        });
        Some(new_group)
    }

    /// Rebuild the registry from each piece's group field. The next created
    /// group gets `max(existing id) + 1`. Pending changes are dropped.
    pub fn rebuild_from_pieces(&mut self, pieces: &[Piece]) {
        self.groups.clear();
        self.changes.clear();
        for piece in pieces {
            let id = piece.group();
            self.groups
                .entry(id)
                .or_insert_with(|| Group::new(id, BTreeSet::new()))
                .members
                .insert(piece.id());
        }
        self.next_group_id = self
            .groups
            .keys()
            .next_back()
            .map_or(0, |id| id.0.saturating_add(1));
        log::debug!(
            "rebuilt {} groups, next id {}",
            self.groups.len(),
            self.next_group_id
        );
    }

    /// Drain the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<GroupChange> {
        std::mem::take(&mut self.changes)
    }

    /// Check the registry against the pieces: every piece points at a
    /// registered group that lists it, no group is empty or lists a piece
    /// that points elsewhere, and every group is connected.
    pub fn validate(&self, pieces: &[Piece]) -> bool {
        for piece in pieces {
            match self.groups.get(&piece.group()) {
                Some(group) if group.contains(piece.id()) => {}
                _ => return false,
            }
        }
        self.groups.values().all(|group| {
            !group.is_empty()
                && group.members.iter().all(|&m| {
                    pieces
                        .get(m.index())
                        .is_some_and(|p| p.group() == group.id)
                })
                && self.is_connected(pieces, &group.members)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::test_utils::{assemble, line_pieces, solved_pieces};

    fn manager(pieces: &mut [Piece]) -> GroupManager {
        GroupManager::with_singletons(pieces, ConnectivityConfig::default())
    }

    fn ids(raw: &[u32]) -> BTreeSet<PieceId> {
        raw.iter().map(|&i| PieceId(i)).collect()
    }

    #[test]
    fn singletons_per_piece() {
        let mut pieces = line_pieces(5);
        let groups = manager(&mut pieces);
        assert_eq!(groups.group_count(), 5);
        assert_eq!(groups.next_group_id(), GroupId(5));
        for piece in &pieces {
            assert_eq!(groups.group(piece.group()).unwrap().len(), 1);
        }
        assert!(groups.validate(&pieces));
    }

    #[test]
    fn joined_needs_grid_adjacency_and_touching_corners() {
        let mut pieces = line_pieces(3);
        assemble(&mut pieces);
        let config = ConnectivityConfig::default();
        assert!(pieces_joined(&pieces[0], &pieces[1], &config));
        assert!(!pieces_joined(&pieces[0], &pieces[2], &config));

        let far = pieces[1].position() + Point::new(500.0, 0.0);
        pieces[1].set_position(far);
        assert!(!pieces_joined(&pieces[0], &pieces[1], &config));
    }

    #[test]
    fn merge_absorbs_smaller_group() {
        let mut pieces = line_pieces(3);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);

        assert!(groups.merge_groups(&mut pieces, PieceId(1), PieceId(2)));
        assert_eq!(pieces[2].group(), GroupId(1));
        // {0} is smaller than {1,2}, so it is absorbed even though named first.
        assert!(groups.merge_groups(&mut pieces, PieceId(0), PieceId(1)));
        assert_eq!(groups.group_count(), 1);
        assert!(pieces.iter().all(|p| p.group() == GroupId(1)));

        let changes = groups.take_changes();
        assert_eq!(
            changes,
            vec![
                GroupChange::Merged { from: GroupId(2), into: GroupId(1) },
                GroupChange::Merged { from: GroupId(0), into: GroupId(1) },
            ]
        );
        assert!(groups.take_changes().is_empty());
        assert!(groups.validate(&pieces));
    }

    #[test]
    fn merge_same_group_is_idempotent() {
        let mut pieces = line_pieces(2);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);
        assert!(groups.merge_groups(&mut pieces, PieceId(0), PieceId(1)));
        groups.take_changes();
        assert!(groups.merge_groups(&mut pieces, PieceId(1), PieceId(0)));
        assert_eq!(groups.group_count(), 1);
        assert!(groups.take_changes().is_empty());
    }

    #[test]
    fn merge_unknown_piece_fails() {
        let mut pieces = line_pieces(2);
        let mut groups = manager(&mut pieces);
        assert!(!groups.merge_groups(&mut pieces, PieceId(0), PieceId(9)));
        assert_eq!(groups.group_count(), 2);
    }

    #[test]
    fn detach_singleton_returns_existing_group() {
        let mut pieces = line_pieces(2);
        let mut groups = manager(&mut pieces);
        assert_eq!(groups.detach_piece(&mut pieces, PieceId(1)), Some(GroupId(1)));
        assert!(groups.take_changes().is_empty());
        assert_eq!(groups.next_group_id(), GroupId(2));
    }

    #[test]
    fn detach_middle_of_line_fragments() {
        let mut pieces = line_pieces(5);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);
        for i in 1..5 {
            assert!(groups.merge_groups(&mut pieces, PieceId(0), PieceId(i)));
        }
        assert_eq!(groups.group_count(), 1);
        groups.take_changes();

        let new_group = groups.detach_piece(&mut pieces, PieceId(2)).unwrap();
        assert_eq!(groups.group_count(), 3);
        assert_eq!(groups.group(new_group).unwrap().members(), &ids(&[2]));
        // Both halves tie; the half holding piece 0 keeps the original id.
        assert_eq!(groups.group(GroupId(0)).unwrap().members(), &ids(&[0, 1]));
        let other = pieces[3].group();
        assert_eq!(groups.group(other).unwrap().members(), &ids(&[3, 4]));
        assert_eq!(pieces[4].group(), other);

        assert_eq!(
            groups.take_changes(),
            vec![GroupChange::Detached {
                piece: PieceId(2),
                new_group,
                fragments: vec![other],
            }]
        );
        assert!(groups.validate(&pieces));
    }

    #[test]
    fn detach_end_keeps_remainder_whole() {
        let mut pieces = line_pieces(4);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);
        for i in 1..4 {
            groups.merge_groups(&mut pieces, PieceId(0), PieceId(i));
        }
        groups.detach_piece(&mut pieces, PieceId(0)).unwrap();
        assert_eq!(groups.group_count(), 2);
        assert_eq!(groups.group(GroupId(0)).unwrap().members(), &ids(&[1, 2, 3]));
        assert!(groups.validate(&pieces));
    }

    #[test]
    fn detach_with_stale_group_field_is_refused() {
        let mut pieces = line_pieces(3);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);
        groups.merge_groups(&mut pieces, PieceId(0), PieceId(1));
        pieces[1].set_group(GroupId(42));
        assert_eq!(groups.detach_piece(&mut pieces, PieceId(1)), None);
        assert_eq!(groups.group(GroupId(0)).unwrap().len(), 2);
        assert!(!groups.validate(&pieces));
    }

    #[test]
    fn border_pieces_of_solved_block() {
        let mut pieces = solved_pieces(3, 3);
        let mut groups = manager(&mut pieces);
        for i in 1..9 {
            groups.merge_groups(&mut pieces, PieceId(0), PieceId(i));
        }
        let border = groups.border_pieces(&pieces, GroupId(0));
        // Only the center piece has four joined neighbors.
        assert_eq!(border.len(), 8);
        assert!(!border.contains(&PieceId(4)));
        assert!(groups.border_pieces(&pieces, GroupId(77)).is_empty());
    }

    #[test]
    fn connectivity_of_sets() {
        let mut pieces = line_pieces(4);
        assemble(&mut pieces);
        let groups = manager(&mut pieces);
        assert!(groups.is_connected(&pieces, &BTreeSet::new()));
        assert!(groups.is_connected(&pieces, &ids(&[3])));
        assert!(groups.is_connected(&pieces, &ids(&[0, 1, 2])));
        assert!(!groups.is_connected(&pieces, &ids(&[0, 2])));
        assert_eq!(groups.components(&pieces, &ids(&[0, 1, 3])).len(), 2);
    }

    #[test]
    fn rebuild_recovers_next_id() {
        let mut pieces = line_pieces(3);
        assemble(&mut pieces);
        pieces[0].set_group(GroupId(7));
        pieces[1].set_group(GroupId(7));
        pieces[2].set_group(GroupId(3));
        let mut groups = GroupManager::new(ConnectivityConfig::default());
        groups.rebuild_from_pieces(&pieces);
        assert_eq!(groups.group_count(), 2);
        assert_eq!(groups.next_group_id(), GroupId(8));
        assert!(groups.validate(&pieces));
    }

    #[test]
    fn create_single_piece_group_detaches_members() {
        let mut pieces = line_pieces(3);
        assemble(&mut pieces);
        let mut groups = manager(&mut pieces);
        groups.merge_groups(&mut pieces, PieceId(0), PieceId(1));
        let fresh = groups.create_single_piece_group(&mut pieces, PieceId(1)).unwrap();
        assert_eq!(groups.group(fresh).unwrap().members(), &ids(&[1]));
        assert!(groups.validate(&pieces));
        assert_eq!(groups.create_single_piece_group(&mut pieces, PieceId(1)), Some(fresh));
    }

    #[test]
    fn detach_refuses_when_ids_run_out() {
        for top in [u32::MAX - 1, u32::MAX] {
            let mut pieces = solved_pieces(3, 1);
            for piece in &mut pieces {
                piece.set_group(GroupId(top));
            }
            let mut groups = GroupManager::new(ConnectivityConfig::default());
            groups.rebuild_from_pieces(&pieces);

            assert_eq!(groups.next_group_id(), GroupId(u32::MAX));
            assert_eq!(groups.detach_piece(&mut pieces, PieceId(1)), None);
            assert_eq!(groups.detach_piece(&mut pieces, PieceId(0)), None);
            assert_eq!(groups.create_single_piece_group(&mut pieces, PieceId(2)), None);
            assert_eq!(groups.group_count(), 1);
            assert!(pieces.iter().all(|p| p.group() == GroupId(top)));
            assert!(groups.take_changes().is_empty());
            assert!(groups.validate(&pieces));
        }
    }
}
