//! Progress statistics derived from the group partition.

use crate::groups::GroupManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PuzzleStats {
    pub piece_count: usize,
    pub group_count: usize,
    pub largest_group: usize,
    /// `piece_count - (group_count - 1)`: 1 with every piece loose,
    /// `piece_count` when solved.
    pub score: usize,
    /// Joins made out of joins needed, in `[0, 100]`.
    pub percent_complete: f32,
    pub completed: bool,
}

impl PuzzleStats {
    pub fn from_counts(piece_count: usize, group_count: usize, largest_group: usize) -> Self {
        let joins_made = piece_count.saturating_sub(group_count);
        let joins_needed = piece_count.saturating_sub(1);
        let percent_complete = if joins_needed == 0 {
            100.0
        } else {
            joins_made as f32 / joins_needed as f32 * 100.0
        };
        Self {
            piece_count,
            group_count,
            largest_group,
            score: joins_made + 1,
            percent_complete,
            completed: piece_count > 0 && group_count == 1,
        }
    }

    pub fn compute(piece_count: usize, groups: &GroupManager) -> Self {
        Self::from_counts(piece_count, groups.group_count(), groups.largest_group_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_loose() {
        let stats = PuzzleStats::from_counts(20, 20, 1);
        assert_eq!(stats.score, 1);
        assert_eq!(stats.percent_complete, 0.0);
        assert!(!stats.completed);
    }

    #[test]
    fn solved() {
        let stats = PuzzleStats::from_counts(20, 1, 20);
        assert_eq!(stats.score, 20);
        assert_eq!(stats.percent_complete, 100.0);
        assert!(stats.completed);
    }

    #[test]
    fn halfway() {
        let stats = PuzzleStats::from_counts(5, 3, 2);
        assert_eq!(stats.score, 3);
        assert_eq!(stats.percent_complete, 50.0);
    }
}
