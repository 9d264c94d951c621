//! Session snapshots.
//!
//! A snapshot stores the [`PuzzleSpec`] (enough to regenerate every piece's
//! geometry deterministically) plus the mutable state of each piece. Binary
//! form is `bitcode` with a versioned header.

use crate::geometry::Point;
use crate::id::{GroupId, PieceId};
use crate::lattice::{GenerateError, PuzzleSpec};
use crate::piece::Piece;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a jigsaw session snapshot ("JIGS").
pub const SNAPSHOT_MAGIC: u32 = 0x4A49_4753;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Reasons a decoded snapshot cannot become a session.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Header(#[from] DeserializeError),
    #[error("cannot regenerate pieces: {0}")]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("header announces {announced} pieces, snapshot holds {found}")]
    HeaderCountMismatch { announced: u32, found: usize },
    #[error("snapshot has {found} pieces, the puzzle has {expected}")]
    PieceCountMismatch { expected: usize, found: usize },
    #[error("{0} is out of range")]
    PieceOutOfRange(PieceId),
    #[error("{0} appears more than once")]
    DuplicatePiece(PieceId),
    #[error("{0} has a non-finite position")]
    NonFinitePosition(PieceId),
    #[error("{piece} has rotation {rotation}, expected a value in [0, 360)")]
    InvalidRotation { piece: PieceId, rotation: f32 },
    #[error("{piece} is in {group}, above the last usable group id")]
    GroupIdOutOfRange { piece: PieceId, group: GroupId },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub piece_count: u32,
}

impl SnapshotHeader {
    pub fn new(piece_count: u32) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            piece_count,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Highest group id a snapshot of `piece_count` pieces may carry. Leaves
/// room for every piece to be detached once without running out of ids.
pub fn max_group_id(piece_count: usize) -> u32 {
    let reserve = u32::try_from(piece_count).unwrap_or(u32::MAX);
    u32::MAX.saturating_sub(reserve).saturating_sub(1)
}

/// Mutable state of one piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceState {
    pub id: PieceId,
    pub position: Point,
    pub rotation: f32,
    pub group: GroupId,
    pub z: u32,
}

impl From<&Piece> for PieceState {
    fn from(piece: &Piece) -> Self {
        Self {
            id: piece.id(),
            position: piece.position(),
            rotation: piece.rotation(),
            group: piece.group(),
            z: piece.z(),
        }
    }
}

impl PieceState {
    /// Check the record on its own, against a puzzle of `piece_count` pieces.
    pub fn validate(&self, piece_count: usize) -> Result<(), RestoreError> {
        if self.id.index() >= piece_count {
            return Err(RestoreError::PieceOutOfRange(self.id));
        }
        if !self.position.is_finite() {
            return Err(RestoreError::NonFinitePosition(self.id));
        }
        if !(self.rotation.is_finite() && (0.0..360.0).contains(&self.rotation)) {
            return Err(RestoreError::InvalidRotation {
                piece: self.id,
                rotation: self.rotation,
            });
        }
        if self.group.0 > max_group_id(piece_count) {
            return Err(RestoreError::GroupIdOutOfRange {
                piece: self.id,
                group: self.group,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub header: SnapshotHeader,
    pub spec: PuzzleSpec,
    pub pieces: Vec<PieceState>,
}

impl SessionSnapshot {
    pub fn new(spec: PuzzleSpec, pieces: Vec<PieceState>) -> Self {
        Self {
            header: SnapshotHeader::new(pieces.len() as u32),
            spec,
            pieces,
        }
    }

    /// Check the header, including that it announces as many pieces as the
    /// snapshot holds.
    pub fn check_header(&self) -> Result<(), RestoreError> {
        self.header.validate()?;
        if self.header.piece_count as usize != self.pieces.len() {
            return Err(RestoreError::HeaderCountMismatch {
                announced: self.header.piece_count,
                found: self.pieces.len(),
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decode and check the header.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: SessionSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;
        Ok(snapshot)
    }
}
