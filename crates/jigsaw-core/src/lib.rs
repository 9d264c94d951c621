//! Jigsaw Core -- piece connectivity and grouping for a jigsaw puzzle game.
//!
//! This crate generates interlocking pieces from a seeded lattice, keeps
//! their world positions indexed for neighbor queries, detects when a
//! dragged piece's sides fit a neighbor, and maintains the partition of
//! pieces into connected groups as pieces snap together and break apart.
//!
//! # Command Flow
//!
//! A host UI drives a [`session::Session`] with [`command::Command`]s:
//!
//! 1. **BeginDrag** -- optionally detach the piece, raise its group.
//! 2. **DragMove** -- translate the group, recompute snap highlights.
//! 3. **DragEnd** -- snap to the best fitting neighbor, merge groups, then
//!    merge any further neighbors that already touch.
//!
//! Every command runs to completion before `apply` returns; topology and
//! highlight changes are delivered through the [`event::EventBus`].
//!
//! # Key Types
//!
//! - [`lattice::generate`] -- Builds pieces from a [`lattice::PuzzleSpec`].
//! - [`table::Table`] -- Piece arena, spatial index and geometry cache.
//! - [`matcher`] -- Side fit tests and candidate searches.
//! - [`groups::GroupManager`] -- Merge, detach and connectivity analysis.
//! - [`serialize::SessionSnapshot`] -- Versioned snapshots via bitcode.
//! - [`config::GameConfig`] -- Tolerances and sizing, loadable from files
//!   with the `data-loader` feature.

pub mod command;
pub mod config;
pub mod event;
pub mod geometry;
pub mod groups;
pub mod id;
pub mod lattice;
pub mod matcher;
pub mod piece;
pub mod rng;
pub mod serialize;
pub mod session;
pub mod stats;
pub mod table;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
