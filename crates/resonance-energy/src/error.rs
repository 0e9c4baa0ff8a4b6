//! Error types for the `resonance-energy` crate.
//!
//! The transfer core itself never fails; these errors only cross the
//! boundary with the world collaborator, where the resolver converts them
//! into "no neighbor".

use resonance_types::{Direction, Position};

/// Errors a world can report while answering a neighbor lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The cell is not loaded and cannot be inspected this tick.
    #[error("position {0} is not loaded")]
    Unloaded(Position),

    /// The cell's contents could not be read.
    #[error("position {position} is corrupted: {reason}")]
    Corrupted {
        /// The unreadable cell.
        position: Position,
        /// Why the read failed.
        reason: String,
    },

    /// The capability query for a face failed.
    #[error("capability lookup failed at {position} face {face}")]
    CapabilityUnavailable {
        /// The queried cell.
        position: Position,
        /// The queried face.
        face: Direction,
    },
}
