//! Error types for the `resonance-grid` crate.

use resonance_types::Position;

/// Errors that can occur while editing a [`Grid`](crate::Grid).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Something already occupies the cell.
    #[error("cell {0} is already occupied")]
    Occupied(Position),

    /// Nothing occupies the cell.
    #[error("cell {0} is empty")]
    Vacant(Position),

    /// The cell holds something other than a machine.
    #[error("cell {0} does not hold a machine")]
    NotAMachine(Position),

    /// A placement names a machine kind that is not configured.
    #[error("unknown machine kind: {0}")]
    UnknownKind(String),

    /// A snapshot was taken from a different kind of machine.
    #[error("cell {position} holds a {found}, snapshot is for a {expected}")]
    KindMismatch {
        /// The machine's cell.
        position: Position,
        /// Kind named by the snapshot.
        expected: String,
        /// Kind actually placed.
        found: String,
    },
}

/// Errors raised when recording journal entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// Entries must move a positive amount of energy.
    #[error("journal entry at tick {tick} has zero amount")]
    ZeroAmount {
        /// Tick the entry was recorded for.
        tick: u64,
    },

    /// A transfer entry must move energy between two distinct cells.
    #[error("transfer at tick {tick} has the same source and destination {position}")]
    SelfTransfer {
        /// Tick the entry was recorded for.
        tick: u64,
        /// The repeated cell.
        position: Position,
    },
}

/// Errors that can occur while running a tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}
