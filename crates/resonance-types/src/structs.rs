//! Core value structs for the Resonance energy network.
//!
//! Covers grid positions, the flat persisted pool record, and the
//! per-call transfer outcome.

use serde::{Deserialize, Serialize};

use crate::enums::Direction;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell on the 3D simulation grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// East/west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North/south axis.
    pub z: i32,
}

impl Position {
    /// Create a position from raw coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent cell in `direction`.
    ///
    /// Returns `None` at the edge of the coordinate space, where the
    /// neighbor would overflow `i32`.
    pub const fn offset(self, direction: Direction) -> Option<Self> {
        let (dx, dy, dz) = direction.step();
        let Some(x) = self.x.checked_add(dx) else {
            return None;
        };
        let Some(y) = self.y.checked_add(dy) else {
            return None;
        };
        let Some(z) = self.z.checked_add(dz) else {
            return None;
        };
        Some(Self { x, y, z })
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Persisted pool state
// ---------------------------------------------------------------------------

/// Flat persisted form of an energy pool.
///
/// This is the only state the energy core persists. Loading never trusts
/// the stored invariants: `energy` above `capacity` is clamped by the pool
/// when the record is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PoolRecord {
    /// Maximum energy the pool can hold.
    pub capacity: u32,
    /// Per-call receive cap.
    pub max_receive: u32,
    /// Per-call extract cap.
    pub max_extract: u32,
    /// Stored energy.
    pub energy: u32,
}

// ---------------------------------------------------------------------------
// Transfer outcome
// ---------------------------------------------------------------------------

/// Amounts moved by one balanced transfer call.
///
/// Both fields are bounded by the maximum the caller requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Energy pulled in from neighbors.
    pub received: u32,
    /// Energy pushed out to neighbors.
    pub sent: u32,
}

impl TransferOutcome {
    /// Net change to the node's pool (`received - sent`).
    pub fn net(self) -> i64 {
        i64::from(self.received).saturating_sub(i64::from(self.sent))
    }

    /// Whether anything moved in either direction.
    pub const fn has_transfer(self) -> bool {
        self.received > 0 || self.sent > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_moves_one_cell() {
        let origin = Position::new(0, 64, 0);
        assert_eq!(origin.offset(Direction::Up), Some(Position::new(0, 65, 0)));
        assert_eq!(origin.offset(Direction::North), Some(Position::new(0, 64, -1)));
        assert_eq!(origin.offset(Direction::East), Some(Position::new(1, 64, 0)));
    }

    #[test]
    fn offset_at_edge_is_none() {
        let edge = Position::new(i32::MAX, 0, 0);
        assert_eq!(edge.offset(Direction::East), None);
        assert!(edge.offset(Direction::West).is_some());
    }

    #[test]
    fn outcome_net_can_be_negative() {
        let outcome = TransferOutcome {
            received: 10,
            sent: 25,
        };
        assert_eq!(outcome.net(), -15);
        assert!(outcome.has_transfer());
        assert!(!TransferOutcome::default().has_transfer());
    }

    #[test]
    fn pool_record_field_names_are_stable() {
        let record = PoolRecord {
            capacity: 1000,
            max_receive: 40,
            max_extract: 100,
            energy: 960,
        };
        let json = serde_json::to_string(&record).unwrap_or_default();
        assert_eq!(
            json,
            r#"{"capacity":1000,"max_receive":40,"max_extract":100,"energy":960}"#
        );
    }
}
