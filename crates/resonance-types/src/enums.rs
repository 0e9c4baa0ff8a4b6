//! Enumeration types for the Resonance energy network.
//!
//! Grid directions, machine energy roles, and the simulate/commit switch
//! shared by every pool operation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six axis-aligned faces of a grid cell.
///
/// The declaration order is the canonical iteration order used everywhere
/// a node walks its sides: `Down, Up, North, South, West, East`. Transfer
/// results depend on this order when a neighbor runs short, so it must
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Negative Y.
    Down,
    /// Positive Y.
    Up,
    /// Negative Z.
    North,
    /// Positive Z.
    South,
    /// Negative X.
    West,
    /// Positive X.
    East,
}

impl Direction {
    /// All six directions in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Down,
        Self::Up,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// Position of this direction in [`Direction::ALL`].
    ///
    /// Always in `0..6`, so it is safe to use with `[T; 6]::get`.
    pub const fn index(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Up => 1,
            Self::North => 2,
            Self::South => 3,
            Self::West => 4,
            Self::East => 5,
        }
    }

    /// The face pointing the other way.
    ///
    /// A neighbor reached through `dir` sees the origin through
    /// `dir.opposite()`.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Unit step `(dx, dy, dz)` for this direction.
    pub const fn step(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::North => "north",
            Self::South => "south",
            Self::West => "west",
            Self::East => "east",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Energy role
// ---------------------------------------------------------------------------

/// How a machine participates in energy exchange.
///
/// Only `Generator` and `Both` nodes may be extracted from; only `Consumer`
/// and `Both` nodes may be received into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyRole {
    /// Produces energy and pushes it out; never receives.
    Generator,
    /// Pulls energy in; never sends.
    Consumer,
    /// Both receives and sends.
    Both,
    /// Does not take part in transfers at all.
    None,
}

impl EnergyRole {
    /// Whether a neighbor with this role may be the source of an extraction.
    pub const fn can_supply(self) -> bool {
        matches!(self, Self::Generator | Self::Both)
    }

    /// Whether a neighbor with this role may be the target of a receive.
    pub const fn can_accept(self) -> bool {
        matches!(self, Self::Consumer | Self::Both)
    }
}

// ---------------------------------------------------------------------------
// Transfer mode
// ---------------------------------------------------------------------------

/// Whether a pool operation only reports or actually moves energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Report the amount that would move; never mutates.
    Simulate,
    /// Move the amount and notify the owner.
    Commit,
}

impl TransferMode {
    /// `true` for [`TransferMode::Commit`].
    pub const fn is_commit(self) -> bool {
        matches!(self, Self::Commit)
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_matches_index() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.index(), i);
        }
    }

    #[test]
    fn opposite_is_an_involution() {
        for dir in Direction::ALL {
            assert_ne!(dir, dir.opposite());
            assert_eq!(dir, dir.opposite().opposite());
        }
    }

    #[test]
    fn opposite_steps_cancel() {
        for dir in Direction::ALL {
            let (ax, ay, az) = dir.step();
            let (bx, by, bz) = dir.opposite().step();
            assert_eq!((ax + bx, ay + by, az + bz), (0, 0, 0));
        }
    }

    #[test]
    fn role_permissions() {
        assert!(EnergyRole::Generator.can_supply());
        assert!(!EnergyRole::Generator.can_accept());
        assert!(EnergyRole::Consumer.can_accept());
        assert!(!EnergyRole::Consumer.can_supply());
        assert!(EnergyRole::Both.can_supply() && EnergyRole::Both.can_accept());
        assert!(!EnergyRole::None.can_supply() && !EnergyRole::None.can_accept());
    }

    #[test]
    fn direction_serializes_snake_case() {
        let json = serde_json::to_string(&Direction::North).unwrap_or_default();
        assert_eq!(json, "\"north\"");
    }
}
