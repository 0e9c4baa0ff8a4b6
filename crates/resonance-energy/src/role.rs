//! Role classification for neighboring nodes.
//!
//! The resolver consults [`permits`] before handing out a native neighbor's
//! pool, so a consumer can never be drained and a generator can never be
//! filled by its neighbors.

use resonance_types::EnergyRole;

use crate::node::EnergyNode;
use crate::side::SideMask;

/// The exchange a node wants to perform against a neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Pull energy out of the neighbor into the origin.
    Extract,
    /// Push energy from the origin into the neighbor.
    Insert,
}

/// The declared role of a native node.
pub const fn classify(node: &EnergyNode) -> EnergyRole {
    node.role
}

/// Whether a neighbor with `role` may take part in `operation`.
pub const fn permits(role: EnergyRole, operation: Operation) -> bool {
    match operation {
        Operation::Extract => role.can_supply(),
        Operation::Insert => role.can_accept(),
    }
}

/// Default role for a machine kind that does not declare one.
///
/// Inputs and outputs make it `Both`, inputs alone `Consumer`, outputs
/// alone `Generator`, and a closed mask `None`.
pub fn role_from_sides(sides: &SideMask) -> EnergyRole {
    match (sides.has_input_sides(), sides.has_output_sides()) {
        (true, true) => EnergyRole::Both,
        (true, false) => EnergyRole::Consumer,
        (false, true) => EnergyRole::Generator,
        (false, false) => EnergyRole::None,
    }
}

#[cfg(test)]
mod tests {
    use resonance_types::Direction;

    use super::*;

    #[test]
    fn only_suppliers_may_be_extracted_from() {
        assert!(permits(EnergyRole::Generator, Operation::Extract));
        assert!(permits(EnergyRole::Both, Operation::Extract));
        assert!(!permits(EnergyRole::Consumer, Operation::Extract));
        assert!(!permits(EnergyRole::None, Operation::Extract));
    }

    #[test]
    fn only_acceptors_may_be_inserted_into() {
        assert!(permits(EnergyRole::Consumer, Operation::Insert));
        assert!(permits(EnergyRole::Both, Operation::Insert));
        assert!(!permits(EnergyRole::Generator, Operation::Insert));
        assert!(!permits(EnergyRole::None, Operation::Insert));
    }

    #[test]
    fn role_derived_from_sides() {
        assert_eq!(role_from_sides(&SideMask::none()), EnergyRole::None);
        assert_eq!(role_from_sides(&SideMask::all()), EnergyRole::Both);
        assert_eq!(
            role_from_sides(&SideMask::from_sides(&[Direction::Up], &[])),
            EnergyRole::Consumer
        );
        assert_eq!(
            role_from_sides(&SideMask::from_sides(&[], &[Direction::Up])),
            EnergyRole::Generator
        );
    }
}
