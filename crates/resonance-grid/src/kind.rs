//! Machine kinds: the static energy profile shared by every machine of one
//! type.
//!
//! A [`MachineKind`] is pure data loaded from configuration. Placing a kind
//! on a [`Grid`](crate::Grid) builds a fresh [`EnergyNode`] from it through
//! [`MachineKind::build_node`].

use std::cell::Cell;
use std::rc::Rc;

use resonance_energy::{EnergyNode, EnergyPool, SideMask};
use resonance_types::{Direction, EnergyRole};
use serde::{Deserialize, Serialize};

/// Static energy profile of a machine type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineKind {
    /// Declared role. When absent the role is derived from the sides.
    #[serde(default)]
    pub role: Option<EnergyRole>,

    /// Pool capacity.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Per-call receive rate of the pool.
    #[serde(default = "default_rate")]
    pub max_receive: u32,

    /// Per-call extract rate of the pool.
    #[serde(default = "default_rate")]
    pub max_extract: u32,

    /// Budget handed to the coordinator each tick.
    #[serde(default = "default_rate")]
    pub transfer_rate: u32,

    /// Energy created inside the machine each tick.
    #[serde(default)]
    pub generation_per_tick: u32,

    /// Energy the machine burns each tick when it has enough stored.
    #[serde(default)]
    pub consumption_per_tick: u32,

    /// Sides that accept energy.
    #[serde(default)]
    pub inputs: Vec<Direction>,

    /// Sides that emit energy.
    #[serde(default)]
    pub outputs: Vec<Direction>,
}

impl Default for MachineKind {
    fn default() -> Self {
        Self {
            role: None,
            capacity: default_capacity(),
            max_receive: default_rate(),
            max_extract: default_rate(),
            transfer_rate: default_rate(),
            generation_per_tick: 0,
            consumption_per_tick: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl MachineKind {
    // -------------------------------------------------------------------
    // Built-in kinds
    // -------------------------------------------------------------------

    /// Burns fuel into resonance energy and pushes it out of every side.
    pub fn resonant_burner() -> Self {
        Self {
            role: Some(EnergyRole::Generator),
            capacity: 10_000,
            generation_per_tick: 20,
            outputs: Direction::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// Draws energy from every side and burns a little of it each tick.
    pub fn resonance_condenser() -> Self {
        Self {
            role: Some(EnergyRole::Consumer),
            consumption_per_tick: 2,
            inputs: Direction::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// High-output generator with a deep buffer.
    pub fn rift_stabilizer() -> Self {
        Self {
            role: Some(EnergyRole::Generator),
            capacity: 100_000,
            generation_per_tick: 100,
            outputs: Direction::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// Refills itself completely every tick and feeds every side.
    pub fn paradoxical_cell() -> Self {
        Self {
            role: Some(EnergyRole::Generator),
            generation_per_tick: default_capacity(),
            outputs: Direction::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// Relays energy from any side to any side.
    pub fn relay() -> Self {
        Self {
            role: Some(EnergyRole::Both),
            inputs: Direction::ALL.to_vec(),
            outputs: Direction::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// A built-in kind by its configuration name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "resonant_burner" => Some(Self::resonant_burner()),
            "resonance_condenser" => Some(Self::resonance_condenser()),
            "rift_stabilizer" => Some(Self::rift_stabilizer()),
            "paradoxical_cell" => Some(Self::paradoxical_cell()),
            "relay" => Some(Self::relay()),
            _ => None,
        }
    }

    // -------------------------------------------------------------------
    // Node construction
    // -------------------------------------------------------------------

    /// The side mask this kind starts with.
    pub fn sides(&self) -> SideMask {
        SideMask::from_sides(&self.inputs, &self.outputs)
    }

    /// The declared role, or the one implied by the side mask.
    pub fn effective_role(&self) -> EnergyRole {
        self.role
            .unwrap_or_else(|| resonance_energy::role::role_from_sides(&self.sides()))
    }

    /// An empty pool sized for this kind.
    pub const fn pool(&self) -> EnergyPool {
        EnergyPool::new(self.capacity, self.max_receive, self.max_extract)
    }

    /// Build a node for this kind whose committed changes raise `dirty`.
    pub fn build_node(&self, dirty: &Rc<Cell<bool>>) -> EnergyNode {
        let flag = Rc::clone(dirty);
        let pool = self.pool().with_listener(Box::new(move || flag.set(true)));
        EnergyNode::new(self.effective_role(), pool, self.sides())
    }
}

const fn default_capacity() -> u32 {
    1000
}

const fn default_rate() -> u32 {
    1000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use resonance_types::TransferMode;

    use super::*;

    #[test]
    fn builtin_kinds_have_expected_profiles() {
        let burner = MachineKind::resonant_burner();
        assert_eq!(burner.effective_role(), EnergyRole::Generator);
        assert_eq!(burner.capacity, 10_000);
        assert_eq!(burner.generation_per_tick, 20);

        let condenser = MachineKind::resonance_condenser();
        assert_eq!(condenser.effective_role(), EnergyRole::Consumer);
        assert_eq!(condenser.consumption_per_tick, 2);
        assert_eq!(condenser.sides().input_side_count(), 6);

        assert_eq!(MachineKind::rift_stabilizer().generation_per_tick, 100);
        assert_eq!(MachineKind::relay().effective_role(), EnergyRole::Both);
        assert_eq!(
            MachineKind::builtin("rift_stabilizer"),
            Some(MachineKind::rift_stabilizer())
        );
        assert!(MachineKind::builtin("furnace").is_none());
    }

    #[test]
    fn role_falls_back_to_sides() {
        let kind = MachineKind {
            inputs: vec![Direction::North],
            ..MachineKind::default()
        };
        assert_eq!(kind.effective_role(), EnergyRole::Consumer);
        assert_eq!(MachineKind::default().effective_role(), EnergyRole::None);
    }

    #[test]
    fn built_node_raises_dirty_flag_on_commit() {
        let dirty = Rc::new(Cell::new(false));
        let mut node = MachineKind::relay().build_node(&dirty);

        assert_eq!(node.pool.receive(50, TransferMode::Simulate), 50);
        assert!(!dirty.get());

        assert_eq!(node.pool.receive(50, TransferMode::Commit), 50);
        assert!(dirty.get());
    }

    #[test]
    fn kind_parses_from_yaml_with_defaults() {
        let yaml = "role: consumer\ninputs: [north, east]\nconsumption_per_tick: 5\n";
        let kind: MachineKind = serde_yml::from_str(yaml).unwrap();
        assert_eq!(kind.role, Some(EnergyRole::Consumer));
        assert_eq!(kind.capacity, 1000);
        assert_eq!(kind.transfer_rate, 1000);
        assert_eq!(kind.inputs, vec![Direction::North, Direction::East]);
        assert!(kind.outputs.is_empty());
    }
}
