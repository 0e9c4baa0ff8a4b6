//! The per-node energy context.
//!
//! An [`EnergyNode`] bundles everything one machine owns for energy
//! exchange: its declared role, its pool, and its side mask. Grids share
//! nodes as [`SharedNode`] and hand neighbors out as weak handles, so a
//! removed node simply stops resolving.

use std::cell::RefCell;
use std::rc::Rc;

use resonance_types::{Direction, EnergyRole};

use crate::pool::EnergyPool;
use crate::role;
use crate::side::SideMask;

/// A native node shared between its owner and the grid.
pub type SharedNode = Rc<RefCell<EnergyNode>>;

/// Energy state owned by one machine on the grid.
#[derive(Debug)]
pub struct EnergyNode {
    /// How this node takes part in exchanges.
    pub role: EnergyRole,
    /// The node's reservoir.
    pub pool: EnergyPool,
    /// Which faces accept and emit energy.
    pub sides: SideMask,
}

impl EnergyNode {
    /// Create a node with an explicit role.
    pub const fn new(role: EnergyRole, pool: EnergyPool, sides: SideMask) -> Self {
        Self { role, pool, sides }
    }

    /// Create a node whose role is derived from its side mask.
    pub fn from_sides(pool: EnergyPool, sides: SideMask) -> Self {
        let role = role::role_from_sides(&sides);
        Self { role, pool, sides }
    }

    /// Wrap the node for sharing on a grid.
    pub fn shared(self) -> SharedNode {
        Rc::new(RefCell::new(self))
    }

    /// Whether this node offers output through `direction`.
    pub fn can_output_to(&self, direction: Direction) -> bool {
        self.sides.can_send_to(direction)
    }

    /// Whether this node accepts input through `direction`.
    pub fn can_accept_from(&self, direction: Direction) -> bool {
        self.sides.can_accept_from(direction)
    }
}
