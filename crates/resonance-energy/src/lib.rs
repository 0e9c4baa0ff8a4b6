//! Energy pools, side masks, and neighbor transfer coordination for the
//! Resonance network.
//!
//! Every native machine owns one [`EnergyPool`] and one [`SideMask`],
//! bundled as an [`EnergyNode`]. Once per tick its owner builds a
//! [`TransferCoordinator`] over the node and calls `receive` and/or `send`;
//! the coordinator finds neighbors through a [`NeighborResolver`] and moves
//! energy with a simulate-then-commit exchange per neighbor.
//!
//! # Modules
//!
//! - [`pool`] -- [`EnergyPool`] and the [`EnergyStorage`] capability contract.
//! - [`side`] -- [`SideMask`]: per-face input/output enablement.
//! - [`role`] -- Role classification consulted during neighbor resolution.
//! - [`node`] -- [`EnergyNode`]: the per-node context shared on a grid.
//! - [`neighbor`] -- [`EnergyWorld`] boundary and [`NeighborResolver`].
//! - [`transfer`] -- [`TransferCoordinator`] and exchange recording.
//! - [`error`] -- [`LookupError`] reported by world implementations.
//!
//! # Usage
//!
//! ```
//! use std::cell::RefCell;
//! use std::collections::BTreeMap;
//! use std::rc::{Rc, Weak};
//!
//! use resonance_energy::{
//!     EnergyNode, EnergyPool, EnergyStorage, EnergyWorld, LookupError, NodeHandle, SharedNode,
//!     SideMask, TransferCoordinator,
//! };
//! use resonance_types::{Direction, EnergyRole, PoolRecord, Position};
//!
//! struct Cells(BTreeMap<Position, SharedNode>);
//!
//! impl EnergyWorld for Cells {
//!     fn node_at(&self, position: Position) -> Result<Option<NodeHandle>, LookupError> {
//!         Ok(self.0.get(&position).map(|n| NodeHandle::Native(Rc::downgrade(n))))
//!     }
//!
//!     fn storage_at(
//!         &self,
//!         _position: Position,
//!         _face: Direction,
//!     ) -> Result<Option<Weak<RefCell<dyn EnergyStorage>>>, LookupError> {
//!         Ok(None)
//!     }
//! }
//!
//! let source = EnergyPool::from_record(PoolRecord {
//!     capacity: 1000,
//!     max_receive: 0,
//!     max_extract: 100,
//!     energy: 1000,
//! });
//! let generator = EnergyNode::new(
//!     EnergyRole::Generator,
//!     source,
//!     SideMask::from_sides(&[], &[Direction::West]),
//! );
//!
//! let mut cells = Cells(BTreeMap::new());
//! cells.0.insert(Position::new(1, 0, 0), generator.shared());
//!
//! let mut consumer = EnergyNode::new(
//!     EnergyRole::Consumer,
//!     EnergyPool::new(500, 40, 0),
//!     SideMask::from_sides(&[Direction::East], &[]),
//! );
//! let received = TransferCoordinator::new(&mut consumer, Position::new(0, 0, 0), &cells)
//!     .receive(1000);
//! assert_eq!(received, 40);
//! assert_eq!(consumer.pool.energy(), 40);
//! ```

pub mod error;
pub mod neighbor;
pub mod node;
pub mod pool;
pub mod role;
pub mod side;
pub mod transfer;

// Re-export primary types at crate root.
pub use error::LookupError;
pub use neighbor::{
    EnergyWorld, Neighbor, NeighborKind, NeighborResolver, NodeHandle, SharedStorage,
};
pub use node::{EnergyNode, SharedNode};
pub use pool::{ChangeListener, EnergyPool, EnergyStorage};
pub use role::Operation;
pub use side::SideMask;
pub use transfer::{AdjacentStorage, Exchange, ExchangeRecorder, TransferCoordinator};
