//! Neighbor discovery across the six faces of a node.
//!
//! [`NeighborResolver`] turns `(origin, direction, operation)` into an
//! optional [`Neighbor`] handle. Resolution is a fixed chain, first match
//! wins:
//!
//! 1. The origin side must be enabled for the operation (input for
//!    [`Operation::Extract`], output for [`Operation::Insert`]); otherwise
//!    the world is never consulted.
//! 2. The world must report something at `origin.offset(direction)`.
//! 3. A native node is returned only if its role permits the operation and
//!    its own side facing back toward the origin is open for it.
//! 4. Anything else is asked for a standard foreign storage on the face
//!    pointing back toward the origin.
//!
//! Lookup errors, stale weak handles, and cells that are already borrowed
//! all resolve to `None`. One bad cell never aborts a node's tick.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use resonance_types::{Direction, Position};
use tracing::debug;

use crate::error::LookupError;
use crate::node::{EnergyNode, SharedNode};
use crate::pool::EnergyStorage;
use crate::role::{self, Operation};
use crate::side::SideMask;

/// A foreign storage shared with the world that owns it.
pub type SharedStorage = Rc<RefCell<dyn EnergyStorage>>;

/// What the world reports at a grid cell.
#[derive(Debug, Clone)]
pub enum NodeHandle {
    /// Another node of this network.
    Native(Weak<RefCell<EnergyNode>>),
    /// Something that is not a native node. It may still expose a
    /// standard storage through [`EnergyWorld::storage_at`].
    Foreign,
}

/// The world collaborator that answers neighbor lookups.
///
/// Implementations should be O(1) per call. Handles they return may go
/// stale at any time; the resolver tolerates it.
pub trait EnergyWorld {
    /// What occupies `position`, if anything.
    fn node_at(&self, position: Position) -> Result<Option<NodeHandle>, LookupError>;

    /// A standard storage exposed at `position` on its `face`, if any.
    fn storage_at(
        &self,
        position: Position,
        face: Direction,
    ) -> Result<Option<Weak<RefCell<dyn EnergyStorage>>>, LookupError>;
}

/// How a neighbor was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborKind {
    /// A node of this network.
    Native,
    /// A foreign storage implementing the same capability contract.
    Standard,
}

/// The resolved storage behind a neighbor handle.
#[derive(Clone)]
enum NeighborPool {
    Native(SharedNode),
    Standard(SharedStorage),
}

/// A resolved, strongly-held neighbor for the duration of one call.
#[derive(Clone)]
pub struct Neighbor {
    /// Side of the origin the neighbor was found on.
    pub direction: Direction,
    /// Grid cell the neighbor occupies.
    pub position: Position,
    pool: NeighborPool,
}

impl core::fmt::Debug for Neighbor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Neighbor")
            .field("direction", &self.direction)
            .field("position", &self.position)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

impl Neighbor {
    /// Whether this is a native node or a foreign storage.
    pub const fn kind(&self) -> NeighborKind {
        match self.pool {
            NeighborPool::Native(_) => NeighborKind::Native,
            NeighborPool::Standard(_) => NeighborKind::Standard,
        }
    }

    /// Run `f` against the neighbor's storage with mutable access.
    ///
    /// Returns `None` if the storage is already borrowed elsewhere.
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut dyn EnergyStorage) -> R) -> Option<R> {
        match &self.pool {
            NeighborPool::Native(node) => {
                let mut node = node.try_borrow_mut().ok()?;
                Some(f(&mut node.pool))
            }
            NeighborPool::Standard(storage) => {
                let mut storage = storage.try_borrow_mut().ok()?;
                Some(f(&mut *storage))
            }
        }
    }

    /// Run `f` against the neighbor's storage with shared access.
    ///
    /// Returns `None` if the storage is mutably borrowed elsewhere.
    pub fn peek<R>(&self, f: impl FnOnce(&dyn EnergyStorage) -> R) -> Option<R> {
        match &self.pool {
            NeighborPool::Native(node) => {
                let node = node.try_borrow().ok()?;
                Some(f(&node.pool))
            }
            NeighborPool::Standard(storage) => {
                let storage = storage.try_borrow().ok()?;
                Some(f(&*storage))
            }
        }
    }
}

/// Resolves neighboring storages for one origin against a world.
#[derive(Debug)]
pub struct NeighborResolver<'w, W: ?Sized> {
    world: &'w W,
}

impl<'w, W: EnergyWorld + ?Sized> NeighborResolver<'w, W> {
    /// Create a resolver over `world`.
    pub const fn new(world: &'w W) -> Self {
        Self { world }
    }

    /// Resolve the neighbor on `direction` of `origin` for `operation`.
    pub fn resolve(
        &self,
        origin: Position,
        sides: &SideMask,
        direction: Direction,
        operation: Operation,
    ) -> Option<Neighbor> {
        let side_open = match operation {
            Operation::Extract => sides.can_accept_from(direction),
            Operation::Insert => sides.can_send_to(direction),
        };
        if !side_open {
            return None;
        }

        let position = origin.offset(direction)?;
        let handle = match self.world.node_at(position) {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(err) => {
                debug!(%origin, %direction, error = %err, "neighbor lookup failed");
                return None;
            }
        };

        let facing = direction.opposite();
        match handle {
            NodeHandle::Native(weak) => {
                let node = weak.upgrade().or_else(|| {
                    debug!(%origin, %direction, "neighbor handle is stale");
                    None
                })?;
                if !Self::native_offers(&node, facing, operation) {
                    return None;
                }
                Some(Neighbor {
                    direction,
                    position,
                    pool: NeighborPool::Native(node),
                })
            }
            NodeHandle::Foreign => {
                let weak = match self.world.storage_at(position, facing) {
                    Ok(found) => found?,
                    Err(err) => {
                        debug!(%origin, %direction, error = %err, "capability lookup failed");
                        return None;
                    }
                };
                let storage = weak.upgrade()?;
                Some(Neighbor {
                    direction,
                    position,
                    pool: NeighborPool::Standard(storage),
                })
            }
        }
    }

    /// An open input side whose neighbor currently has energy to give.
    pub fn can_receive_from_adjacent(
        &self,
        origin: Position,
        sides: &SideMask,
        direction: Direction,
    ) -> bool {
        self.resolve(origin, sides, direction, Operation::Extract)
            .and_then(|n| n.peek(|s| s.can_extract()))
            .unwrap_or(false)
    }

    /// An open output side whose neighbor currently has room to accept.
    pub fn can_send_to_adjacent(
        &self,
        origin: Position,
        sides: &SideMask,
        direction: Direction,
    ) -> bool {
        self.resolve(origin, sides, direction, Operation::Insert)
            .and_then(|n| n.peek(|s| s.can_receive()))
            .unwrap_or(false)
    }

    /// Role and back-facing side check for a native neighbor.
    fn native_offers(node: &SharedNode, facing: Direction, operation: Operation) -> bool {
        let Ok(node) = node.try_borrow() else {
            return false;
        };
        if !role::permits(role::classify(&node), operation) {
            return false;
        }
        match operation {
            Operation::Extract => node.can_output_to(facing),
            Operation::Insert => node.can_accept_from(facing),
        }
    }
}
