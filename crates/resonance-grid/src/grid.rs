//! In-memory grid of machines, foreign storages, and inert blocks.
//!
//! The [`Grid`] is the [`EnergyWorld`] the tick scheduler resolves neighbors
//! against. Cells are indexed by [`Position`] in a `BTreeMap`, so lookups
//! are logarithmic and iteration is always in ascending position order.
//!
//! Machines are held as [`SharedNode`]s and handed to neighbors as weak
//! handles. Removing a cell drops the grid's strong reference, so every
//! handle to it stops resolving on the next lookup.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use resonance_energy::{
    EnergyStorage, EnergyWorld, LookupError, NodeHandle, SharedNode, SharedStorage,
};
use resonance_types::{Direction, PoolRecord, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GridError;
use crate::kind::MachineKind;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A native machine placed on the grid.
#[derive(Debug)]
pub struct Machine {
    /// Configured kind name.
    kind_name: String,
    /// Static profile the node was built from.
    kind: MachineKind,
    /// Shared energy state.
    node: SharedNode,
    /// Raised by the pool listener on every committed change.
    dirty: Rc<Cell<bool>>,
}

impl Machine {
    /// Name of the machine kind.
    pub fn kind_name(&self) -> &str {
        &self.kind_name
    }

    /// Static profile of the machine.
    pub const fn kind(&self) -> &MachineKind {
        &self.kind
    }

    /// The machine's shared node.
    pub const fn node(&self) -> &SharedNode {
        &self.node
    }

    /// Whether the pool changed since the flag was last cleared.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Clear the dirty flag, returning its previous value.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }
}

/// What occupies a grid cell.
pub enum GridCell {
    /// A native machine.
    Machine(Machine),
    /// A foreign block exposing a standard energy storage on every face.
    Storage(SharedStorage),
    /// A foreign block with no energy capability.
    Inert,
}

impl core::fmt::Debug for GridCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Machine(machine) => f.debug_tuple("Machine").field(machine).finish(),
            Self::Storage(storage) => match storage.try_borrow() {
                Ok(s) => f
                    .debug_struct("Storage")
                    .field("stored", &s.stored())
                    .field("max_stored", &s.max_stored())
                    .finish(),
                Err(_) => f.debug_struct("Storage").finish_non_exhaustive(),
            },
            Self::Inert => f.write_str("Inert"),
        }
    }
}

/// Persisted state of one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Where the machine sits.
    pub position: Position,
    /// Configured kind name.
    pub kind: String,
    /// The machine's pool.
    pub pool: PoolRecord,
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A sparse three-dimensional grid of energy-bearing cells.
#[derive(Debug, Default)]
pub struct Grid {
    /// Every occupied cell.
    cells: BTreeMap<Position, GridCell>,
    /// Cells whose region is not loaded. Lookups there fail.
    unloaded: BTreeSet<Position>,
}

impl Grid {
    /// Create an empty grid.
    pub const fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
            unloaded: BTreeSet::new(),
        }
    }

    // -------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------

    /// Place a machine of `kind` at `position`, with an empty pool.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Occupied`] if the cell is taken.
    pub fn place_machine(
        &mut self,
        position: Position,
        kind_name: &str,
        kind: &MachineKind,
    ) -> Result<SharedNode, GridError> {
        if self.cells.contains_key(&position) {
            return Err(GridError::Occupied(position));
        }
        let dirty = Rc::new(Cell::new(false));
        let node = kind.build_node(&dirty).shared();
        self.cells.insert(
            position,
            GridCell::Machine(Machine {
                kind_name: kind_name.to_owned(),
                kind: kind.clone(),
                node: Rc::clone(&node),
                dirty,
            }),
        );
        debug!(%position, kind = kind_name, "machine placed");
        Ok(node)
    }

    /// Place a foreign storage at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Occupied`] if the cell is taken.
    pub fn place_storage<S: EnergyStorage + 'static>(
        &mut self,
        position: Position,
        storage: S,
    ) -> Result<SharedStorage, GridError> {
        if self.cells.contains_key(&position) {
            return Err(GridError::Occupied(position));
        }
        let shared: SharedStorage = Rc::new(RefCell::new(storage));
        self.cells
            .insert(position, GridCell::Storage(Rc::clone(&shared)));
        debug!(%position, "storage placed");
        Ok(shared)
    }

    /// Place a block with no energy capability at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Occupied`] if the cell is taken.
    pub fn place_inert(&mut self, position: Position) -> Result<(), GridError> {
        if self.cells.contains_key(&position) {
            return Err(GridError::Occupied(position));
        }
        self.cells.insert(position, GridCell::Inert);
        Ok(())
    }

    /// Remove whatever occupies `position`.
    ///
    /// Neighbor handles to a removed machine stop resolving once the
    /// caller drops the returned cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Vacant`] if the cell is empty.
    pub fn remove(&mut self, position: Position) -> Result<GridCell, GridError> {
        let cell = self
            .cells
            .remove(&position)
            .ok_or(GridError::Vacant(position))?;
        debug!(%position, "cell removed");
        Ok(cell)
    }

    // -------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------

    /// Mark `position` as unloaded. Returns `false` if it already was.
    pub fn unload(&mut self, position: Position) -> bool {
        self.unloaded.insert(position)
    }

    /// Mark `position` as loaded again. Returns `false` if it was loaded.
    pub fn load(&mut self, position: Position) -> bool {
        self.unloaded.remove(&position)
    }

    /// Whether lookups at `position` currently fail.
    pub fn is_unloaded(&self, position: Position) -> bool {
        self.unloaded.contains(&position)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no occupied cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at `position`, if any.
    pub fn cell(&self, position: Position) -> Option<&GridCell> {
        self.cells.get(&position)
    }

    /// The machine at `position`, if any.
    pub fn machine(&self, position: Position) -> Option<&Machine> {
        match self.cells.get(&position) {
            Some(GridCell::Machine(machine)) => Some(machine),
            _ => None,
        }
    }

    /// A strong handle to the machine node at `position`, if any.
    pub fn node(&self, position: Position) -> Option<SharedNode> {
        self.machine(position).map(|m| Rc::clone(&m.node))
    }

    /// Positions of every machine, in ascending order.
    pub fn machine_positions(&self) -> Vec<Position> {
        self.machines().map(|(position, _)| position).collect()
    }

    /// Every machine with its position, in ascending order.
    pub fn machines(&self) -> impl Iterator<Item = (Position, &Machine)> {
        self.cells.iter().filter_map(|(position, cell)| match cell {
            GridCell::Machine(machine) => Some((*position, machine)),
            GridCell::Storage(_) | GridCell::Inert => None,
        })
    }

    /// Energy held by every machine and storage, keyed by position.
    ///
    /// Cells that are borrowed elsewhere are skipped.
    pub fn energy_levels(&self) -> BTreeMap<Position, u32> {
        self.cells
            .iter()
            .filter_map(|(position, cell)| {
                let stored = match cell {
                    GridCell::Machine(machine) => {
                        machine.node.try_borrow().ok().map(|n| n.pool.energy())
                    }
                    GridCell::Storage(storage) => storage.try_borrow().ok().map(|s| s.stored()),
                    GridCell::Inert => None,
                }?;
                Some((*position, stored))
            })
            .collect()
    }

    /// Total energy held on the grid.
    pub fn total_stored(&self) -> u64 {
        self.energy_levels()
            .values()
            .fold(0_u64, |acc, v| acc.saturating_add(u64::from(*v)))
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Persisted records of every machine, in ascending position order.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.machines()
            .filter_map(|(position, machine)| {
                let node = machine.node.try_borrow().ok()?;
                Some(NodeSnapshot {
                    position,
                    kind: machine.kind_name.clone(),
                    pool: node.pool.to_record(),
                })
            })
            .collect()
    }

    /// Restore pool state from `snapshots` onto machines already placed.
    ///
    /// Stored energy above the restored capacity is clamped.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::NotAMachine`] for the first snapshot whose cell
    /// is not a machine, or [`GridError::KindMismatch`] for the first one
    /// taken from a different kind. Earlier snapshots stay applied. Machines
    /// borrowed elsewhere are skipped.
    pub fn restore(&mut self, snapshots: &[NodeSnapshot]) -> Result<usize, GridError> {
        let mut restored: usize = 0;
        for snapshot in snapshots {
            let machine = self
                .machine(snapshot.position)
                .ok_or(GridError::NotAMachine(snapshot.position))?;
            if machine.kind_name != snapshot.kind {
                return Err(GridError::KindMismatch {
                    position: snapshot.position,
                    expected: snapshot.kind.clone(),
                    found: machine.kind_name.clone(),
                });
            }
            let Ok(mut node) = machine.node.try_borrow_mut() else {
                debug!(position = %snapshot.position, "machine busy, snapshot skipped");
                continue;
            };
            let record = snapshot.pool;
            node.pool.set_capacity(record.capacity);
            node.pool.set_max_receive(record.max_receive);
            node.pool.set_max_extract(record.max_extract);
            node.pool.set_energy(record.energy);
            restored = restored.saturating_add(1);
        }
        Ok(restored)
    }

    /// Positions whose pools changed since the last call, clearing the
    /// flags.
    pub fn take_dirty(&self) -> Vec<Position> {
        self.machines()
            .filter(|(_, machine)| machine.take_dirty())
            .map(|(position, _)| position)
            .collect()
    }
}

impl EnergyWorld for Grid {
    fn node_at(&self, position: Position) -> Result<Option<NodeHandle>, LookupError> {
        if self.unloaded.contains(&position) {
            return Err(LookupError::Unloaded(position));
        }
        Ok(self.cells.get(&position).map(|cell| match cell {
            GridCell::Machine(machine) => NodeHandle::Native(Rc::downgrade(&machine.node)),
            GridCell::Storage(_) | GridCell::Inert => NodeHandle::Foreign,
        }))
    }

    fn storage_at(
        &self,
        position: Position,
        _face: Direction,
    ) -> Result<Option<Weak<RefCell<dyn EnergyStorage>>>, LookupError> {
        if self.unloaded.contains(&position) {
            return Err(LookupError::Unloaded(position));
        }
        Ok(match self.cells.get(&position) {
            Some(GridCell::Storage(storage)) => Some(Rc::downgrade(storage)),
            Some(GridCell::Machine(_) | GridCell::Inert) | None => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use resonance_energy::EnergyPool;
    use resonance_types::TransferMode;

    use super::*;

    const ORIGIN: Position = Position::new(0, 0, 0);
    const EAST: Position = Position::new(1, 0, 0);

    #[test]
    fn placement_rejects_occupied_cells() {
        let mut grid = Grid::new();
        grid.place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        assert_eq!(
            grid.place_inert(ORIGIN),
            Err(GridError::Occupied(ORIGIN))
        );
        assert!(grid.place_storage(ORIGIN, EnergyPool::new(10, 10, 10)).is_err());
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_reports_vacant_cells() {
        let mut grid = Grid::new();
        assert!(matches!(grid.remove(ORIGIN), Err(GridError::Vacant(p)) if p == ORIGIN));
        grid.place_inert(ORIGIN).unwrap();
        assert!(matches!(grid.remove(ORIGIN), Ok(GridCell::Inert)));
        assert!(grid.is_empty());
    }

    #[test]
    fn removed_machine_handle_goes_stale() {
        let mut grid = Grid::new();
        drop(grid.place_machine(EAST, "relay", &MachineKind::relay()).unwrap());

        let Ok(Some(NodeHandle::Native(weak))) = grid.node_at(EAST) else {
            panic!("expected a native handle");
        };
        assert!(weak.upgrade().is_some());

        drop(grid.remove(EAST).unwrap());
        assert!(weak.upgrade().is_none());
        assert!(grid.node_at(EAST).unwrap().is_none());
    }

    #[test]
    fn world_lookups_classify_cells() {
        let mut grid = Grid::new();
        grid.place_storage(EAST, EnergyPool::new(10, 10, 10)).unwrap();
        grid.place_inert(ORIGIN).unwrap();

        assert!(matches!(grid.node_at(EAST), Ok(Some(NodeHandle::Foreign))));
        assert!(grid.storage_at(EAST, Direction::West).unwrap().is_some());
        assert!(matches!(grid.node_at(ORIGIN), Ok(Some(NodeHandle::Foreign))));
        assert!(grid.storage_at(ORIGIN, Direction::East).unwrap().is_none());
        assert!(grid.node_at(Position::new(9, 9, 9)).unwrap().is_none());
    }

    #[test]
    fn unloaded_cells_fail_lookups() {
        let mut grid = Grid::new();
        grid.place_inert(EAST).unwrap();
        assert!(grid.unload(EAST));
        assert!(!grid.unload(EAST));
        assert_eq!(grid.node_at(EAST).unwrap_err(), LookupError::Unloaded(EAST));
        assert!(grid.storage_at(EAST, Direction::West).is_err());
        assert!(grid.load(EAST));
        assert!(grid.node_at(EAST).is_ok());
    }

    #[test]
    fn dirty_flags_track_committed_changes() {
        let mut grid = Grid::new();
        let node = grid
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        grid.place_machine(EAST, "relay", &MachineKind::relay())
            .unwrap();
        assert!(grid.take_dirty().is_empty());

        node.borrow_mut().pool.receive(5, TransferMode::Commit);
        assert_eq!(grid.take_dirty(), vec![ORIGIN]);
        assert!(grid.take_dirty().is_empty());
    }

    #[test]
    fn totals_include_foreign_storage() {
        let mut grid = Grid::new();
        let node = grid
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        node.borrow_mut().pool.set_energy(300);
        let mut storage = EnergyPool::new(500, 500, 500);
        storage.set_energy(200);
        grid.place_storage(EAST, storage).unwrap();

        assert_eq!(grid.total_stored(), 500);
        assert_eq!(grid.energy_levels().get(&EAST), Some(&200));
    }

    #[test]
    fn snapshot_restores_onto_fresh_grid() {
        let mut grid = Grid::new();
        let node = grid
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        node.borrow_mut().pool.set_energy(640);
        let snapshot = grid.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.first().unwrap().pool.energy, 640);

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: Vec<NodeSnapshot> = serde_json::from_str(&json).unwrap();

        let mut fresh = Grid::new();
        let restored_node = fresh
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        assert_eq!(fresh.restore(&parsed), Ok(1));
        assert_eq!(restored_node.borrow().pool.energy(), 640);
    }

    #[test]
    fn restore_rejects_non_machine_cells() {
        let mut grid = Grid::new();
        grid.place_inert(ORIGIN).unwrap();
        let snapshot = NodeSnapshot {
            position: ORIGIN,
            kind: "relay".to_owned(),
            pool: PoolRecord {
                capacity: 10,
                max_receive: 10,
                max_extract: 10,
                energy: 5,
            },
        };
        assert_eq!(
            grid.restore(&[snapshot]),
            Err(GridError::NotAMachine(ORIGIN))
        );
    }

    #[test]
    fn restore_rejects_snapshot_of_another_kind() {
        let mut grid = Grid::new();
        let burner = grid
            .place_machine(ORIGIN, "resonant_burner", &MachineKind::resonant_burner())
            .unwrap();
        let snapshot = NodeSnapshot {
            position: ORIGIN,
            kind: "relay".to_owned(),
            pool: MachineKind::relay().pool().to_record(),
        };
        assert_eq!(
            grid.restore(&[snapshot]),
            Err(GridError::KindMismatch {
                position: ORIGIN,
                expected: "relay".to_owned(),
                found: "resonant_burner".to_owned(),
            })
        );
        assert_eq!(burner.borrow().pool.capacity(), 10_000);
    }

    #[test]
    fn restore_skips_busy_machines() {
        let mut grid = Grid::new();
        let node = grid
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        let mut snapshot = grid.snapshot();
        if let Some(first) = snapshot.first_mut() {
            first.pool.energy = 70;
        }

        let held = node.borrow();
        assert_eq!(grid.restore(&snapshot), Ok(0));
        drop(held);
        assert_eq!(grid.restore(&snapshot), Ok(1));
        assert_eq!(node.borrow().pool.energy(), 70);
    }

    #[test]
    fn cell_queries_report_contents_and_load_state() {
        let mut grid = Grid::new();
        grid.place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        grid.place_inert(EAST).unwrap();

        assert!(matches!(grid.cell(ORIGIN), Some(GridCell::Machine(_))));
        assert!(matches!(grid.cell(EAST), Some(GridCell::Inert)));
        assert!(grid.cell(Position::new(5, 0, 0)).is_none());

        assert!(!grid.is_unloaded(EAST));
        grid.unload(EAST);
        assert!(grid.is_unloaded(EAST));
        grid.load(EAST);
        assert!(!grid.is_unloaded(EAST));
    }

    #[test]
    fn machine_dirty_flag_is_readable_without_clearing() {
        let mut grid = Grid::new();
        let node = grid
            .place_machine(ORIGIN, "relay", &MachineKind::relay())
            .unwrap();
        let machine = grid.machine(ORIGIN).unwrap();
        assert!(!machine.is_dirty());

        node.borrow_mut().pool.receive(5, TransferMode::Commit);
        assert!(machine.is_dirty());
        assert!(machine.is_dirty());
        assert!(machine.take_dirty());
        assert!(!machine.is_dirty());
    }
}
