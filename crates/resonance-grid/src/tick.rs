//! Tick cycle: the loop that drives every machine on a grid.
//!
//! Each tick runs three phases:
//!
//! 1. **Machine processing** -- every machine generates its per-tick output
//!    and consumers burn their per-tick demand if they hold enough.
//! 2. **Transfer** -- every machine runs its role-based exchange through a
//!    [`TransferCoordinator`]: generators send, consumers receive, `Both`
//!    receives then sends, `None` does nothing.
//! 3. **Verify** -- the journal is checked against the grid's energy levels
//!    from before phase 1.
//!
//! Machines are visited in ascending position order unless the scheduler is
//! configured to shuffle. Conservation holds in either order.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use resonance_energy::TransferCoordinator;
use resonance_types::{EnergyRole, Position, TransferOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conservation::ConservationResult;
use crate::error::{JournalError, TickError};
use crate::grid::Grid;
use crate::journal::{EntryKind, Journal};

/// Ticks of journal history a new simulation keeps.
pub const DEFAULT_JOURNAL_RETENTION_TICKS: u64 = 100;

/// Order machines are visited in within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SchedulerOrder {
    /// Ascending position order.
    #[default]
    Ascending,
    /// A fresh seeded shuffle every tick.
    Shuffled {
        /// Seed for the shuffle RNG.
        seed: u64,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Energy generated inside machines.
    pub generated: u64,
    /// Energy consumed inside machines.
    pub consumed: u64,
    /// Energy moved between cells.
    pub transferred: u64,
    /// Number of machines visited.
    pub machines: usize,
    /// Non-empty transfer outcomes per machine.
    pub outcomes: BTreeMap<Position, TransferOutcome>,
    /// Energy on the grid at the end of the tick.
    pub total_stored: u64,
    /// Result of the end-of-tick conservation check.
    pub conservation: ConservationResult,
}

/// A grid plus the state needed to run ticks over it.
#[derive(Debug)]
pub struct Simulation {
    /// The grid being simulated.
    grid: Grid,
    /// Every movement recorded so far.
    journal: Journal,
    /// Last completed tick (0 before the first).
    tick: u64,
    /// How machines are ordered within a tick.
    order: SchedulerOrder,
    /// Shuffle source for [`SchedulerOrder::Shuffled`].
    rng: SmallRng,
    /// Ticks of journal history kept. Zero keeps everything.
    journal_retention: u64,
}

impl Simulation {
    /// Create a simulation over `grid`, starting at tick 0.
    pub fn new(grid: Grid, order: SchedulerOrder) -> Self {
        let seed = match order {
            SchedulerOrder::Ascending => 0,
            SchedulerOrder::Shuffled { seed } => seed,
        };
        Self {
            grid,
            journal: Journal::new(),
            tick: 0,
            order,
            rng: SmallRng::seed_from_u64(seed),
            journal_retention: DEFAULT_JOURNAL_RETENTION_TICKS,
        }
    }

    /// Keep only the last `ticks` ticks of journal history. Zero keeps
    /// everything.
    #[must_use]
    pub const fn with_journal_retention(mut self, ticks: u64) -> Self {
        self.journal_retention = ticks;
        self
    }

    /// The grid being simulated.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable access to the grid between ticks.
    pub const fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// The journal of recorded movements.
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Ticks of journal history kept.
    pub const fn journal_retention(&self) -> u64 {
        self.journal_retention
    }

    /// Last completed tick.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Execute one complete tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::TickOverflow`] if the tick counter is exhausted.
    pub fn run_tick(&mut self) -> Result<TickSummary, TickError> {
        let tick = self.tick.checked_add(1).ok_or(TickError::TickOverflow)?;
        self.tick = tick;
        self.journal.begin_tick(tick);

        let before = self.grid.energy_levels();
        let schedule = self.schedule();
        debug!(tick, machines = schedule.len(), "tick started");

        // --- Phase 1: Machine processing ---
        for &position in &schedule {
            self.process_machine(tick, position);
        }

        // --- Phase 2: Transfer ---
        let mut outcomes = BTreeMap::new();
        for &position in &schedule {
            let outcome = self.transfer(position);
            if outcome.has_transfer() {
                outcomes.insert(position, outcome);
            }
        }

        // --- Phase 3: Verify ---
        let after = self.grid.energy_levels();
        let conservation = self.journal.verify_conservation(tick, &before, &after);
        if let ConservationResult::Anomaly(anomaly) = &conservation {
            warn!(
                tick,
                imbalances = anomaly.imbalances.len(),
                "{}",
                anomaly.message
            );
        }

        let summary = TickSummary {
            tick,
            generated: self.journal.total(tick, EntryKind::Generation),
            consumed: self.journal.total(tick, EntryKind::Consumption),
            transferred: self.journal.total(tick, EntryKind::Transfer),
            machines: schedule.len(),
            outcomes,
            total_stored: self.grid.total_stored(),
            conservation,
        };

        if self.journal_retention > 0 {
            let keep_from = tick.saturating_sub(self.journal_retention).saturating_add(1);
            self.journal.prune_before(keep_from);
        }

        info!(
            tick,
            generated = summary.generated,
            consumed = summary.consumed,
            transferred = summary.transferred,
            total_stored = summary.total_stored,
            "tick completed"
        );
        Ok(summary)
    }

    /// Machine positions in the order this tick visits them.
    fn schedule(&mut self) -> Vec<Position> {
        let mut positions = self.grid.machine_positions();
        if let SchedulerOrder::Shuffled { .. } = self.order {
            positions.shuffle(&mut self.rng);
        }
        positions
    }

    /// Phase 1 for one machine: generation, then consumption.
    fn process_machine(&mut self, tick: u64, position: Position) {
        let Some(machine) = self.grid.machine(position) else {
            return;
        };
        let generation = machine.kind().generation_per_tick;
        let consumption = machine.kind().consumption_per_tick;
        let Ok(mut node) = machine.node().try_borrow_mut() else {
            debug!(tick, %position, "machine busy; skipping processing");
            return;
        };

        if generation > 0 {
            let added = node.pool.add_energy(generation);
            if added > 0 {
                log_rejected(self.journal.record_generation(tick, position, added));
            }
        }
        if consumption > 0 && node.pool.try_consume(consumption) {
            log_rejected(self.journal.record_consumption(tick, position, consumption));
        }
    }

    /// Phase 2 for one machine: its role-based exchange.
    fn transfer(&mut self, position: Position) -> TransferOutcome {
        let Some(machine) = self.grid.machine(position) else {
            return TransferOutcome::default();
        };
        let rate = machine.kind().transfer_rate;
        let shared = Rc::clone(machine.node());
        let Ok(mut node) = shared.try_borrow_mut() else {
            return TransferOutcome::default();
        };
        let role = node.role;

        let mut coordinator = TransferCoordinator::new(&mut node, position, &self.grid)
            .with_recorder(&mut self.journal);
        match role {
            EnergyRole::Generator => TransferOutcome {
                received: 0,
                sent: coordinator.send(rate),
            },
            EnergyRole::Consumer => TransferOutcome {
                received: coordinator.receive(rate),
                sent: 0,
            },
            EnergyRole::Both => coordinator.perform_balanced(rate),
            EnergyRole::None => TransferOutcome::default(),
        }
    }
}

fn log_rejected(result: Result<(), JournalError>) {
    if let Err(err) = result {
        warn!(error = %err, "journal rejected entry");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use resonance_types::Direction;

    use super::*;
    use crate::kind::MachineKind;

    fn at(x: i32) -> Position {
        Position::new(x, 0, 0)
    }

    #[test]
    fn generator_feeds_adjacent_consumer() {
        let mut grid = Grid::new();
        let burner = grid
            .place_machine(at(0), "burner", &MachineKind::resonant_burner())
            .unwrap();
        let condenser = grid
            .place_machine(at(1), "condenser", &MachineKind::resonance_condenser())
            .unwrap();

        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending);
        let summary = sim.run_tick().unwrap();

        // The burner makes 20 and pushes it all east; the condenser has
        // nothing to burn until the next tick.
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.generated, 20);
        assert_eq!(summary.consumed, 0);
        assert_eq!(summary.transferred, 20);
        assert_eq!(burner.borrow().pool.energy(), 0);
        assert_eq!(condenser.borrow().pool.energy(), 20);
        assert!(summary.conservation.is_balanced());

        let summary = sim.run_tick().unwrap();
        assert_eq!(summary.consumed, 2);
        assert_eq!(condenser.borrow().pool.energy(), 38);
        assert_eq!(summary.total_stored, 38);
    }

    #[test]
    fn none_role_machines_sit_idle() {
        let mut grid = Grid::new();
        let idle = grid
            .place_machine(at(0), "idle", &MachineKind::default())
            .unwrap();
        idle.borrow_mut().pool.set_energy(500);
        grid.place_machine(at(1), "condenser", &MachineKind::resonance_condenser())
            .unwrap();

        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending);
        let summary = sim.run_tick().unwrap();
        assert_eq!(summary.transferred, 0);
        assert!(summary.outcomes.is_empty());
        assert_eq!(idle.borrow().pool.energy(), 500);
    }

    #[test]
    fn relay_passes_energy_along_a_line() {
        let mut grid = Grid::new();
        grid.place_machine(at(0), "burner", &MachineKind::resonant_burner())
            .unwrap();
        let relay = MachineKind {
            inputs: vec![Direction::West],
            outputs: vec![Direction::East],
            ..MachineKind::relay()
        };
        grid.place_machine(at(1), "relay", &relay).unwrap();
        let sink = grid
            .place_machine(at(2), "condenser", &MachineKind::resonance_condenser())
            .unwrap();

        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending);
        sim.run_tick().unwrap();
        // Tick 1: burner sends 20 to the relay before the relay runs, and
        // the relay forwards it the same tick.
        assert_eq!(sink.borrow().pool.energy(), 20);
        assert_eq!(sim.journal().entries_for_tick(1).count(), 3);
    }

    #[test]
    fn shuffled_order_still_conserves() {
        let mut grid = Grid::new();
        for x in 0..6 {
            let kind = if x % 2 == 0 {
                MachineKind::resonant_burner()
            } else {
                MachineKind::relay()
            };
            grid.place_machine(at(x), "m", &kind).unwrap();
        }
        grid.place_machine(at(6), "condenser", &MachineKind::resonance_condenser())
            .unwrap();

        let mut sim = Simulation::new(grid, SchedulerOrder::Shuffled { seed: 42 });
        let mut generated: u64 = 0;
        let mut consumed: u64 = 0;
        for _ in 0..10 {
            let summary = sim.run_tick().unwrap();
            assert!(summary.conservation.is_balanced(), "{summary:?}");
            generated += summary.generated;
            consumed += summary.consumed;
        }
        assert_eq!(sim.grid().total_stored(), generated - consumed);
    }

    #[test]
    fn journal_retention_prunes_old_ticks() {
        let mut grid = Grid::new();
        grid.place_machine(at(0), "burner", &MachineKind::resonant_burner())
            .unwrap();
        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending).with_journal_retention(2);
        for _ in 0..5 {
            sim.run_tick().unwrap();
        }
        assert_eq!(sim.tick(), 5);
        assert!(sim.journal().entries().iter().all(|e| e.tick >= 4));
        assert_eq!(sim.journal().len(), 2);
    }

    #[test]
    fn new_simulation_bounds_its_journal() {
        let mut grid = Grid::new();
        grid.place_machine(at(0), "burner", &MachineKind::resonant_burner())
            .unwrap();
        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending);
        assert_eq!(sim.journal_retention(), DEFAULT_JOURNAL_RETENTION_TICKS);

        for _ in 0..105 {
            sim.run_tick().unwrap();
        }
        // One generation entry per tick, oldest five pruned.
        assert_eq!(sim.journal().len(), 100);
        assert_eq!(sim.journal().entries_for_tick(5).count(), 0);
        assert_eq!(sim.journal().entries_for_tick(6).count(), 1);
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let mut grid = Grid::new();
        grid.place_machine(at(0), "burner", &MachineKind::resonant_burner())
            .unwrap();
        let mut sim = Simulation::new(grid, SchedulerOrder::Ascending).with_journal_retention(0);
        for _ in 0..105 {
            sim.run_tick().unwrap();
        }
        assert_eq!(sim.journal().len(), 105);
    }
}
