//! Grid, machine kinds, and tick scheduling for the Resonance network.
//!
//! This crate turns the exchange primitives of `resonance-energy` into a
//! running system: a [`Grid`] of machines and foreign storages that answers
//! neighbor lookups, a [`Simulation`] that ticks every machine, and a
//! [`Journal`] that records every movement so each tick can be checked for
//! conservation.
//!
//! # Modules
//!
//! - [`grid`] -- The [`Grid`]: the in-memory [`EnergyWorld`] implementation.
//! - [`kind`] -- [`MachineKind`] profiles and the built-in kinds.
//! - [`tick`] -- The [`Simulation`] tick cycle and scheduler order.
//! - [`journal`] -- The append-only [`Journal`] of energy movements.
//! - [`conservation`] -- Per-tick conservation verification.
//! - [`config`] -- YAML configuration and grid construction.
//! - [`error`] -- Error types.
//!
//! # Usage
//!
//! ```
//! use resonance_grid::{Grid, MachineKind, SchedulerOrder, Simulation};
//! use resonance_types::Position;
//!
//! let mut grid = Grid::new();
//! grid.place_machine(Position::new(0, 0, 0), "burner", &MachineKind::resonant_burner())
//!     .ok();
//! grid.place_machine(Position::new(1, 0, 0), "condenser", &MachineKind::resonance_condenser())
//!     .ok();
//!
//! let mut sim = Simulation::new(grid, SchedulerOrder::Ascending);
//! let summary = sim.run_tick().ok();
//! assert_eq!(summary.map(|s| s.transferred), Some(20));
//! ```
//!
//! [`EnergyWorld`]: resonance_energy::EnergyWorld

pub mod config;
pub mod conservation;
pub mod error;
pub mod grid;
pub mod journal;
pub mod kind;
pub mod tick;

// Re-export primary types at crate root.
pub use config::{ConfigError, GridConfig};
pub use conservation::{ConservationResult, EnergyAnomaly, Imbalance};
pub use error::{GridError, JournalError, TickError};
pub use grid::{Grid, GridCell, Machine, NodeSnapshot};
pub use journal::{EntryKind, Journal, JournalEntry};
pub use kind::MachineKind;
pub use tick::{DEFAULT_JOURNAL_RETENTION_TICKS, SchedulerOrder, Simulation, TickSummary};
