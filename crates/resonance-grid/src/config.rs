//! Configuration loading and typed config structures for a Resonance grid.
//!
//! The canonical configuration lives in `resonance-config.yaml` at the
//! project root. It names the simulation settings, any custom machine
//! kinds, and what to place where. Placements may refer to custom kinds or
//! to the built-in ones ([`MachineKind::builtin`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use resonance_energy::EnergyPool;
use resonance_types::{PoolRecord, Position};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::GridError;
use crate::grid::Grid;
use crate::kind::MachineKind;
use crate::tick::{DEFAULT_JOURNAL_RETENTION_TICKS, SchedulerOrder, Simulation};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level grid configuration.
///
/// Mirrors the structure of `resonance-config.yaml`. Every field has a
/// default, so an empty file describes an empty grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GridConfig {
    /// Simulation settings.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Custom machine kinds by name. These shadow built-ins of the same name.
    #[serde(default)]
    pub machines: BTreeMap<String, MachineKind>,

    /// Machines to place.
    #[serde(default)]
    pub placements: Vec<Placement>,

    /// Foreign storages to place.
    #[serde(default)]
    pub storages: Vec<StoragePlacement>,

    /// Cells holding blocks with no energy capability.
    #[serde(default)]
    pub inert: Vec<Position>,
}

impl GridConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `RESONANCE_TICKS` overrides `simulation.ticks` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.simulation.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.simulation.apply_env_overrides();
        Ok(config)
    }

    /// The machine kind called `name`, custom kinds first.
    pub fn kind(&self, name: &str) -> Option<MachineKind> {
        self.machines
            .get(name)
            .cloned()
            .or_else(|| MachineKind::builtin(name))
    }

    /// Build a grid holding every configured placement.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnknownKind`] if a placement names a kind that
    /// is neither configured nor built in, or [`GridError::Occupied`] if two
    /// placements share a cell.
    pub fn build_grid(&self) -> Result<Grid, GridError> {
        let mut grid = Grid::new();

        for placement in &self.placements {
            let kind = self
                .kind(&placement.kind)
                .ok_or_else(|| GridError::UnknownKind(placement.kind.clone()))?;
            let node = grid.place_machine(placement.position, &placement.kind, &kind)?;
            if let Ok(mut node) = node.try_borrow_mut() {
                node.pool.set_energy(placement.energy);
            }
        }

        for storage in &self.storages {
            grid.place_storage(storage.position, EnergyPool::from_record(storage.record()))?;
        }

        for &position in &self.inert {
            grid.place_inert(position)?;
        }

        // Initial fills are not changes worth persisting.
        let seeded = grid.take_dirty().len();
        debug!(cells = grid.len(), seeded, "grid built from config");
        Ok(grid)
    }

    /// Build a ready-to-run simulation from this configuration.
    ///
    /// # Errors
    ///
    /// See [`GridConfig::build_grid`].
    pub fn build_simulation(&self) -> Result<Simulation, GridError> {
        let grid = self.build_grid()?;
        Ok(Simulation::new(grid, self.simulation.scheduler)
            .with_journal_retention(self.simulation.journal_retention_ticks))
    }
}

/// Simulation-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    /// Number of ticks the engine runs.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Order machines are visited in within a tick.
    #[serde(default)]
    pub scheduler: SchedulerOrder,

    /// Ticks of journal history kept. Zero keeps everything.
    #[serde(default = "default_journal_retention_ticks")]
    pub journal_retention_ticks: u64,

    /// Where the engine writes the final machine snapshot, if anywhere.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl SimulationSettings {
    /// Override settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RESONANCE_TICKS") {
            match val.parse() {
                Ok(ticks) => self.ticks = ticks,
                Err(err) => warn!(value = %val, error = %err, "ignoring invalid RESONANCE_TICKS"),
            }
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            tick_interval_ms: default_tick_interval_ms(),
            scheduler: SchedulerOrder::default(),
            journal_retention_ticks: default_journal_retention_ticks(),
            snapshot_path: None,
        }
    }
}

/// One machine to place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Placement {
    /// Machine kind name.
    pub kind: String,
    /// Cell to place it in.
    pub position: Position,
    /// Energy the machine starts with.
    #[serde(default)]
    pub energy: u32,
}

/// One foreign storage to place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoragePlacement {
    /// Cell to place it in.
    pub position: Position,
    /// Storage capacity.
    #[serde(default = "default_storage_capacity")]
    pub capacity: u32,
    /// Per-call receive rate.
    #[serde(default = "default_storage_rate")]
    pub max_receive: u32,
    /// Per-call extract rate.
    #[serde(default = "default_storage_rate")]
    pub max_extract: u32,
    /// Energy the storage starts with.
    #[serde(default)]
    pub energy: u32,
}

impl StoragePlacement {
    /// The storage's starting pool record.
    pub const fn record(&self) -> PoolRecord {
        PoolRecord {
            capacity: self.capacity,
            max_receive: self.max_receive,
            max_extract: self.max_extract,
            energy: self.energy,
        }
    }
}

const fn default_ticks() -> u64 {
    100
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_journal_retention_ticks() -> u64 {
    DEFAULT_JOURNAL_RETENTION_TICKS
}

const fn default_storage_capacity() -> u32 {
    10_000
}

const fn default_storage_rate() -> u32 {
    1000
}
