//! Engine binary for the Resonance network.
//!
//! Loads a grid description, builds the grid, and runs its tick loop.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing), as JSON when
//!    `RESONANCE_LOG_FORMAT=json`
//! 2. Load configuration from `resonance-config.yaml`, or `RESONANCE_CONFIG`
//! 3. Build the grid and simulation
//! 4. Run the tick loop
//! 5. Log the result and write the final snapshot if configured

mod error;
mod runner;

use std::path::PathBuf;

use resonance_grid::GridConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::runner::DirtyTracker;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "resonance-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, grid construction, a tick, or the
/// final snapshot fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    init_tracing(LogFormat::from_env_value(
        std::env::var("RESONANCE_LOG_FORMAT").ok().as_deref(),
    ));

    info!("resonance-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        ticks = config.simulation.ticks,
        tick_interval_ms = config.simulation.tick_interval_ms,
        machine_kinds = config.machines.len(),
        placements = config.placements.len(),
        storages = config.storages.len(),
        "Configuration loaded"
    );

    // 3. Build the grid.
    let mut simulation = config.build_simulation().map_err(EngineError::from)?;
    info!(
        cells = simulation.grid().len(),
        total_stored = simulation.grid().total_stored(),
        "Grid built"
    );

    // 4. Run the tick loop.
    let mut tracker = DirtyTracker::default();
    let result = runner::run_simulation(&mut simulation, &config.simulation, &mut tracker).await?;

    // 5. Report.
    runner::log_simulation_end(&result);
    info!(changed = tracker.changed, "Machine changes recorded");
    if let Some(path) = &config.simulation.snapshot_path {
        runner::write_snapshot(simulation.grid(), path)?;
    }

    Ok(())
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse a `RESONANCE_LOG_FORMAT` value. Anything but `json` is text.
    fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`).
fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Load configuration from `RESONANCE_CONFIG` or the default path.
///
/// Falls back to defaults when the file does not exist.
fn load_config() -> Result<GridConfig, EngineError> {
    let config_path = std::env::var("RESONANCE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = GridConfig::from_file(&config_path)?;
        Ok(config)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        let mut config = GridConfig::default();
        config.simulation.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_text() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value(Some("")), LogFormat::Text);
    }

    #[test]
    fn log_format_accepts_json_in_any_case() {
        assert_eq!(LogFormat::from_env_value(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some(" JSON ")), LogFormat::Json);
    }
}
