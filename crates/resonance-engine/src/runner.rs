//! Tick loop runner.
//!
//! [`run_simulation`] drives a [`Simulation`] for the configured number of
//! ticks, paced by the configured interval, and stops early on Ctrl-C.
//! A [`TickCallback`] sees every completed tick.

use std::path::Path;
use std::time::Duration;

use resonance_grid::config::SimulationSettings;
use resonance_grid::{Grid, Simulation, TickSummary};
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// The configured tick count was reached.
    MaxTicksReached,
    /// The process received an interrupt.
    Interrupted,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    /// The reason the run ended.
    pub end_reason: RunEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Ticks whose conservation check failed.
    pub anomalies: u64,
}

/// Callback invoked after each tick completes.
pub trait TickCallback {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation);
}

/// Tracks which machines changed since the last persisted snapshot.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    /// Machine changes seen across the run, counted per tick.
    pub changed: u64,
}

impl TickCallback for DirtyTracker {
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation) {
        let dirty = simulation.grid().take_dirty();
        if !dirty.is_empty() {
            debug!(tick = summary.tick, machines = dirty.len(), "machines changed");
        }
        let count = u64::try_from(dirty.len()).unwrap_or(u64::MAX);
        self.changed = self.changed.saturating_add(count);
    }
}

/// Run the tick loop until the tick limit or Ctrl-C.
///
/// # Errors
///
/// Returns [`EngineError::Tick`] if a tick fails.
pub async fn run_simulation(
    simulation: &mut Simulation,
    settings: &SimulationSettings,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, EngineError> {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };
    run_simulation_until(simulation, settings, callback, interrupt).await
}

/// Run the tick loop until the tick limit or until `shutdown` completes.
///
/// `shutdown` is polled after every tick. With a zero tick interval the
/// loop still yields to the runtime between ticks.
///
/// # Errors
///
/// Returns [`EngineError::Tick`] if a tick fails.
pub async fn run_simulation_until(
    simulation: &mut Simulation,
    settings: &SimulationSettings,
    callback: &mut dyn TickCallback,
    shutdown: impl Future<Output = ()>,
) -> Result<RunResult, EngineError> {
    let interval = Duration::from_millis(settings.tick_interval_ms);
    let mut final_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut anomalies: u64 = 0;
    tokio::pin!(shutdown);

    info!(
        max_ticks = settings.ticks,
        tick_interval_ms = settings.tick_interval_ms,
        scheduler = ?settings.scheduler,
        "Simulation starting"
    );

    while total_ticks < settings.ticks {
        let summary = simulation.run_tick()?;
        total_ticks = total_ticks.saturating_add(1);
        if !summary.conservation.is_balanced() {
            anomalies = anomalies.saturating_add(1);
        }
        callback.on_tick(&summary, simulation);
        final_summary = Some(summary);

        if total_ticks >= settings.ticks {
            break;
        }
        let pause = async {
            if interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(interval).await;
            }
        };
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!(tick = simulation.tick(), "Interrupt received");
                return Ok(RunResult {
                    end_reason: RunEndReason::Interrupted,
                    final_summary,
                    total_ticks,
                    anomalies,
                });
            }
            () = pause => {}
        }
    }

    Ok(RunResult {
        end_reason: RunEndReason::MaxTicksReached,
        final_summary,
        total_ticks,
        anomalies,
    })
}

/// Log the end of a run.
pub fn log_simulation_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        anomalies = result.anomalies,
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            total_stored = summary.total_stored,
            transferred = summary.transferred,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
    if result.anomalies > 0 {
        warn!(anomalies = result.anomalies, "conservation anomalies detected");
    }
}

/// Write every machine's pool record to `path` as JSON.
///
/// # Errors
///
/// Returns [`EngineError::Snapshot`] if serialization or the write fails.
pub fn write_snapshot(grid: &Grid, path: &Path) -> Result<usize, EngineError> {
    let snapshot = grid.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| EngineError::Snapshot {
        message: format!("failed to serialize snapshot: {e}"),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::Snapshot {
            message: format!("failed to create {}: {e}", parent.display()),
        })?;
    }
    std::fs::write(path, json).map_err(|e| EngineError::Snapshot {
        message: format!("failed to write {}: {e}", path.display()),
    })?;
    info!(path = %path.display(), machines = snapshot.len(), "Snapshot written");
    Ok(snapshot.len())
}
