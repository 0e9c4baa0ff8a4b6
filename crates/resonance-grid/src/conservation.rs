//! Conservation checks for one tick of the grid.
//!
//! Energy enters the grid only through generation and leaves it only
//! through consumption. For a tick T the check is:
//!
//! ```text
//! sum(after) == sum(before) + generated(T) - consumed(T)
//! ```
//!
//! and, for every cell C the journal or the energy levels mention:
//!
//! ```text
//! after(C) - before(C) == net_flow(C, T)
//! ```
//!
//! The exchange protocol guarantees both by construction. A failure means
//! a storage changed outside the journal, and produces an
//! [`EnergyAnomaly`].

use std::collections::{BTreeMap, BTreeSet};

use resonance_types::Position;
use serde::Serialize;

use crate::journal::{EntryKind, JournalEntry};

/// One mismatch between journaled and observed energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Imbalance {
    /// The cell that disagrees, or `None` for the grid-wide total.
    pub position: Option<Position>,
    /// Change predicted by the journal.
    pub expected: i64,
    /// Change actually observed.
    pub actual: i64,
}

/// A conservation failure for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyAnomaly {
    /// Tick the failure was detected in.
    pub tick: u64,
    /// Every mismatch found.
    pub imbalances: Vec<Imbalance>,
    /// Human-readable summary.
    pub message: String,
}

/// The result of a conservation check for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Observed energy matches the journal.
    Balanced,
    /// One or more cells, or the grid total, disagree with the journal.
    Anomaly(EnergyAnomaly),
}

impl ConservationResult {
    /// Whether the tick balanced.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify tick `tick` of `entries` against energy levels taken before and
/// after it.
///
/// Entries for other ticks are ignored. Cells missing from a level map
/// count as holding zero.
pub fn verify_conservation(
    tick: u64,
    entries: &[JournalEntry],
    before: &BTreeMap<Position, u32>,
    after: &BTreeMap<Position, u32>,
) -> ConservationResult {
    let mut imbalances = Vec::new();

    // Grid-wide: only generation and consumption change the total.
    let mut expected_total: i64 = 0;
    let mut flows: BTreeMap<Position, i64> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.tick == tick) {
        let amount = i64::from(entry.amount);
        match entry.kind {
            EntryKind::Generation => expected_total = expected_total.saturating_add(amount),
            EntryKind::Consumption => expected_total = expected_total.saturating_sub(amount),
            EntryKind::Transfer => {}
        }
        if let Some(to) = entry.to {
            let v = flows.entry(to).or_insert(0);
            *v = v.saturating_add(amount);
        }
        if let Some(from) = entry.from {
            let v = flows.entry(from).or_insert(0);
            *v = v.saturating_sub(amount);
        }
    }

    let actual_total = sum(after).saturating_sub(sum(before));
    if actual_total != expected_total {
        imbalances.push(Imbalance {
            position: None,
            expected: expected_total,
            actual: actual_total,
        });
    }

    // Per cell: the observed delta must match the journaled net flow.
    let cells: BTreeSet<Position> = before
        .keys()
        .chain(after.keys())
        .chain(flows.keys())
        .copied()
        .collect();
    for position in cells {
        let expected = flows.get(&position).copied().unwrap_or(0);
        let actual = level(after, position).saturating_sub(level(before, position));
        if actual != expected {
            imbalances.push(Imbalance {
                position: Some(position),
                expected,
                actual,
            });
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let count = imbalances.len();
        ConservationResult::Anomaly(EnergyAnomaly {
            tick,
            imbalances,
            message: format!(
                "ENERGY_ANOMALY at tick {tick}: conservation violated in {count} place(s)"
            ),
        })
    }
}

fn level(levels: &BTreeMap<Position, u32>, position: Position) -> i64 {
    levels.get(&position).copied().map_or(0, i64::from)
}

fn sum(levels: &BTreeMap<Position, u32>) -> i64 {
    levels
        .values()
        .fold(0_i64, |acc, v| acc.saturating_add(i64::from(*v)))
}
