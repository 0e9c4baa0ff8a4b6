//! The transfer journal: an append-only log of every energy movement.
//!
//! Each tick the scheduler records three kinds of entries:
//!
//! | Kind | From | To |
//! |------|------|----|
//! | Generation | (none) | machine |
//! | Consumption | machine | (none) |
//! | Transfer | source cell | destination cell |
//!
//! Generation and consumption are the only flows that change the total
//! energy on the grid. Transfers move it between cells. The
//! [`conservation`](crate::conservation) module checks both facts against
//! the grid's energy levels before and after a tick.

use std::collections::BTreeMap;

use resonance_energy::{Exchange, ExchangeRecorder, NeighborKind};
use resonance_types::Position;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conservation::{self, ConservationResult};
use crate::error::JournalError;

/// What kind of movement an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Energy created inside a machine.
    Generation,
    /// Energy burned inside a machine.
    Consumption,
    /// Energy moved between two adjacent cells.
    Transfer,
}

/// One journaled movement of energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Tick the movement happened in.
    pub tick: u64,
    /// Kind of movement.
    pub kind: EntryKind,
    /// Cell that lost energy, if any.
    pub from: Option<Position>,
    /// Cell that gained energy, if any.
    pub to: Option<Position>,
    /// For transfers, whether the counterpart was native or foreign.
    pub neighbor: Option<NeighborKind>,
    /// Energy moved. Always positive.
    pub amount: u32,
}

/// Append-only log of energy movements.
#[derive(Debug, Default)]
pub struct Journal {
    /// All entries, in insertion order.
    entries: Vec<JournalEntry>,
    /// Tick stamped on exchanges reported through [`ExchangeRecorder`].
    current_tick: u64,
}

impl Journal {
    /// Create an empty journal.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_tick: 0,
        }
    }

    /// Set the tick stamped on recorded exchanges.
    pub const fn begin_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    /// The tick exchanges are currently stamped with.
    pub const fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, in insertion order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries recorded for `tick`.
    pub fn entries_for_tick(&self, tick: u64) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    /// Drop every entry older than `tick`.
    pub fn prune_before(&mut self, tick: u64) {
        self.entries.retain(|e| e.tick >= tick);
    }

    // -------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------

    /// Record energy generated inside the machine at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ZeroAmount`] if `amount` is zero.
    pub fn record_generation(
        &mut self,
        tick: u64,
        position: Position,
        amount: u32,
    ) -> Result<(), JournalError> {
        self.push(JournalEntry {
            tick,
            kind: EntryKind::Generation,
            from: None,
            to: Some(position),
            neighbor: None,
            amount,
        })
    }

    /// Record energy consumed inside the machine at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ZeroAmount`] if `amount` is zero.
    pub fn record_consumption(
        &mut self,
        tick: u64,
        position: Position,
        amount: u32,
    ) -> Result<(), JournalError> {
        self.push(JournalEntry {
            tick,
            kind: EntryKind::Consumption,
            from: Some(position),
            to: None,
            neighbor: None,
            amount,
        })
    }

    /// Record a committed exchange.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ZeroAmount`] if nothing moved, or
    /// [`JournalError::SelfTransfer`] if both ends are the same cell.
    pub fn record_transfer(&mut self, tick: u64, exchange: &Exchange) -> Result<(), JournalError> {
        if exchange.from == exchange.to {
            return Err(JournalError::SelfTransfer {
                tick,
                position: exchange.from,
            });
        }
        self.push(JournalEntry {
            tick,
            kind: EntryKind::Transfer,
            from: Some(exchange.from),
            to: Some(exchange.to),
            neighbor: Some(exchange.kind),
            amount: exchange.amount,
        })
    }

    fn push(&mut self, entry: JournalEntry) -> Result<(), JournalError> {
        if entry.amount == 0 {
            return Err(JournalError::ZeroAmount { tick: entry.tick });
        }
        self.entries.push(entry);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Total energy of `kind` moved during `tick`.
    pub fn total(&self, tick: u64, kind: EntryKind) -> u64 {
        self.entries_for_tick(tick)
            .filter(|e| e.kind == kind)
            .fold(0_u64, |acc, e| acc.saturating_add(u64::from(e.amount)))
    }

    /// Net energy gained by `position` during `tick`, across all entries.
    pub fn net_flow(&self, tick: u64, position: Position) -> i64 {
        self.net_flows(tick).get(&position).copied().unwrap_or(0)
    }

    /// Net energy gained by every cell touched during `tick`.
    pub fn net_flows(&self, tick: u64) -> BTreeMap<Position, i64> {
        let mut flows: BTreeMap<Position, i64> = BTreeMap::new();
        for entry in self.entries_for_tick(tick) {
            let amount = i64::from(entry.amount);
            if let Some(to) = entry.to {
                let v = flows.entry(to).or_insert(0);
                *v = v.saturating_add(amount);
            }
            if let Some(from) = entry.from {
                let v = flows.entry(from).or_insert(0);
                *v = v.saturating_sub(amount);
            }
        }
        flows
    }

    /// Verify `tick` against grid energy levels taken before and after it.
    pub fn verify_conservation(
        &self,
        tick: u64,
        before: &BTreeMap<Position, u32>,
        after: &BTreeMap<Position, u32>,
    ) -> ConservationResult {
        let entries: Vec<JournalEntry> = self.entries_for_tick(tick).copied().collect();
        conservation::verify_conservation(tick, &entries, before, after)
    }
}

impl ExchangeRecorder for Journal {
    fn record(&mut self, exchange: Exchange) {
        let tick = self.current_tick;
        if let Err(err) = self.record_transfer(tick, &exchange) {
            debug!(tick, error = %err, "exchange not journaled");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use resonance_types::Direction;

    use super::*;

    const A: Position = Position::new(0, 0, 0);
    const B: Position = Position::new(1, 0, 0);

    fn exchange(from: Position, to: Position, amount: u32) -> Exchange {
        Exchange {
            from,
            to,
            direction: Direction::East,
            kind: NeighborKind::Native,
            amount,
        }
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut journal = Journal::new();
        assert_eq!(
            journal.record_generation(1, A, 0),
            Err(JournalError::ZeroAmount { tick: 1 })
        );
        assert!(journal.record_transfer(1, &exchange(A, B, 0)).is_err());
        assert!(journal.is_empty());
    }

    #[test]
    fn self_transfers_are_rejected() {
        let mut journal = Journal::new();
        assert_eq!(
            journal.record_transfer(3, &exchange(A, A, 5)),
            Err(JournalError::SelfTransfer { tick: 3, position: A })
        );
    }

    #[test]
    fn totals_and_net_flows_per_tick() {
        let mut journal = Journal::new();
        journal.record_generation(1, A, 100).unwrap();
        journal.record_transfer(1, &exchange(A, B, 40)).unwrap();
        journal.record_consumption(1, B, 2).unwrap();
        journal.record_generation(2, A, 100).unwrap();

        assert_eq!(journal.total(1, EntryKind::Generation), 100);
        assert_eq!(journal.total(1, EntryKind::Transfer), 40);
        assert_eq!(journal.total(1, EntryKind::Consumption), 2);
        assert_eq!(journal.net_flow(1, A), 60);
        assert_eq!(journal.net_flow(1, B), 38);
        assert_eq!(journal.net_flow(1, Position::new(5, 5, 5)), 0);
        assert_eq!(journal.entries_for_tick(2).count(), 1);
    }

    #[test]
    fn recorder_stamps_current_tick() {
        let mut journal = Journal::new();
        journal.begin_tick(7);
        journal.record(exchange(A, B, 10));
        journal.record(exchange(A, B, 0));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.entries().first().unwrap().tick, 7);
        assert_eq!(
            journal.entries().first().unwrap().neighbor,
            Some(NeighborKind::Native)
        );
    }

    #[test]
    fn prune_keeps_recent_ticks() {
        let mut journal = Journal::new();
        journal.record_generation(1, A, 1).unwrap();
        journal.record_generation(2, A, 1).unwrap();
        journal.record_generation(3, A, 1).unwrap();
        journal.prune_before(2);
        assert_eq!(journal.len(), 2);
    }
}
